use crate::{ParticleIndex, WorkerId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpuxError {
    #[error("Configuration Error: {0}")]
    Configuration(String),

    #[error("Worker Failure: worker {worker} returned no result (particle {index:?})")]
    WorkerFailure {
        worker: WorkerId,
        index: Option<ParticleIndex>,
    },

    #[error("Worker Error: worker {worker} failed: {message}")]
    WorkerError { worker: WorkerId, message: String },

    #[error("Invariant Violated: {0}")]
    Invariant(String),

    #[error("Invalid State: cannot {operation} while {state}")]
    State {
        operation: &'static str,
        state: &'static str,
    },

    #[error("Disconnected: {0}")]
    Disconnected(String),

    #[error("Protocol Error: expected {expected}, received {received}")]
    Protocol {
        expected: &'static str,
        received: String,
    },

    #[error("Data Validation Error: {0}")]
    Validation(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SpuxError {
    /// Every variant aborts the distributed run; this only separates
    /// deployment mistakes from faults raised while running.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

pub type SpuxResult<T> = Result<T, SpuxError>;
