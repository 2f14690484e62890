//! Group communication between one manager and its workers.
//!
//! The executors only rely on the two link traits below, so the same state
//! machine runs over in-process channels (see [`local`]) or any transport
//! able to broadcast, scatter, gather and synchronize.

pub mod local;

use crate::error::{SpuxError, SpuxResult};
use crate::timing::Timing;
use crate::{CallRequest, Ensemble, Evaluation, Instruction, ParticleIndex, Routing, WorkerId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    Instruction(Instruction),
    Template(Value),
    Ensemble(Ensemble),
    Call(CallRequest),
    Routings(Vec<Routing>),
    /// Per-particle results of one worker; `None` is the no-result sentinel.
    Results(Vec<(ParticleIndex, Option<Value>)>),
    Particle {
        index: ParticleIndex,
        state: Value,
    },
    Timing(Timing),
    /// Worker outcome of a collective step: `None` on success, else the error.
    Status(Option<String>),
    Task {
        id: usize,
        parameters: Value,
    },
    Outcome {
        id: usize,
        evaluation: Option<Evaluation>,
    },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Instruction(_) => "instruction",
            Self::Template(_) => "template",
            Self::Ensemble(_) => "ensemble",
            Self::Call(_) => "call",
            Self::Routings(_) => "routings",
            Self::Results(_) => "results",
            Self::Particle { .. } => "particle",
            Self::Timing(_) => "timing",
            Self::Status(_) => "status",
            Self::Task { .. } => "task",
            Self::Outcome { .. } => "outcome",
        }
    }

    /// Error for a message that arrived where `expected` should have.
    pub fn unexpected(&self, expected: &'static str) -> SpuxError {
        let received = match self {
            Self::Instruction(i) => format!("instruction {}", i),
            other => other.kind().to_string(),
        };
        SpuxError::Protocol { expected, received }
    }
}

/// Manager side of a worker group.
pub trait ManagerLink: Send {
    fn workers(&self) -> usize;

    /// Sends the same message to every worker.
    fn broadcast(&self, message: Message) -> SpuxResult<()>;

    /// Sends `messages[i]` to worker `i`.
    fn scatter(&self, messages: Vec<Message>) -> SpuxResult<()>;

    /// Collects one message per worker, ordered by worker address.
    fn gather(&self) -> SpuxResult<Vec<Message>>;

    /// Blocks until every worker has reached the barrier too.
    fn barrier(&self) -> SpuxResult<()>;

    fn send(&self, worker: WorkerId, message: Message) -> SpuxResult<()>;

    /// Next message from whichever worker answers first.
    fn recv_any(&self) -> SpuxResult<(WorkerId, Message)>;

    /// Releases the group once workers have been told to exit.
    fn release(&mut self) -> SpuxResult<()> {
        Ok(())
    }
}

/// Worker side of a worker group.
pub trait WorkerLink: Send {
    fn address(&self) -> WorkerId;

    fn workers(&self) -> usize;

    /// Next message from the manager (broadcast, scatter slice or direct send).
    fn receive(&self) -> SpuxResult<Message>;

    /// Message to the manager, consumed by `gather` or `recv_any`.
    fn reply(&self, message: Message) -> SpuxResult<()>;

    fn barrier(&self) -> SpuxResult<()>;

    fn send(&self, peer: WorkerId, message: Message) -> SpuxResult<()>;

    fn recv(&self, peer: WorkerId) -> SpuxResult<Message>;
}
