use crate::error::SpuxResult;
use crate::{Evaluation, ParticleIndex};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Per-particle state living on a worker.
///
/// Particles are cloned for same-worker copies and serialized when they move
/// to another worker. Returning `None` from `call` is a failure that aborts
/// the whole run.
pub trait Particle: Clone + Send + Serialize + DeserializeOwned {
    fn call(&mut self, method: &str, args: &[Value]) -> Option<Value>;

    /// Called after resampling with the particle's new index.
    fn relabel(&mut self, _index: ParticleIndex) {}
}

/// Builds the particles of a worker from the template broadcast on connect.
pub trait ParticleFactory: Send + Sync {
    type Particle: Particle;

    fn create(&self, template: &Value, index: ParticleIndex) -> SpuxResult<Self::Particle>;
}

/// Opaque unit of work evaluated by pool workers.
pub trait Task: Send {
    fn evaluate(&mut self, parameters: &Value) -> Option<Evaluation>;
}

impl<F> Task for F
where
    F: FnMut(&Value) -> Option<Evaluation> + Send,
{
    fn evaluate(&mut self, parameters: &Value) -> Option<Evaluation> {
        self(parameters)
    }
}
