pub mod ensemble;
pub mod particle;
pub mod pool;
pub mod worker;

// Re-export specific structs for easier access
pub use self::ensemble::EnsembleExecutor;
pub use self::particle::{Particle, ParticleFactory, Task};
pub use self::pool::{PoolExecutor, PoolWorker};
pub use self::worker::EnsembleWorker;

use crate::error::{SpuxError, SpuxResult};
use crate::timing::Timing;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Operations a sampler or likelihood may require from its executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    Connect,
    Call,
    Resample,
    Disconnect,
    Map,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ExecutorState {
    /// Booted, no particles distributed.
    Idle,
    /// Particles live on the workers.
    Ready,
    /// Workers were told to exit.
    Terminated,
}

impl ExecutorState {
    /// Fails unless the current state is one of `allowed`.
    pub fn require(
        self,
        allowed: &[ExecutorState],
        operation: &'static str,
    ) -> SpuxResult<()> {
        if allowed.contains(&self) {
            Ok(())
        } else {
            Err(SpuxError::State {
                operation,
                state: self.into(),
            })
        }
    }
}

pub trait Executor {
    fn workers(&self) -> usize;

    fn supported(&self) -> &'static [Capability];

    /// Fails with a configuration error naming the first missing capability.
    fn capabilities(&self, required: &[Capability]) -> SpuxResult<()> {
        match required.iter().find(|c| !self.supported().contains(*c)) {
            Some(missing) => Err(SpuxError::Configuration(format!(
                "executor does not support '{}'",
                missing
            ))),
            None => Ok(()),
        }
    }

    /// Manager-side timing accumulated so far.
    fn report(&self) -> Timing;

    /// Tells every worker to exit and releases the group. Terminal.
    fn shutdown(&mut self) -> SpuxResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn capability_names_parse_back() {
        for capability in Capability::iter() {
            let name = capability.to_string();
            assert_eq!(Capability::from_str(&name).unwrap(), capability);
        }
        assert_eq!(Capability::Disconnect.to_string(), "disconnect");
    }

    #[test]
    fn state_guard_names_operation() {
        let err = ExecutorState::Idle
            .require(&[ExecutorState::Ready], "resample")
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid State: cannot resample while idle");
        assert!(ExecutorState::Ready
            .require(&[ExecutorState::Ready], "call")
            .is_ok());
    }
}
