//! Load-balanced particle executors.
//!
//! Re-exports `spux-core` plus a prelude carrying what a sampler needs to
//! drive an ensemble: executors, the particle traits and the JSON values
//! particles exchange.

pub use spux_core::*;

pub mod prelude {
    pub use serde_json::{json, Value};
    pub use spux_core::balancer::{Adaptive, Balancer};
    pub use spux_core::executor::{
        Capability, EnsembleExecutor, Executor, ExecutorState, Particle, ParticleFactory,
        PoolExecutor, Task,
    };
    pub use spux_core::resampling::{clamp_particles, log_mean_exp, redraw, Redraw};
    pub use spux_core::timing::Timing;
    pub use spux_core::{
        Ensemble, Evaluation, ParticleIndex, SpuxError, SpuxResult, Traffic, WorkerId,
    };
}
