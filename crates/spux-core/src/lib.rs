// Re-export the shared wire types so they are reachable as spux_core::*
pub use spux_protocol as protocol;
pub use spux_protocol::{
    CallRequest, Ensemble, Evaluation, Instruction, ParticleIndex, Routing, Traffic, WorkerId,
};

// Internal Modules
pub mod balancer;
pub mod comm;
pub mod config;
pub mod consts;
pub mod error;
pub mod executor;
pub mod resampling;
pub mod timing;

pub use self::error::{SpuxError, SpuxResult};
