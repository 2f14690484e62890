//! Plain data exchanged between the manager and its workers.
//!
//! Nothing in here talks to a transport; these are the values that travel
//! through one.

pub mod instruction;
pub mod routing;
pub mod task;

pub use self::instruction::{CallRequest, Instruction};
pub use self::routing::{Routing, Traffic};
pub use self::task::Evaluation;

/// Identity of a unit of work (a particle) within one generation.
pub type ParticleIndex = usize;

/// Address of a worker inside the group, `0..workers`.
pub type WorkerId = usize;

/// Ordered particle indices held by a single worker.
pub type Ensemble = Vec<ParticleIndex>;
