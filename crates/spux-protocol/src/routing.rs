use crate::{ParticleIndex, WorkerId};
use serde::{Deserialize, Serialize};

/// One particle's transition across a resampling round.
///
/// `source == None` marks a particle with no prior owner (init) and
/// `destination == None` marks a kill. Kills carry no reindex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Routing {
    pub index: ParticleIndex,
    pub source: Option<WorkerId>,
    pub destination: Option<WorkerId>,
    pub reindex: Option<ParticleIndex>,
}

impl Routing {
    /// Particle stays on (or is copied within) `worker`.
    pub fn stay(index: ParticleIndex, worker: WorkerId, reindex: ParticleIndex) -> Self {
        Self::transfer(index, worker, worker, reindex)
    }

    pub fn transfer(
        index: ParticleIndex,
        source: WorkerId,
        destination: WorkerId,
        reindex: ParticleIndex,
    ) -> Self {
        Self {
            index,
            source: Some(source),
            destination: Some(destination),
            reindex: Some(reindex),
        }
    }

    pub fn init(index: ParticleIndex, destination: WorkerId, reindex: ParticleIndex) -> Self {
        Self {
            index,
            source: None,
            destination: Some(destination),
            reindex: Some(reindex),
        }
    }

    pub fn kill(index: ParticleIndex, source: WorkerId) -> Self {
        Self {
            index,
            source: Some(source),
            destination: None,
            reindex: None,
        }
    }

    /// True when the particle changes worker.
    pub fn is_move(&self) -> bool {
        matches!((self.source, self.destination), (Some(s), Some(d)) if s != d)
    }

    pub fn touches(&self, worker: WorkerId) -> bool {
        self.source == Some(worker) || self.destination == Some(worker)
    }
}

/// Per-particle traffic rates of one resampling round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Traffic {
    pub init: f64,
    #[serde(rename = "move")]
    pub moves: f64,
    pub cost: f64,
    pub copy: f64,
    pub kill: f64,
}
