//! Particle-to-worker assignment.
//!
//! A balancer splits the initial particles into per-worker ensembles and,
//! after every resampling step, decides where each survivor and clone lives
//! next. The bookkeeping helpers (`sources`, `traffic`) only read routing
//! tables, so they work for any strategy.

pub mod adaptive;
pub mod traffic;

pub use self::adaptive::Adaptive;
pub use self::traffic::{traffic, traffic_counts, TrafficCounts};

use crate::error::{SpuxError, SpuxResult};
use crate::{Ensemble, ParticleIndex, Routing, Traffic};

/// One routing table per worker: every tuple in which that worker is the
/// source or the destination.
pub type RoutingTables = Vec<Vec<Routing>>;

pub trait Balancer: Send {
    /// Splits `indices` into `workers` contiguous, order-preserving groups.
    fn ensembles(&self, indices: &[ParticleIndex], workers: usize) -> SpuxResult<Vec<Ensemble>> {
        ensembles(indices, workers)
    }

    /// Computes the next generation's ensembles and the routing tables that
    /// take the workers there.
    fn routings(
        &self,
        ensembles: &[Ensemble],
        indices: &[ParticleIndex],
    ) -> SpuxResult<(Vec<Ensemble>, RoutingTables)>;

    fn sources(&self, routings: &[Vec<Routing>]) -> SpuxResult<Vec<ParticleIndex>> {
        sources(routings)
    }

    fn traffic_counts(&self, routings: &[Vec<Routing>]) -> TrafficCounts {
        traffic_counts(routings)
    }

    fn traffic(&self, routings: &[Vec<Routing>]) -> Traffic {
        self.traffic_counts(routings).normalized()
    }
}

/// Balanced chunking: the first `len % workers` groups get one extra element.
pub fn ensembles(indices: &[ParticleIndex], workers: usize) -> SpuxResult<Vec<Ensemble>> {
    if workers < 1 {
        return Err(SpuxError::Configuration(format!(
            "worker count must be at least 1, got {}",
            workers
        )));
    }

    let base = indices.len() / workers;
    let extra = indices.len() % workers;

    let mut result = Vec::with_capacity(workers);
    let mut offset = 0;
    for worker in 0..workers {
        let size = base + usize::from(worker < extra);
        result.push(indices[offset..offset + size].to_vec());
        offset += size;
    }
    Ok(result)
}

/// Total particles described by a set of routing tables: `max(reindex) + 1`.
pub fn particle_count(routings: &[Vec<Routing>]) -> usize {
    routings
        .iter()
        .flatten()
        .filter_map(|r| r.reindex)
        .max()
        .map_or(0, |m| m + 1)
}

/// Inverse map from new reindex to the old index it originated from.
pub fn sources(routings: &[Vec<Routing>]) -> SpuxResult<Vec<ParticleIndex>> {
    let count = particle_count(routings);
    let mut result: Vec<Option<ParticleIndex>> = vec![None; count];

    for routing in routings.iter().flatten() {
        let Some(reindex) = routing.reindex else {
            continue;
        };
        match result[reindex] {
            Some(existing) if existing != routing.index => {
                return Err(SpuxError::Invariant(format!(
                    "reindex {} claimed by particles {} and {}",
                    reindex, existing, routing.index
                )));
            }
            _ => result[reindex] = Some(routing.index),
        }
    }

    result
        .into_iter()
        .enumerate()
        .map(|(reindex, source)| {
            source.ok_or_else(|| {
                SpuxError::Invariant(format!("reindex {} has no originating particle", reindex))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunking_front_loads_remainder() {
        let indices: Vec<usize> = (0..8).collect();
        let result = ensembles(&indices, 3).unwrap();
        assert_eq!(result, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7]]);
    }

    #[test]
    fn chunking_more_workers_than_particles() {
        let result = ensembles(&[4, 9], 4).unwrap();
        assert_eq!(result, vec![vec![4], vec![9], vec![], vec![]]);
    }

    #[test]
    fn chunking_rejects_zero_workers() {
        let err = ensembles(&[0, 1], 0).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn sources_detects_gap() {
        let routings = vec![vec![Routing::stay(3, 0, 0), Routing::stay(5, 0, 2)]];
        assert!(matches!(sources(&routings), Err(SpuxError::Invariant(_))));
    }

    #[test]
    fn sources_detects_conflicting_origin() {
        let routings = vec![
            vec![Routing::stay(3, 0, 0)],
            vec![Routing::stay(4, 1, 0)],
        ];
        assert!(matches!(sources(&routings), Err(SpuxError::Invariant(_))));
    }

    #[test]
    fn sources_tolerates_tuple_listed_twice() {
        let moved = Routing::transfer(7, 0, 1, 0);
        let routings = vec![vec![moved], vec![moved]];
        assert_eq!(sources(&routings).unwrap(), vec![7]);
    }

    #[test]
    fn sources_of_nothing_is_empty() {
        assert!(sources(&[vec![], vec![]]).unwrap().is_empty());
    }
}
