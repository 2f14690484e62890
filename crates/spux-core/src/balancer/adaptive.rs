use super::{Balancer, RoutingTables};
use crate::error::{SpuxError, SpuxResult};
use crate::{Ensemble, ParticleIndex, Routing, WorkerId};
use itertools::Itertools;
use std::collections::HashMap;
use tracing::debug;

/// Keeps particles where they are whenever the owner has room, and sends the
/// overflow to the nearest worker with spare capacity.
///
/// Capacity per worker is `ceil(survivors / workers)`. Survivors are
/// reindexed in ascending old-index order, clones included, so the outcome
/// is fully determined by the inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Adaptive;

impl Balancer for Adaptive {
    fn routings(
        &self,
        ensembles: &[Ensemble],
        indices: &[ParticleIndex],
    ) -> SpuxResult<(Vec<Ensemble>, RoutingTables)> {
        let workers = ensembles.len();
        if workers < 1 {
            return Err(SpuxError::Configuration(
                "cannot route particles across zero workers".to_string(),
            ));
        }

        let limit = indices.len().div_ceil(workers);
        let sources = owners(ensembles)?;

        let mut next: Vec<Ensemble> = vec![Vec::new(); workers];
        let mut loads = vec![0usize; workers];
        let mut routings: RoutingTables = vec![Vec::new(); workers];

        // 1. Particles that can stay with their owner.
        let mut remaining: Vec<(ParticleIndex, ParticleIndex, WorkerId)> = Vec::new();
        for (reindex, index) in indices.iter().copied().sorted().enumerate() {
            let source = *sources.get(&index).ok_or_else(|| {
                SpuxError::Invariant(format!("survivor {} is not held by any worker", index))
            })?;

            if loads[source] < limit {
                routings[source].push(Routing::stay(index, source, reindex));
                loads[source] += 1;
                next[source].push(reindex);
            } else {
                remaining.push((reindex, index, source));
            }
        }

        debug!(
            "Adaptive: {} survivors over {} workers (limit {}), {} to relocate",
            indices.len(),
            workers,
            limit,
            remaining.len()
        );

        // 2. Overflow goes to the nearest worker with room; clones of the
        // same particle follow the previous clone while it fits.
        let mut cached: Option<(ParticleIndex, WorkerId)> = None;
        for (reindex, index, source) in remaining {
            let destination = match cached {
                Some((cached_index, cached_destination))
                    if cached_index == index && loads[cached_destination] < limit =>
                {
                    cached_destination
                }
                _ => {
                    let found = nearest_with_capacity(source, &loads, limit).ok_or_else(|| {
                        SpuxError::Invariant(format!(
                            "no worker has capacity for particle {} (limit {})",
                            index, limit
                        ))
                    })?;
                    cached = Some((index, found));
                    found
                }
            };

            let routing = Routing::transfer(index, source, destination, reindex);
            routings[source].push(routing);
            routings[destination].push(routing);
            loads[destination] += 1;
            next[destination].push(reindex);
        }

        Ok((next, routings))
    }
}

/// Maps every old particle to the worker holding it.
fn owners(ensembles: &[Ensemble]) -> SpuxResult<HashMap<ParticleIndex, WorkerId>> {
    let mut owners = HashMap::with_capacity(ensembles.iter().map(Vec::len).sum());
    for (worker, ensemble) in ensembles.iter().enumerate() {
        for &index in ensemble {
            if let Some(previous) = owners.insert(index, worker) {
                return Err(SpuxError::Invariant(format!(
                    "particle {} held by workers {} and {}",
                    index, previous, worker
                )));
            }
        }
    }
    Ok(owners)
}

/// Alternates outward from `source`, right neighbour before left.
fn nearest_with_capacity(source: WorkerId, loads: &[usize], limit: usize) -> Option<WorkerId> {
    let workers = loads.len();
    (0..workers / 2)
        .flat_map(|i| {
            let right = (source + i + 1) % workers;
            let left = (source + workers - i - 1) % workers;
            [right, left]
        })
        .find(|&worker| loads[worker] < limit)
}
