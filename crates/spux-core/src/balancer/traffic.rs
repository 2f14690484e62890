use super::particle_count;
use crate::{ParticleIndex, Routing, Traffic};
use std::collections::BTreeMap;

/// Raw traffic counters of one round, before normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficCounts {
    pub inits: usize,
    pub moves: usize,
    pub costs: usize,
    pub copies: usize,
    pub kills: usize,
    pub particles: usize,
}

impl TrafficCounts {
    /// Divides every counter by the particle count.
    pub fn normalized(&self) -> Traffic {
        if self.particles == 0 {
            return Traffic::default();
        }
        let n = self.particles as f64;
        Traffic {
            init: self.inits as f64 / n,
            moves: self.moves as f64 / n,
            cost: self.costs as f64 / n,
            copy: self.copies as f64 / n,
            kill: self.kills as f64 / n,
        }
    }
}

// Per (worker, particle) ledger.
#[derive(Default)]
struct Ledger {
    moved: bool,
    cost: usize,
    copies: usize,
}

pub fn traffic_counts(routings: &[Vec<Routing>]) -> TrafficCounts {
    let mut counts = TrafficCounts {
        particles: particle_count(routings),
        ..Default::default()
    };

    for (address, table) in routings.iter().enumerate() {
        let mut ledgers: BTreeMap<ParticleIndex, Ledger> = BTreeMap::new();

        for routing in table {
            let ledger = ledgers.entry(routing.index).or_default();
            match (routing.source, routing.destination) {
                (None, _) => counts.inits += 1,
                (Some(_), None) => counts.kills += 1,
                (Some(source), Some(destination)) if destination == address => {
                    if source == address {
                        ledger.copies += 1;
                    } else if !ledger.moved {
                        // Only the first arrival is a transfer; later clones
                        // are duplicated locally.
                        ledger.moved = true;
                        ledger.cost += source.abs_diff(destination);
                    } else {
                        ledger.copies += 1;
                    }
                }
                // Outgoing half of a move, counted at the destination.
                _ => {}
            }
        }

        for ledger in ledgers.values() {
            counts.moves += usize::from(ledger.moved);
            counts.costs += ledger.cost;
            // The first copy establishes the particle and costs nothing.
            counts.copies += ledger.copies.saturating_sub(1);
        }
    }

    counts
}

/// Per-particle traffic rates of a full set of routing tables.
pub fn traffic(routings: &[Vec<Routing>]) -> Traffic {
    traffic_counts(routings).normalized()
}
