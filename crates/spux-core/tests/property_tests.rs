use proptest::prelude::*;
use spux_core::balancer::{self, traffic_counts, Adaptive, Balancer};
use spux_core::{Ensemble, ParticleIndex};

// --- STRATEGIES ---

prop_compose! {
    fn arb_round()(
        workers in 1usize..9,
        particles in 1usize..60
    )(
        survivors in proptest::collection::vec(0..particles, 0..90),
        workers in Just(workers),
        particles in Just(particles)
    ) -> (Vec<Ensemble>, Vec<ParticleIndex>) {
        let indices: Vec<usize> = (0..particles).collect();
        let ensembles = balancer::ensembles(&indices, workers).unwrap();
        (ensembles, survivors)
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn test_ensembles_cover_indices_in_order(
        indices in proptest::collection::vec(0usize..1000, 0..100),
        workers in 1usize..12
    ) {
        let ensembles = Adaptive.ensembles(&indices, workers).unwrap();
        prop_assert_eq!(ensembles.len(), workers);
        prop_assert_eq!(ensembles.concat(), indices);

        let longest = ensembles.iter().map(Vec::len).max().unwrap_or(0);
        let shortest = ensembles.iter().map(Vec::len).min().unwrap_or(0);
        prop_assert!(longest - shortest <= 1);
    }

    #[test]
    fn test_routing_conserves_survivors((ensembles, survivors) in arb_round()) {
        let (next, routings) = Adaptive.routings(&ensembles, &survivors).unwrap();

        let mut reindices: Vec<usize> = next.concat();
        reindices.sort_unstable();
        prop_assert_eq!(reindices, (0..survivors.len()).collect::<Vec<_>>());

        // Each worker's new ensemble follows from its own table.
        for (worker, table) in routings.iter().enumerate() {
            let arrivals = table
                .iter()
                .filter(|r| r.destination == Some(worker))
                .count();
            prop_assert_eq!(arrivals, next[worker].len());
        }
    }

    #[test]
    fn test_routing_respects_capacity((ensembles, survivors) in arb_round()) {
        let limit = survivors.len().div_ceil(ensembles.len());
        let (next, _) = Adaptive.routings(&ensembles, &survivors).unwrap();
        for ensemble in &next {
            prop_assert!(ensemble.len() <= limit);
        }
    }

    #[test]
    fn test_sources_follow_sorted_survivors((ensembles, survivors) in arb_round()) {
        let (_, routings) = Adaptive.routings(&ensembles, &survivors).unwrap();
        let sources = Adaptive.sources(&routings).unwrap();

        let mut sorted = survivors.clone();
        sorted.sort_unstable();
        prop_assert_eq!(sources, sorted);
    }

    #[test]
    fn test_traffic_is_normalized_counts((ensembles, survivors) in arb_round()) {
        let (_, routings) = Adaptive.routings(&ensembles, &survivors).unwrap();
        let counts = traffic_counts(&routings);
        let traffic = Adaptive.traffic(&routings);

        prop_assert_eq!(counts.particles, survivors.len());
        if survivors.is_empty() {
            prop_assert_eq!(traffic.moves, 0.0);
        } else {
            let n = survivors.len() as f64;
            prop_assert_eq!(traffic.moves, counts.moves as f64 / n);
            prop_assert_eq!(traffic.copy, counts.copies as f64 / n);
            prop_assert_eq!(traffic.cost, counts.costs as f64 / n);
        }
        // Adaptive never creates or kills explicitly.
        prop_assert_eq!(counts.inits + counts.kills, 0);
    }

    #[test]
    fn test_routing_is_deterministic((ensembles, survivors) in arb_round()) {
        let first = Adaptive.routings(&ensembles, &survivors).unwrap();
        let second = Adaptive.routings(&ensembles, &survivors).unwrap();
        prop_assert_eq!(first, second);
    }
}
