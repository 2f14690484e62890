use crate::reports;
use clap::Args;
use spux_core::balancer::{Adaptive, Balancer};
use spux_core::consts::TIMING_ROUTING;
use spux_core::error::{SpuxError, SpuxResult};
use spux_core::resampling::redraw;
use spux_core::timing::Timing;
use spux_core::{ParticleIndex, Traffic};
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct BenchmarkArgs {
    #[arg(long, default_value_t = 200)]
    pub rounds: usize,

    #[arg(long, default_value_t = 1024)]
    pub particles: usize,

    /// Comma-separated worker counts to compare.
    #[arg(long, default_value = "2,4,8,16")]
    pub workers: String,

    /// Spread of the synthetic log-errors; larger means fewer survivors.
    #[arg(long, default_value_t = 5.0)]
    pub spread: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Averages over all rounds for one worker count.
#[derive(Debug, Clone)]
pub struct BenchmarkRow {
    pub workers: usize,
    pub rounds: usize,
    pub routing_ms: f64,
    pub traffic: Traffic,
}

fn worker_counts(list: &str) -> SpuxResult<Vec<usize>> {
    list.split(',')
        .map(|s| {
            s.trim()
                .parse()
                .map_err(|_| SpuxError::Configuration(format!("bad worker count '{}'", s)))
        })
        .collect()
}

pub fn measure(args: &BenchmarkArgs, workers: usize) -> SpuxResult<BenchmarkRow> {
    let mut rng = fastrand::Rng::with_seed(args.seed);
    let indices: Vec<ParticleIndex> = (0..args.particles).collect();
    let mut ensembles = Adaptive.ensembles(&indices, workers)?;
    let mut timing = Timing::new();
    let mut total = Traffic::default();

    for _ in 0..args.rounds {
        let errors: Vec<f64> = (0..args.particles)
            .map(|_| -args.spread * rng.f64())
            .collect();
        let drawn = redraw(&indices, &errors, args.particles, &mut rng)?;

        timing.start(TIMING_ROUTING);
        let (next, routings) = Adaptive.routings(&ensembles, &drawn.choice)?;
        let traffic = Adaptive.traffic(&routings);
        timing.time(TIMING_ROUTING);

        total.moves += traffic.moves;
        total.copy += traffic.copy;
        total.cost += traffic.cost;
        ensembles = next;
    }

    let rounds = args.rounds.max(1) as f64;
    Ok(BenchmarkRow {
        workers,
        rounds: args.rounds,
        routing_ms: 1000.0 * timing.runtime(TIMING_ROUTING) / rounds,
        traffic: Traffic {
            moves: total.moves / rounds,
            copy: total.copy / rounds,
            cost: total.cost / rounds,
            ..Default::default()
        },
    })
}

pub fn run(args: BenchmarkArgs) -> SpuxResult<()> {
    let counts = worker_counts(&args.workers)?;
    info!(
        "Benchmarking {} rounds of {} particles over {:?} workers",
        args.rounds, args.particles, counts
    );

    let rows = counts
        .into_iter()
        .map(|workers| measure(&args, workers))
        .collect::<SpuxResult<Vec<_>>>()?;
    reports::print_benchmark(&rows);
    Ok(())
}
