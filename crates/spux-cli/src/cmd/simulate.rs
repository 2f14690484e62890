use crate::model::{gaussian, WalkFactory, WalkTemplate};
use crate::reports;
use clap::Args;
use serde::Serialize;
use serde_json::json;
use spux_core::config::Config;
use spux_core::consts::TIMING_CALL;
use spux_core::error::{SpuxError, SpuxResult};
use spux_core::executor::{Capability, EnsembleExecutor, Executor};
use spux_core::resampling::{clamp_particles, log_mean_exp, redraw};
use spux_core::timing::Timing;
use spux_core::{ParticleIndex, Traffic};
use tracing::{debug, info};

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub config: Config,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// Filter diagnostics of one observation.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub observation: f64,
    pub log_likelihood: f64,
    pub redraw_rate: f64,
    pub traffic: Traffic,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub workers: usize,
    pub particles: usize,
    pub estimate: f64,
    pub snapshots: Vec<Snapshot>,
    pub timing: Timing,
    pub worker_timing: Timing,
}

/// Synthetic observations of a walk started at zero.
fn observations(config: &Config, rng: &mut fastrand::Rng) -> Vec<f64> {
    let mut truth = 0.0;
    (0..config.filter.snapshots)
        .map(|_| {
            truth += config.filter.noise * gaussian(rng);
            truth + config.filter.observation_noise * gaussian(rng)
        })
        .collect()
}

fn as_f64s(values: Vec<serde_json::Value>) -> SpuxResult<Vec<f64>> {
    values
        .into_iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| SpuxError::Validation(format!("expected a number, got {}", v)))
        })
        .collect()
}

pub fn filter(config: &Config) -> SpuxResult<SimulationReport> {
    config.validate()?;
    let workers = config.executor.workers;
    let particles = clamp_particles(config.filter.particles, workers);
    let mut rng = fastrand::Rng::with_seed(config.filter.seed);
    let data = observations(config, &mut rng);

    let mut executor = EnsembleExecutor::spawn_local(workers, WalkFactory)?;
    executor.capabilities(&[
        Capability::Connect,
        Capability::Call,
        Capability::Resample,
        Capability::Disconnect,
    ])?;

    let template = WalkTemplate {
        start: 0.0,
        noise: config.filter.noise,
        seed: rng.u64(..),
    };
    let mut indices: Vec<ParticleIndex> = (0..particles).collect();
    executor.connect(serde_json::to_value(&template)?, &indices)?;

    let mut estimate = 0.0;
    let mut snapshots = Vec::with_capacity(data.len());
    for (step, &observation) in data.iter().enumerate() {
        executor.call("run", vec![json!(1)], false)?;
        let errors = as_f64s(executor.call(
            "errors",
            vec![json!(observation), json!(config.filter.observation_noise)],
            true,
        )?)?;

        let log_likelihood = log_mean_exp(&errors);
        estimate += log_likelihood;

        let drawn = redraw(&indices, &errors, particles, &mut rng)?;
        let (traffic, _) = executor.resample(&drawn.choice)?;
        indices = (0..particles).collect();

        debug!(
            "Snapshot {}: log-likelihood {:.3}, redraw rate {:.2}, move {:.3}",
            step, log_likelihood, drawn.rate, traffic.moves
        );
        snapshots.push(Snapshot {
            observation,
            log_likelihood,
            redraw_rate: drawn.rate,
            traffic,
        });
    }

    let worker_timing: Timing = executor.disconnect()?.into_iter().sum();
    let timing = executor.report();
    executor.shutdown()?;

    info!(
        "Filtered {} snapshots with {} particles: log-likelihood {:.4} ({:.3}s in calls)",
        snapshots.len(),
        particles,
        estimate,
        timing.runtime(TIMING_CALL)
    );

    Ok(SimulationReport {
        workers,
        particles,
        estimate,
        snapshots,
        timing,
        worker_timing,
    })
}

pub fn run(args: SimulateArgs) -> SpuxResult<()> {
    let report = filter(&args.config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let rows: Vec<(usize, Traffic)> = report
        .snapshots
        .iter()
        .enumerate()
        .map(|(i, s)| (i, s.traffic))
        .collect();
    reports::print_snapshots(&report.snapshots);
    reports::print_traffic(&rows);
    reports::print_timing(&report.timing, &report.worker_timing);
    println!("Log-likelihood estimate: {:.6}", report.estimate);
    Ok(())
}
