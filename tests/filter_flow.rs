use rstest::rstest;
use serde::{Deserialize, Serialize};
use spux::prelude::*;

/// Remembers the initial particle it descends from.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Ancestor {
    origin: ParticleIndex,
    steepness: f64,
}

impl Particle for Ancestor {
    fn call(&mut self, method: &str, _args: &[Value]) -> Option<Value> {
        match method {
            "origin" => Some(json!(self.origin)),
            // Low origins are favoured.
            "errors" => Some(json!(-self.steepness * self.origin as f64)),
            _ => None,
        }
    }
}

struct AncestorFactory;

impl ParticleFactory for AncestorFactory {
    type Particle = Ancestor;

    fn create(&self, template: &Value, index: ParticleIndex) -> SpuxResult<Ancestor> {
        Ok(Ancestor {
            origin: index,
            steepness: template["steepness"].as_f64().unwrap_or(0.0),
        })
    }
}

fn numbers(values: Vec<Value>) -> Vec<f64> {
    values.iter().filter_map(Value::as_f64).collect()
}

#[rstest]
#[case(1, 8)]
#[case(3, 8)]
#[case(4, 30)]
#[case(7, 50)]
fn test_filter_rounds_keep_lineage_and_balance(#[case] workers: usize, #[case] particles: usize) {
    let mut executor = EnsembleExecutor::spawn_local(workers, AncestorFactory).unwrap();
    executor
        .capabilities(&[
            Capability::Connect,
            Capability::Call,
            Capability::Resample,
            Capability::Disconnect,
        ])
        .unwrap();

    let mut indices: Vec<ParticleIndex> = (0..particles).collect();
    let mut origins: Vec<usize> = indices.clone();
    executor
        .connect(json!({ "steepness": 0.3 }), &indices)
        .unwrap();

    let mut rng = fastrand::Rng::with_seed(11);
    let limit = particles.div_ceil(workers);
    for _ in 0..5 {
        let errors = numbers(executor.call("errors", vec![], true).unwrap());
        assert_eq!(errors.len(), particles);

        let drawn = redraw(&indices, &errors, particles, &mut rng).unwrap();
        assert!(drawn.rate > 0.0 && drawn.rate <= 1.0);

        let (traffic, sources) = executor.resample(&drawn.choice).unwrap();
        assert!(traffic.moves >= 0.0 && traffic.copy >= 0.0);
        if workers == 1 {
            assert_eq!(traffic.moves, 0.0);
        }

        origins = sources.iter().map(|&s| origins[s]).collect();
        indices = (0..particles).collect();

        let held = numbers(executor.call("origin", vec![], true).unwrap());
        let expected: Vec<f64> = origins.iter().map(|&o| o as f64).collect();
        assert_eq!(held, expected);
        assert!(executor.ensembles().iter().all(|e| e.len() <= limit));
    }

    let timings = executor.disconnect().unwrap();
    assert_eq!(timings.len(), workers);
    let total: Timing = timings.into_iter().sum();
    assert_eq!(total.calls("resample"), 5 * workers);
    executor.shutdown().unwrap();
}

#[test]
fn test_uniform_errors_with_nan_never_draw_nan() {
    let mut executor = EnsembleExecutor::spawn_local(2, AncestorFactory).unwrap();
    let indices: Vec<ParticleIndex> = (0..6).collect();
    executor.connect(json!({}), &indices).unwrap();

    let mut errors = numbers(executor.call("errors", vec![], true).unwrap());
    errors[2] = f64::NAN;
    let mut rng = fastrand::Rng::with_seed(3);
    let drawn = redraw(&indices, &errors, 6, &mut rng).unwrap();
    assert!(!drawn.choice.contains(&2));

    let (_, sources) = executor.resample(&drawn.choice).unwrap();
    let mut sorted = drawn.choice.clone();
    sorted.sort_unstable();
    assert_eq!(sources, sorted);
    executor.shutdown().unwrap();
}

#[test]
fn test_dropping_a_connected_executor_stops_workers() {
    let mut executor = EnsembleExecutor::spawn_local(3, AncestorFactory).unwrap();
    executor.connect(json!({}), &[0, 1, 2, 3]).unwrap();
    drop(executor);
}

fn echo(parameters: &Value) -> Option<Evaluation> {
    Some(Evaluation::new(parameters.clone(), Value::Null))
}

#[test]
fn test_pool_and_ensemble_capabilities_differ() {
    let pool = PoolExecutor::spawn_local(2, |_: WorkerId| echo).unwrap();
    assert!(pool.capabilities(&[Capability::Map]).is_ok());
    assert!(matches!(
        pool.capabilities(&[Capability::Connect]),
        Err(SpuxError::Configuration(_))
    ));
}

#[test]
fn test_clamp_gives_every_worker_a_particle() {
    let particles = clamp_particles(2, 5);
    let ensembles = Adaptive.ensembles(&(0..particles).collect::<Vec<_>>(), 5).unwrap();
    assert!(ensembles.iter().all(|e| e.len() == 1));
}
