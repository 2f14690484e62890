//! Toy random-walk model driving the `simulate` command.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use spux_core::error::{SpuxError, SpuxResult};
use spux_core::executor::{Particle, ParticleFactory};
use spux_core::ParticleIndex;
use std::f64::consts::PI;

const GOLDEN: u64 = 0x9E37_79B9_7F4A_7C15;

/// Standard normal draw (Box-Muller).
pub fn gaussian(rng: &mut fastrand::Rng) -> f64 {
    let u = 1.0 - rng.f64();
    let v = rng.f64();
    (-2.0 * u.ln()).sqrt() * (2.0 * PI * v).cos()
}

/// Position of a Gaussian random walk.
///
/// The generator state travels with the particle so a moved particle
/// continues the same stream; relabelling splits the streams of clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Walker {
    pub position: f64,
    pub noise: f64,
    pub state: u64,
}

impl Walker {
    fn step(&mut self, steps: u64) {
        let mut rng = fastrand::Rng::with_seed(self.state);
        for _ in 0..steps {
            self.position += self.noise * gaussian(&mut rng);
        }
        self.state = rng.u64(..);
    }

    fn log_likelihood(&self, observation: f64, sigma: f64) -> f64 {
        let z = (observation - self.position) / sigma;
        -0.5 * z * z - sigma.ln() - 0.5 * (2.0 * PI).ln()
    }
}

impl Particle for Walker {
    fn call(&mut self, method: &str, args: &[Value]) -> Option<Value> {
        match method {
            "run" => {
                let steps = args.first().and_then(Value::as_u64).unwrap_or(1);
                self.step(steps);
                Some(json!(self.position))
            }
            "errors" => {
                let observation = args.first()?.as_f64()?;
                let sigma = args.get(1)?.as_f64()?;
                Some(json!(self.log_likelihood(observation, sigma)))
            }
            "position" => Some(json!(self.position)),
            _ => None,
        }
    }

    fn relabel(&mut self, index: ParticleIndex) {
        self.state ^= (index as u64 + 1).wrapping_mul(GOLDEN);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkTemplate {
    pub start: f64,
    pub noise: f64,
    pub seed: u64,
}

pub struct WalkFactory;

impl ParticleFactory for WalkFactory {
    type Particle = Walker;

    fn create(&self, template: &Value, index: ParticleIndex) -> SpuxResult<Walker> {
        let template: WalkTemplate = serde_json::from_value(template.clone())?;
        if !(template.noise > 0.0) {
            return Err(SpuxError::Validation(format!(
                "walk noise must be positive, got {}",
                template.noise
            )));
        }
        Ok(Walker {
            position: template.start,
            noise: template.noise,
            state: template.seed.wrapping_add((index as u64).wrapping_mul(GOLDEN)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walker() -> Walker {
        let template = json!({ "start": 0.0, "noise": 1.0, "seed": 1 });
        WalkFactory.create(&template, 0).unwrap()
    }

    #[test]
    fn moved_copy_continues_the_stream() {
        let mut a = walker();
        let mut b: Walker = serde_json::from_value(serde_json::to_value(&a).unwrap()).unwrap();
        a.call("run", &[json!(3)]);
        b.call("run", &[json!(3)]);
        assert_eq!(a.position, b.position);
    }

    #[test]
    fn relabelled_clones_diverge() {
        let mut a = walker();
        let mut b = a.clone();
        a.relabel(0);
        b.relabel(1);
        a.call("run", &[]);
        b.call("run", &[]);
        assert_ne!(a.position, b.position);
    }

    #[test]
    fn likelihood_peaks_at_position() {
        let mut w = walker();
        let at = w.call("errors", &[json!(0.0), json!(1.0)]).unwrap();
        let off = w.call("errors", &[json!(2.0), json!(1.0)]).unwrap();
        assert!(at.as_f64().unwrap() > off.as_f64().unwrap());
        assert!(w.call("errors", &[json!(0.0)]).is_none());
    }

    #[test]
    fn bad_template_is_rejected() {
        assert!(WalkFactory.create(&json!({ "start": 0.0 }), 0).is_err());
        let flat = json!({ "start": 0.0, "noise": 0.0, "seed": 1 });
        assert!(WalkFactory.create(&flat, 0).is_err());
    }
}
