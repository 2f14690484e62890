#![allow(dead_code)] // Not every test binary uses every helper

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use spux_core::error::{SpuxError, SpuxResult};
use spux_core::executor::{Particle, ParticleFactory};
use spux_core::{Ensemble, ParticleIndex};

/// Particle remembering every index it has carried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tracer {
    pub value: f64,
    pub lineage: Vec<ParticleIndex>,
}

impl Particle for Tracer {
    fn call(&mut self, method: &str, args: &[Value]) -> Option<Value> {
        match method {
            "value" => Some(json!(self.value)),
            "lineage" => Some(json!(self.lineage)),
            "add" => {
                self.value += args.first()?.as_f64()?;
                Some(json!(self.value))
            }
            _ => None,
        }
    }

    fn relabel(&mut self, index: ParticleIndex) {
        self.lineage.push(index);
    }
}

pub struct TracerFactory;

impl ParticleFactory for TracerFactory {
    type Particle = Tracer;

    fn create(&self, template: &Value, index: ParticleIndex) -> SpuxResult<Tracer> {
        let offset = template["offset"]
            .as_f64()
            .ok_or_else(|| SpuxError::Validation("template needs an offset".to_string()))?;
        Ok(Tracer {
            value: offset + index as f64,
            lineage: vec![index],
        })
    }
}

pub fn template(offset: f64) -> Value {
    json!({ "offset": offset })
}

/// The three-worker starting point used across the scenarios.
pub fn eight_over_three() -> Vec<Ensemble> {
    vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7]]
}
