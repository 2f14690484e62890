use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one opaque task evaluation: the value itself plus free-form
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub result: Value,
    #[serde(default)]
    pub info: Value,
}

impl Evaluation {
    pub fn new(result: Value, info: Value) -> Self {
        Self { result, info }
    }
}
