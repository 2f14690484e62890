use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumIter, EnumString};

/// Control word broadcast by the manager ahead of every collective step.
///
/// Workers block on the next instruction and act on it; `Exit` is terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Instruction {
    Init,
    Call,
    Resample,
    Done,
    Exit,
}

impl Instruction {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exit)
    }
}

/// Payload following an `Instruction::Call` broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default = "default_expect_results")]
    pub expect_results: bool,
}

fn default_expect_results() -> bool {
    true
}

impl CallRequest {
    pub fn new(method: impl Into<String>, args: Vec<Value>, expect_results: bool) -> Self {
        Self {
            method: method.into(),
            args,
            expect_results,
        }
    }
}
