use serde::{Deserialize, Serialize};

use crate::models::Reading;

/// Default "is working" rule for digital-input devices: the active input is
/// on and, when configured, the idle input is off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPredicate {
    pub active_input: String,
    pub idle_input: Option<String>,
}

impl Default for ActivityPredicate {
    fn default() -> Self {
        Self {
            active_input: "input1".into(),
            idle_input: Some("input2".into()),
        }
    }
}

impl ActivityPredicate {
    /// `None` when an input the rule needs is missing or unreadable.
    pub fn evaluate(&self, reading: &Reading) -> Option<bool> {
        let active = reading.input_level(&self.active_input)?;
        let idle = match &self.idle_input {
            Some(name) => reading.input_level(name)?,
            None => false,
        };
        Some(active && !idle)
    }
}
