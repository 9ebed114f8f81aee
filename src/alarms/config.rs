use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Breakpoints for the four alarm bands. Must satisfy
/// `high_high > high > low > low_low`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
    pub high_high: f64,
    pub high: f64,
    pub low: f64,
    pub low_low: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            high_high: 50.0,
            high: 35.0,
            low: 25.0,
            low_low: 10.0,
        }
    }
}

impl ThresholdConfig {
    pub fn validate(&self) -> Result<()> {
        let points = [self.high_high, self.high, self.low, self.low_low];
        if points.iter().any(|p| !p.is_finite()) {
            bail!("threshold breakpoints must be finite numbers");
        }
        if !(self.high_high > self.high && self.high > self.low && self.low > self.low_low) {
            bail!(
                "thresholds must be strictly ordered highHigh > high > low > lowLow, got {} / {} / {} / {}",
                self.high_high,
                self.high,
                self.low,
                self.low_low
            );
        }
        Ok(())
    }
}
