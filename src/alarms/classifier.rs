use crate::alarms::config::ThresholdConfig;
use crate::error::EngineError;
use crate::models::ThresholdBand;

/// Maps a scalar reading onto one of the five threshold bands.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdClassifier {
    config: ThresholdConfig,
}

impl ThresholdClassifier {
    pub fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    /// High bands take precedence over low ones; both bounds are inclusive,
    /// so NORMAL is the open interval (low, high).
    pub fn classify(&self, value: f64) -> Result<ThresholdBand, EngineError> {
        if !value.is_finite() {
            return Err(EngineError::invalid(format!("cannot classify {value}")));
        }

        let c = &self.config;
        let band = if value >= c.high_high {
            ThresholdBand::HighHigh
        } else if value >= c.high {
            ThresholdBand::High
        } else if value <= c.low_low {
            ThresholdBand::LowLow
        } else if value <= c.low {
            ThresholdBand::Low
        } else {
            ThresholdBand::Normal
        };
        Ok(band)
    }
}
