use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Ten years; longer horizons would overflow chrono durations.
pub const MAX_HORIZON_HOURS: i64 = 10 * 365 * 24;

/// Tunables for resampling. The auto-granularity cut-offs are empirical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BucketConfig {
    /// Spans up to this many hours resolve to hourly buckets.
    pub hourly_max_span_hours: i64,
    /// Spans up to this many days resolve to daily buckets; longer is weekly.
    pub daily_max_span_days: i64,
    /// Point cap for stride downsampling of raw series.
    pub max_points: usize,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            hourly_max_span_hours: 48,
            daily_max_span_days: 60,
            max_points: 300,
        }
    }
}

impl BucketConfig {
    pub fn validate(&self) -> Result<()> {
        if self.hourly_max_span_hours <= 0 || self.daily_max_span_days <= 0 {
            bail!("auto granularity cut-offs must be positive");
        }
        if self.hourly_max_span_hours > MAX_HORIZON_HOURS || self.daily_max_span_days > MAX_HORIZON_HOURS / 24 {
            bail!("auto granularity cut-offs must not exceed {MAX_HORIZON_HOURS} hours");
        }
        if self.daily_max_span_days * 24 < self.hourly_max_span_hours {
            bail!(
                "dailyMaxSpanDays ({}) must cover at least hourlyMaxSpanHours ({})",
                self.daily_max_span_days,
                self.hourly_max_span_hours
            );
        }
        if self.max_points == 0 {
            bail!("maxPoints must be at least 1");
        }
        Ok(())
    }
}
