//! Threshold bands and alarm episodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThresholdBand {
    HighHigh,
    High,
    Normal,
    Low,
    LowLow,
}

impl ThresholdBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdBand::HighHigh => "HIGH_HIGH",
            ThresholdBand::High => "HIGH",
            ThresholdBand::Normal => "NORMAL",
            ThresholdBand::Low => "LOW",
            ThresholdBand::LowLow => "LOW_LOW",
        }
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, ThresholdBand::Normal)
    }

    /// 0 for NORMAL, 1 for HIGH/LOW, 2 for HIGH_HIGH/LOW_LOW.
    pub fn severity(&self) -> u8 {
        match self {
            ThresholdBand::Normal => 0,
            ThresholdBand::High | ThresholdBand::Low => 1,
            ThresholdBand::HighHigh | ThresholdBand::LowLow => 2,
        }
    }
}

impl std::fmt::Display for ThresholdBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contiguous run of abnormal readings for one (device, sensor) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlarmEpisode {
    pub id: String,
    pub device_id: String,
    pub sensor_id: String,
    pub opened_at: DateTime<Utc>,
    /// Band of the most recent reading.
    pub level: ThresholdBand,
    /// Most severe band seen during the episode.
    pub peak_level: ThresholdBand,
    pub last_value: f64,
    pub last_seen_at: DateTime<Utc>,
    pub sample_count: u64,
    pub notified: bool,
}

impl AlarmEpisode {
    pub fn duration(&self) -> chrono::Duration {
        self.last_seen_at - self.opened_at
    }
}
