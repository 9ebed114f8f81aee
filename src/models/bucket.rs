use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One fixed-width slot of a resampled series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub label: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Aggregated value; `None` for an empty bucket under average/min/max.
    pub value: Option<f64>,
    pub count: usize,
}

/// A plain (time, value) point for charting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimedValue {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}
