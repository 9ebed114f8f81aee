//! Working periods and equipment status spans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Anything that covers a time range, for splitting hours across buckets.
pub trait Interval {
    fn interval(&self) -> (DateTime<Utc>, DateTime<Utc>);
}

pub(crate) fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let millis = (end - start).num_milliseconds().max(0);
    millis as f64 / 3_600_000.0
}

/// A span during which a device's "active" predicate held.
///
/// Ongoing periods have `end` set to the evaluation time the reconstructor was
/// given, so their duration changes from run to run and they are never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkingPeriod {
    pub device_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub ongoing: bool,
    pub duration_hours: f64,
}

impl WorkingPeriod {
    pub fn closed(device_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.to_string(),
            start,
            end,
            ongoing: false,
            duration_hours: hours_between(start, end),
        }
    }

    /// `end` never precedes `start`, even when `now` does.
    pub fn ongoing(device_id: &str, start: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let end = now.max(start);
        Self {
            device_id: device_id.to_string(),
            start,
            end,
            ongoing: true,
            duration_hours: hours_between(start, end),
        }
    }

    /// `None` while the period is still open.
    pub fn closed_end(&self) -> Option<DateTime<Utc>> {
        (!self.ongoing).then_some(self.end)
    }
}

impl Interval for WorkingPeriod {
    fn interval(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start, self.end)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkingSummary {
    pub device_id: String,
    pub periods: Vec<WorkingPeriod>,
    pub closed_hours: f64,
    pub ongoing_hours: f64,
    pub total_hours: f64,
    pub has_ongoing: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum EquipmentStatus {
    Working,
    Maintenance,
    Error,
    Idle,
}

impl EquipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentStatus::Working => "working",
            EquipmentStatus::Maintenance => "maintenance",
            EquipmentStatus::Error => "error",
            EquipmentStatus::Idle => "idle",
        }
    }
}

/// Time a device spent in one status, from one event to the next.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusSpan {
    pub device_id: String,
    pub status: EquipmentStatus,
    pub code: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_hours: f64,
}

impl Interval for StatusSpan {
    fn interval(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start, self.end)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusHours {
    pub working_hours: f64,
    pub maintenance_hours: f64,
    pub error_hours: f64,
    pub idle_hours: f64,
}
