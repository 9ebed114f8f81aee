use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geo::Coordinates;

/// Distance travelled by one device over one window, rebuilt from raw readings
/// on every call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DistanceSummary {
    pub device_id: String,
    pub distance_meters: f64,
    pub start_location: Option<Coordinates>,
    pub end_location: Option<Coordinates>,
    pub valid_points: usize,
    pub skipped_points: usize,
}

impl DistanceSummary {
    pub fn has_position(&self) -> bool {
        self.valid_points > 0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FleetDistanceSummary {
    pub per_device: BTreeMap<String, DistanceSummary>,
    pub total_distance: f64,
    pub average_distance: f64,
    /// Devices with at least one valid position; the average's denominator.
    pub reporting_devices: usize,
}
