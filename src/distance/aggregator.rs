use std::borrow::Borrow;
use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::error::BatchIssues;
use crate::geo::{haversine_meters, round2, Coordinates};
use crate::models::{DistanceSummary, FleetDistanceSummary, Reading};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// UTC day window `[00:00, next 00:00)` for a calendar date.
pub fn day_window(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

/// Distance travelled by one device between `from` (inclusive) and `to`
/// (exclusive). Bad positions are dropped as sensor noise and only counted.
pub fn distance_in_range(
    device_id: &str,
    readings: &[Reading],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> DistanceSummary {
    let mut skipped = 0;
    let mut points: Vec<(DateTime<Utc>, Coordinates)> = Vec::new();

    for reading in readings {
        let at = match reading.observed_at() {
            Ok(at) => at,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };
        if at < from || at >= to {
            continue;
        }
        match reading.coordinates() {
            Ok(coords) => points.push((at, coords)),
            Err(err) => {
                log_debug!("dropping position from {device_id}: {err}");
                skipped += 1;
            }
        }
    }

    points.sort_by_key(|(at, _)| *at);

    let distance: f64 = points
        .windows(2)
        .map(|pair| round2(haversine_meters(pair[0].1, pair[1].1)))
        .sum();

    DistanceSummary {
        device_id: device_id.to_string(),
        distance_meters: round2(distance),
        start_location: points.first().map(|(_, c)| *c),
        end_location: points.last().map(|(_, c)| *c),
        valid_points: points.len(),
        skipped_points: skipped,
    }
}

/// Distance for one device over one UTC calendar day.
pub fn daily_distance(device_id: &str, readings: &[Reading], target_date: NaiveDate) -> DistanceSummary {
    let (from, to) = day_window(target_date);
    distance_in_range(device_id, readings, from, to)
}

/// Splits a mixed batch per device; readings without a device id are counted
/// as invalid.
pub fn group_by_device<R: Borrow<Reading>>(readings: &[R]) -> (BTreeMap<String, Vec<Reading>>, BatchIssues) {
    let mut issues = BatchIssues::default();
    let mut grouped: BTreeMap<String, Vec<Reading>> = BTreeMap::new();
    for reading in readings {
        let reading: &Reading = Borrow::borrow(reading);
        match reading.device() {
            Ok(device_id) => {
                issues.record_ok();
                grouped.entry(device_id.to_string()).or_default().push(reading.clone());
            }
            Err(err) => issues.record(&err),
        }
    }
    (grouped, issues)
}

/// Fleet totals from per-device summaries. Devices without a single valid
/// position stay in the map but do not count towards the average.
pub fn combine(per_device: BTreeMap<String, DistanceSummary>) -> FleetDistanceSummary {
    let reporting: Vec<&DistanceSummary> = per_device.values().filter(|s| s.has_position()).collect();
    let total: f64 = reporting.iter().map(|s| s.distance_meters).sum();
    let average = if reporting.is_empty() {
        0.0
    } else {
        total / reporting.len() as f64
    };

    FleetDistanceSummary {
        reporting_devices: reporting.len(),
        total_distance: round2(total),
        average_distance: round2(average),
        per_device,
    }
}

pub fn fleet_distance(readings: &[Reading], target_date: NaiveDate) -> (FleetDistanceSummary, BatchIssues) {
    let (grouped, issues) = group_by_device(readings);
    let per_device = grouped
        .into_iter()
        .map(|(device_id, device_readings)| {
            let summary = daily_distance(&device_id, &device_readings, target_date);
            (device_id, summary)
        })
        .collect();
    (combine(per_device), issues)
}
