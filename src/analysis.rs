//! One pass of every engine component over a mixed reading batch.
//!
//! Readings are routed by the payload they carry: numeric values feed alarms
//! and the value series, digital inputs feed working hours, event codes feed
//! status hours and positions feed distance.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::alarms::{AlarmBatchReport, AlarmTracker};
use crate::buckets::{bucketize, bucketize_intervals, downsample, values_from_readings, Aggregation, Granularity};
use crate::distance::day_window;
use crate::error::BatchIssues;
use crate::fleet;
use crate::models::{
    AlarmEpisode, Bucket, FleetDistanceSummary, Reading, StatusHours, TimedValue, WorkingPeriod,
    WorkingSummary,
};
use crate::settings::EngineSettings;
use crate::working::{status_hours_by_device, status_spans};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisWindow {
    pub target_date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// "Now" for ongoing periods and open status spans.
    pub evaluation_time: DateTime<Utc>,
}

impl AnalysisWindow {
    pub fn for_day(target_date: NaiveDate, evaluation_time: DateTime<Utc>) -> Self {
        let (start, end) = day_window(target_date);
        Self {
            target_date,
            start,
            end,
            evaluation_time,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub target_date: NaiveDate,
    pub evaluation_time: DateTime<Utc>,
    pub alarms: AlarmBatchReport,
    pub open_episodes: Vec<AlarmEpisode>,
    pub working: BTreeMap<String, WorkingSummary>,
    pub working_buckets: Vec<Bucket>,
    pub status_hours: BTreeMap<String, StatusHours>,
    pub distance: FleetDistanceSummary,
    pub value_buckets: Vec<Bucket>,
    pub value_series: Vec<TimedValue>,
    pub issues: BTreeMap<String, BatchIssues>,
}

/// Borrowed views of a batch, split by payload in one pass. A reading with
/// several payloads lands in each matching view.
#[derive(Debug, Default)]
struct RoutedBatch<'a> {
    scalar: Vec<&'a Reading>,
    activity: Vec<&'a Reading>,
    events: Vec<&'a Reading>,
    positions: Vec<&'a Reading>,
}

impl<'a> RoutedBatch<'a> {
    fn route(readings: &'a [Reading]) -> Self {
        let mut routed = Self::default();
        for reading in readings {
            if reading.value.is_some() {
                routed.scalar.push(reading);
            }
            if reading.digital_inputs.is_some() {
                routed.activity.push(reading);
            }
            if reading.event_code.is_some() {
                routed.events.push(reading);
            }
            if reading.latitude.is_some() || reading.longitude.is_some() {
                routed.positions.push(reading);
            }
        }
        routed
    }
}

pub async fn analyze(
    readings: &[Reading],
    settings: &EngineSettings,
    tracker: &AlarmTracker,
    window: AnalysisWindow,
) -> Result<AnalysisReport> {
    let mut issues = BTreeMap::new();

    let RoutedBatch {
        scalar,
        activity,
        events,
        positions,
    } = RoutedBatch::route(readings);

    // Evict before observing so keys refreshed by this batch survive even when
    // the batch is older than the idle limit relative to the evaluation time.
    let max_idle = Duration::try_hours(settings.stale_episode_hours).unwrap_or(Duration::MAX);
    tracker.evict_stale(window.evaluation_time, max_idle);
    let alarms = tracker.observe_batch(&scalar);
    issues.insert("alarms".to_string(), alarms.issues.clone());

    let predicate = &settings.activity;
    let (working, working_issues) =
        fleet::working_hours_by_device(&activity, |r| predicate.evaluate(r), window.evaluation_time).await?;
    issues.insert("working".to_string(), working_issues);

    let periods: Vec<WorkingPeriod> = working.values().flat_map(|s| s.periods.iter().cloned()).collect();
    let working_buckets =
        bucketize_intervals(&periods, window.start, window.end, Granularity::Auto, &settings.buckets)?;

    let (spans, status_issues) = status_spans(&events, &settings.event_codes, window.evaluation_time);
    issues.insert("status".to_string(), status_issues);

    let (distance, distance_issues) = fleet::distance_by_device(&positions, window.target_date).await?;
    issues.insert("distance".to_string(), distance_issues);

    let (points, series_issues) = values_from_readings(&scalar);
    issues.insert("series".to_string(), series_issues);
    let value_buckets = bucketize(
        &points,
        window.start,
        window.end,
        Granularity::Auto,
        Aggregation::Average,
        &settings.buckets,
    )?;
    let in_window: Vec<TimedValue> = points
        .into_iter()
        .filter(|p| p.timestamp >= window.start && p.timestamp <= window.end)
        .collect();

    Ok(AnalysisReport {
        target_date: window.target_date,
        evaluation_time: window.evaluation_time,
        open_episodes: tracker.open_episodes(),
        alarms,
        working,
        working_buckets,
        status_hours: status_hours_by_device(&spans),
        distance,
        value_buckets,
        value_series: downsample(&in_window, settings.buckets.max_points),
        issues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use chrono::TimeZone;

    fn t(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, hour, minute, 0).unwrap()
    }

    fn batch() -> Vec<Reading> {
        let mut readings = Vec::new();
        for (i, value) in [30.0, 40.0, 45.0, 30.0, 52.0].into_iter().enumerate() {
            readings.push(Reading::new("freezer", t(6 + i as u32, 0)).with_sensor("probe").with_value(value));
        }
        readings.push(Reading::new("crane", t(7, 0)).with_input("input1", true).with_input("input2", false));
        readings.push(Reading::new("crane", t(9, 0)).with_input("input1", false).with_input("input2", false));
        readings.push(Reading::new("lift", t(8, 0)).with_event_code("100"));
        readings.push(Reading::new("lift", t(10, 0)).with_event_code("300"));
        readings.push(Reading::new("truck", t(8, 0)).with_coordinates(28.6139, 77.2090));
        readings.push(Reading::new("truck", t(9, 0)).with_coordinates(28.7041, 77.1025));
        readings.push(Reading::new("truck", t(9, 30)).with_coordinates(0.0, 0.0));
        readings
    }

    #[tokio::test]
    async fn full_pass_over_mixed_batch() {
        let settings = EngineSettings::default();
        let tracker = AlarmTracker::new(settings.thresholds);
        let date = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let window = AnalysisWindow::for_day(date, t(12, 0));

        let report = analyze(&batch(), &settings, &tracker, window).await.unwrap();

        assert_eq!(report.alarms.notifications.len(), 2);
        assert_eq!(report.alarms.closed.len(), 1);
        assert_eq!(report.open_episodes.len(), 1);
        assert_eq!(report.working["crane"].total_hours, 2.0);
        assert_eq!(report.status_hours["lift"].working_hours, 2.0);
        assert_eq!(report.status_hours["lift"].error_hours, 2.0);
        assert_eq!(report.distance.total_distance, 14442.26);
        assert_eq!(report.distance.per_device["truck"].skipped_points, 1);

        assert_eq!(report.value_buckets.len(), 24);
        assert_eq!(report.value_buckets[7].value, Some(40.0));
        assert_eq!(report.value_buckets[0].value, None);
        assert_eq!(report.working_buckets[7].value, Some(1.0));
        assert_eq!(report.working_buckets.iter().filter_map(|b| b.value).sum::<f64>(), 2.0);
        assert_eq!(report.value_series.len(), 5);

        assert!(report.issues.values().all(|i| i.skipped_invalid == 0));

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["distance"]["perDevice"]["truck"]["startLocation"].is_object());
        assert_eq!(json["alarms"]["notifications"][0]["level"], "HIGH");
    }

    #[tokio::test]
    async fn past_day_keeps_episodes_opened_by_the_batch() {
        let settings = EngineSettings::default();
        let tracker = AlarmTracker::new(settings.thresholds);
        let date = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let three_days_later = t(6, 0) + Duration::days(3);
        let readings = vec![Reading::new("freezer", t(6, 0)).with_sensor("probe").with_value(40.0)];

        let report = analyze(&readings, &settings, &tracker, AnalysisWindow::for_day(date, three_days_later))
            .await
            .unwrap();

        assert_eq!(report.alarms.notifications.len(), 1);
        assert_eq!(report.open_episodes.len(), 1);
        assert_eq!(tracker.tracked_keys(), 1);

        let older = tracker.observe("freezer", "probe", 20.0, t(5, 0));
        assert!(matches!(older, Err(EngineError::OutOfOrderInput { .. })));
        assert!(tracker.open_episode("freezer", "probe").is_some());
    }

    #[tokio::test]
    async fn keys_idle_before_the_next_batch_are_evicted() {
        let settings = EngineSettings::default();
        let tracker = AlarmTracker::new(settings.thresholds);
        let date = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let first = vec![Reading::new("freezer", t(6, 0)).with_sensor("probe").with_value(40.0)];
        analyze(&first, &settings, &tracker, AnalysisWindow::for_day(date, t(7, 0)))
            .await
            .unwrap();

        let later = AnalysisWindow::for_day(date, t(6, 0) + Duration::days(2));
        let report = analyze(&[], &settings, &tracker, later).await.unwrap();
        assert!(report.open_episodes.is_empty());
        assert_eq!(tracker.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn oversized_idle_limit_does_not_panic() {
        let settings = EngineSettings {
            stale_episode_hours: i64::MAX,
            ..EngineSettings::default()
        };
        let tracker = AlarmTracker::new(settings.thresholds);
        let date = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let report = analyze(&batch(), &settings, &tracker, AnalysisWindow::for_day(date, t(12, 0)))
            .await
            .unwrap();
        assert_eq!(report.open_episodes.len(), 1);
    }

    #[tokio::test]
    async fn reading_with_several_payloads_feeds_each_view() {
        let settings = EngineSettings::default();
        let tracker = AlarmTracker::new(settings.thresholds);
        let date = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let readings = vec![Reading::new("rig", t(8, 0))
            .with_value(12.0)
            .with_event_code("100")
            .with_coordinates(28.6139, 77.2090)];

        let report = analyze(&readings, &settings, &tracker, AnalysisWindow::for_day(date, t(9, 0)))
            .await
            .unwrap();
        assert_eq!(report.issues["alarms"].processed, 1);
        assert_eq!(report.issues["status"].processed, 1);
        assert_eq!(report.issues["distance"].processed, 1);
        assert_eq!(report.issues["working"].processed, 0);
        assert_eq!(report.status_hours["rig"].working_hours, 1.0);
    }

    #[tokio::test]
    async fn empty_batch_is_all_zeroes() {
        let settings = EngineSettings::default();
        let tracker = AlarmTracker::default();
        let date = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let report = analyze(&[], &settings, &tracker, AnalysisWindow::for_day(date, t(12, 0)))
            .await
            .unwrap();
        assert!(report.alarms.notifications.is_empty());
        assert!(report.working.is_empty());
        assert_eq!(report.distance.total_distance, 0.0);
        assert!(report.value_buckets.iter().all(|b| b.count == 0));
    }
}
