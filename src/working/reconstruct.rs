use std::borrow::Borrow;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BatchIssues, EngineError};
use crate::models::{Reading, WorkingPeriod, WorkingSummary};
use crate::working::state::{MachineState, Transition};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Whether a device counted as working at one instant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySample {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub active: bool,
}

/// Turns raw readings into activity samples with a caller-supplied rule.
/// Readings without a device, a timestamp or the inputs the rule needs are
/// skipped and counted.
pub fn derive_activity_samples<R, F>(readings: &[R], predicate: F) -> (Vec<ActivitySample>, BatchIssues)
where
    R: Borrow<Reading>,
    F: Fn(&Reading) -> Option<bool>,
{
    let mut issues = BatchIssues::default();
    let mut samples = Vec::with_capacity(readings.len());

    for reading in readings {
        let reading: &Reading = Borrow::borrow(reading);
        let sample = reading.device().and_then(|device_id| {
            let timestamp = reading.observed_at()?;
            let active = predicate(reading).ok_or_else(|| {
                EngineError::invalid(format!("digital inputs missing for '{device_id}' at {timestamp}"))
            })?;
            Ok(ActivitySample {
                device_id: device_id.to_string(),
                timestamp,
                active,
            })
        });

        match sample {
            Ok(sample) => {
                issues.record_ok();
                samples.push(sample);
            }
            Err(err) => {
                log_warn!("skipping activity reading: {err}");
                issues.record(&err);
            }
        }
    }

    (samples, issues)
}

/// Rebuilds working periods for one device. Samples are sorted by time (stable,
/// so ties keep input order); the input slice is left untouched.
pub fn reconstruct_device(
    device_id: &str,
    samples: &[&ActivitySample],
    evaluation_time: DateTime<Utc>,
) -> Vec<WorkingPeriod> {
    let mut ordered: Vec<&ActivitySample> = samples.to_vec();
    ordered.sort_by_key(|sample| sample.timestamp);

    let mut periods = Vec::new();
    let mut state = MachineState::Idle;
    for sample in ordered {
        let (next, transition) = state.step(device_id, sample.active, sample.timestamp);
        if let Transition::Stopped { period } = transition {
            periods.push(period);
        }
        state = next;
    }

    if let Some(ongoing) = state.finish(device_id, evaluation_time) {
        log_debug!("{device_id} still working at {evaluation_time}, since {}", ongoing.start);
        periods.push(ongoing);
    }
    periods
}

fn group_samples(samples: &[ActivitySample]) -> BTreeMap<&str, Vec<&ActivitySample>> {
    let mut by_device: BTreeMap<&str, Vec<&ActivitySample>> = BTreeMap::new();
    for sample in samples {
        by_device.entry(sample.device_id.as_str()).or_default().push(sample);
    }
    by_device
}

/// Working periods for every device in `samples`, grouped by device id
/// (ascending) and ordered by start within a device.
pub fn reconstruct(samples: &[ActivitySample], evaluation_time: DateTime<Utc>) -> Vec<WorkingPeriod> {
    group_samples(samples)
        .into_iter()
        .flat_map(|(device_id, device_samples)| {
            reconstruct_device(device_id, &device_samples, evaluation_time)
        })
        .collect()
}

/// Totals for one device. An empty slice gives a zero summary.
pub fn summarize_device(device_id: &str, periods: Vec<WorkingPeriod>) -> WorkingSummary {
    let closed_hours: f64 = periods.iter().filter(|p| !p.ongoing).map(|p| p.duration_hours).sum();
    let ongoing_hours: f64 = periods.iter().filter(|p| p.ongoing).map(|p| p.duration_hours).sum();
    WorkingSummary {
        device_id: device_id.to_string(),
        has_ongoing: periods.iter().any(|p| p.ongoing),
        periods,
        closed_hours,
        ongoing_hours,
        total_hours: closed_hours + ongoing_hours,
    }
}

pub fn summarize(periods: Vec<WorkingPeriod>) -> BTreeMap<String, WorkingSummary> {
    let mut grouped: BTreeMap<String, Vec<WorkingPeriod>> = BTreeMap::new();
    for period in periods {
        grouped.entry(period.device_id.clone()).or_default().push(period);
    }
    grouped
        .into_iter()
        .map(|(device_id, periods)| {
            let summary = summarize_device(&device_id, periods);
            (device_id, summary)
        })
        .collect()
}

/// One summary per device present in `samples`, including devices that never
/// became active (zero hours).
pub fn summarize_by_device(
    samples: &[ActivitySample],
    evaluation_time: DateTime<Utc>,
) -> BTreeMap<String, WorkingSummary> {
    group_samples(samples)
        .into_iter()
        .map(|(device_id, device_samples)| {
            let periods = reconstruct_device(device_id, &device_samples, evaluation_time);
            (device_id.to_string(), summarize_device(device_id, periods))
        })
        .collect()
}

/// Readings in, per-device working summaries out.
pub fn working_hours<R, F>(
    readings: &[R],
    predicate: F,
    evaluation_time: DateTime<Utc>,
) -> (BTreeMap<String, WorkingSummary>, BatchIssues)
where
    R: Borrow<Reading>,
    F: Fn(&Reading) -> Option<bool>,
{
    let (samples, issues) = derive_activity_samples(readings, predicate);
    (summarize_by_device(&samples, evaluation_time), issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::working::config::ActivityPredicate;
    use chrono::{Duration, TimeZone};

    fn t(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, hour, minute, 0).unwrap()
    }

    fn sample(device: &str, at: DateTime<Utc>, active: bool) -> ActivitySample {
        ActivitySample {
            device_id: device.into(),
            timestamp: at,
            active,
        }
    }

    #[test]
    fn closed_then_ongoing() {
        let samples = vec![
            sample("D", t(8, 0), true),
            sample("D", t(9, 30), false),
            sample("D", t(11, 0), true),
        ];
        let periods = reconstruct(&samples, t(12, 0));
        assert_eq!(periods.len(), 2);

        assert_eq!(periods[0].start, t(8, 0));
        assert_eq!(periods[0].end, t(9, 30));
        assert_eq!(periods[0].duration_hours, 1.5);
        assert!(!periods[0].ongoing);

        assert_eq!(periods[1].start, t(11, 0));
        assert_eq!(periods[1].end, t(12, 0));
        assert!(periods[1].ongoing);
        assert_eq!(periods[1].duration_hours, 1.0);
    }

    #[test]
    fn ongoing_duration_follows_evaluation_time() {
        let samples = vec![sample("D", t(8, 0), true)];
        let early = reconstruct(&samples, t(9, 0));
        let late = reconstruct(&samples, t(10, 30));
        assert_eq!(early[0].duration_hours, 1.0);
        assert_eq!(late[0].duration_hours, 2.5);
    }

    #[test]
    fn evaluation_time_before_start_gives_empty_ongoing_period() {
        let samples = vec![sample("D", t(8, 0), true)];
        let periods = reconstruct(&samples, t(7, 0));
        assert_eq!(periods.len(), 1);
        assert!(periods[0].ongoing);
        assert_eq!(periods[0].end, t(8, 0));
        assert_eq!(periods[0].duration_hours, 0.0);
    }

    #[test]
    fn out_of_order_input_matches_sorted_input() {
        let sorted = vec![
            sample("D", t(8, 0), true),
            sample("D", t(9, 0), false),
            sample("D", t(10, 0), true),
            sample("D", t(10, 45), false),
        ];
        let mut shuffled = sorted.clone();
        shuffled.reverse();
        shuffled.swap(0, 2);
        assert_eq!(reconstruct(&sorted, t(12, 0)), reconstruct(&shuffled, t(12, 0)));
    }

    #[test]
    fn repeated_samples_do_not_split_periods() {
        let samples = vec![
            sample("D", t(8, 0), false),
            sample("D", t(8, 10), true),
            sample("D", t(8, 20), true),
            sample("D", t(8, 30), true),
            sample("D", t(8, 40), false),
            sample("D", t(8, 50), false),
        ];
        let periods = reconstruct(&samples, t(12, 0));
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].start, t(8, 10));
        assert_eq!(periods[0].end, t(8, 40));
    }

    #[test]
    fn ties_keep_input_order() {
        // Same instant: active then inactive opens and immediately closes.
        let samples = vec![sample("D", t(8, 0), true), sample("D", t(8, 0), false)];
        let periods = reconstruct(&samples, t(9, 0));
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].duration_hours, 0.0);
        assert!(!periods[0].ongoing);
    }

    #[test]
    fn devices_are_reconstructed_independently() {
        let samples = vec![
            sample("B", t(8, 0), true),
            sample("A", t(8, 0), true),
            sample("B", t(9, 0), false),
            sample("A", t(10, 0), false),
        ];
        let summaries = summarize(reconstruct(&samples, t(12, 0)));
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries["A"].total_hours, 2.0);
        assert_eq!(summaries["B"].total_hours, 1.0);
        assert!(!summaries["A"].has_ongoing);
    }

    #[test]
    fn empty_input_is_zero_not_error() {
        assert!(reconstruct(&[], t(12, 0)).is_empty());
        let summary = summarize_device("idle-crane", Vec::new());
        assert_eq!(summary.total_hours, 0.0);
        assert!(summary.periods.is_empty());
    }

    #[test]
    fn idle_devices_still_get_a_summary() {
        let samples = vec![sample("idle", t(8, 0), false), sample("busy", t(8, 0), true)];
        let summaries = summarize_by_device(&samples, t(9, 0));
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries["idle"].total_hours, 0.0);
        assert_eq!(summaries["busy"].total_hours, 1.0);
    }

    #[test]
    fn total_combines_closed_and_ongoing() {
        let samples = vec![
            sample("D", t(6, 0), true),
            sample("D", t(7, 0), false),
            sample("D", t(9, 0), true),
        ];
        let summaries = summarize(reconstruct(&samples, t(9, 30)));
        let summary = &summaries["D"];
        assert_eq!(summary.closed_hours, 1.0);
        assert_eq!(summary.ongoing_hours, 0.5);
        assert_eq!(summary.total_hours, 1.5);
        assert!(summary.has_ongoing);
    }

    #[test]
    fn readings_with_digital_inputs() {
        let rule = ActivityPredicate::default();
        let readings = vec![
            Reading::new("crane-2", t(7, 0)).with_input("input1", true).with_input("input2", false),
            Reading::new("crane-2", t(7, 45)).with_input("input1", false).with_input("input2", false),
            Reading::new("crane-2", t(8, 0)).with_input("input1", true),
            Reading::new("", t(8, 5)).with_input("input1", true).with_input("input2", false),
        ];
        let (summaries, issues) = working_hours(&readings, |r| rule.evaluate(r), t(9, 0));
        assert_eq!(issues.processed, 2);
        assert_eq!(issues.skipped_invalid, 2);
        assert_eq!(summaries["crane-2"].total_hours, 0.75);
        assert_eq!(summaries["crane-2"].periods[0].end - summaries["crane-2"].periods[0].start, Duration::minutes(45));
    }
}
