//! Status spans from equipment event codes (elevator controllers report a code
//! on every state change rather than sampling digital inputs).

use std::borrow::Borrow;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BatchIssues;
use crate::models::period::hours_between;
use crate::models::{EquipmentStatus, Reading, StatusHours, StatusSpan};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Event codes per status. Codes not listed map to [`EquipmentStatus::Idle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventCodeTable {
    pub working: Vec<String>,
    pub maintenance: Vec<String>,
    pub error: Vec<String>,
}

impl Default for EventCodeTable {
    fn default() -> Self {
        Self {
            working: vec!["100".into(), "101".into(), "102".into()],
            maintenance: vec!["200".into(), "201".into()],
            error: vec!["300".into(), "301".into(), "302".into(), "303".into()],
        }
    }
}

impl EventCodeTable {
    pub fn status_for(&self, code: &str) -> EquipmentStatus {
        fn listed(codes: &[String], code: &str) -> bool {
            codes.iter().any(|c| c == code)
        }
        if listed(&self.error, code) {
            EquipmentStatus::Error
        } else if listed(&self.maintenance, code) {
            EquipmentStatus::Maintenance
        } else if listed(&self.working, code) {
            EquipmentStatus::Working
        } else {
            EquipmentStatus::Idle
        }
    }
}

/// Each event's status lasts until the device's next event; the last one runs
/// until `evaluation_time`. Spans come out grouped by device, time-ordered.
pub fn status_spans<R: Borrow<Reading>>(
    readings: &[R],
    table: &EventCodeTable,
    evaluation_time: DateTime<Utc>,
) -> (Vec<StatusSpan>, BatchIssues) {
    let mut issues = BatchIssues::default();
    let mut by_device: BTreeMap<String, Vec<(DateTime<Utc>, String)>> = BTreeMap::new();

    for reading in readings {
        let reading: &Reading = Borrow::borrow(reading);
        let event = reading.device().and_then(|device_id| {
            let at = reading.observed_at()?;
            let code = reading.event_code()?;
            Ok((device_id.to_string(), at, code))
        });
        match event {
            Ok((device_id, at, code)) => {
                issues.record_ok();
                by_device.entry(device_id).or_default().push((at, code));
            }
            Err(err) => {
                log_warn!("skipping event reading: {err}");
                issues.record(&err);
            }
        }
    }

    let mut spans = Vec::new();
    for (device_id, mut events) in by_device {
        events.sort_by_key(|(at, _)| *at);
        for (i, (start, code)) in events.iter().enumerate() {
            let end = events
                .get(i + 1)
                .map(|(next, _)| *next)
                .unwrap_or(evaluation_time)
                .max(*start);
            spans.push(StatusSpan {
                device_id: device_id.clone(),
                status: table.status_for(code),
                code: code.clone(),
                start: *start,
                end,
                duration_hours: hours_between(*start, end),
            });
        }
    }
    (spans, issues)
}

pub fn status_hours(spans: &[StatusSpan]) -> StatusHours {
    spans.iter().fold(StatusHours::default(), |mut acc, span| {
        match span.status {
            EquipmentStatus::Working => acc.working_hours += span.duration_hours,
            EquipmentStatus::Maintenance => acc.maintenance_hours += span.duration_hours,
            EquipmentStatus::Error => acc.error_hours += span.duration_hours,
            EquipmentStatus::Idle => acc.idle_hours += span.duration_hours,
        }
        acc
    })
}

/// [`status_hours`] per device.
pub fn status_hours_by_device(spans: &[StatusSpan]) -> BTreeMap<String, StatusHours> {
    let mut grouped: BTreeMap<String, Vec<StatusSpan>> = BTreeMap::new();
    for span in spans {
        grouped.entry(span.device_id.clone()).or_default().push(span.clone());
    }
    grouped
        .into_iter()
        .map(|(device_id, spans)| (device_id, status_hours(&spans)))
        .collect()
}
