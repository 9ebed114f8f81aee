//! Per-record error taxonomy for the analytics engine.
//!
//! Nothing here is fatal: every variant describes a single record that was
//! skipped or rejected. Batch operations collect them into [`BatchIssues`]
//! and keep going. An empty batch is not an error and has no variant.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Non-numeric value, malformed timestamp, out-of-range coordinate or a
    /// missing field the requested computation needs.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(
        "out-of-order reading for {device_id}/{sensor_id}: {timestamp} is older than last seen {last_seen}"
    )]
    OutOfOrderInput {
        device_id: String,
        sensor_id: String,
        timestamp: DateTime<Utc>,
        last_seen: DateTime<Utc>,
    },
}

impl EngineError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        EngineError::InvalidInput(reason.into())
    }
}

/// Counts and warnings for records a batch operation could not use.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchIssues {
    pub processed: usize,
    pub skipped_invalid: usize,
    pub rejected_out_of_order: usize,
    pub warnings: Vec<String>,
}

impl BatchIssues {
    pub fn record_ok(&mut self) {
        self.processed += 1;
    }

    pub fn record(&mut self, err: &EngineError) {
        match err {
            EngineError::InvalidInput(_) => self.skipped_invalid += 1,
            EngineError::OutOfOrderInput { .. } => self.rejected_out_of_order += 1,
        }
        self.warnings.push(err.to_string());
    }

    pub fn merge(&mut self, other: BatchIssues) {
        self.processed += other.processed;
        self.skipped_invalid += other.skipped_invalid;
        self.rejected_out_of_order += other.rejected_out_of_order;
        self.warnings.extend(other.warnings);
    }

    pub fn is_clean(&self) -> bool {
        self.skipped_invalid == 0 && self.rejected_out_of_order == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn record_routes_each_variant_to_its_counter() {
        let mut issues = BatchIssues::default();
        issues.record_ok();
        issues.record(&EngineError::invalid("latitude out of range"));
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        issues.record(&EngineError::OutOfOrderInput {
            device_id: "crane-7".into(),
            sensor_id: "temp".into(),
            timestamp: t,
            last_seen: t + chrono::Duration::minutes(1),
        });

        assert_eq!(issues.processed, 1);
        assert_eq!(issues.skipped_invalid, 1);
        assert_eq!(issues.rejected_out_of_order, 1);
        assert_eq!(issues.warnings.len(), 2);
        assert!(issues.warnings[1].contains("crane-7/temp"));
        assert!(!issues.is_clean());
    }

    #[test]
    fn merge_sums_counts() {
        let mut a = BatchIssues::default();
        a.record_ok();
        let mut b = BatchIssues::default();
        b.record_ok();
        b.record(&EngineError::invalid("bad"));
        a.merge(b);
        assert_eq!(a.processed, 2);
        assert_eq!(a.skipped_invalid, 1);
        assert_eq!(a.warnings, vec!["invalid input: bad".to_string()]);
    }
}
