use std::borrow::Borrow;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::buckets::config::BucketConfig;
use crate::error::{BatchIssues, EngineError};
use crate::models::period::hours_between;
use crate::models::{Bucket, Interval, Reading, TimedValue};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hourly,
    Daily,
    Weekly,
    Auto,
}

impl Granularity {
    /// Picks a concrete width for the span; `Auto` never comes back.
    pub fn resolve(self, start: DateTime<Utc>, end: DateTime<Utc>, config: &BucketConfig) -> Granularity {
        match self {
            Granularity::Auto => {
                let span = end - start;
                let within = |limit: Option<Duration>| limit.map_or(true, |limit| span <= limit);
                if within(Duration::try_hours(config.hourly_max_span_hours)) {
                    Granularity::Hourly
                } else if within(Duration::try_days(config.daily_max_span_days)) {
                    Granularity::Daily
                } else {
                    Granularity::Weekly
                }
            }
            concrete => concrete,
        }
    }

    fn width(self) -> Duration {
        match self {
            Granularity::Hourly | Granularity::Auto => Duration::hours(1),
            Granularity::Daily => Duration::days(1),
            Granularity::Weekly => Duration::weeks(1),
        }
    }

    fn label(self, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        match self {
            Granularity::Hourly | Granularity::Auto => start.format("%Y-%m-%d %H:%M").to_string(),
            Granularity::Daily => start.format("%Y-%m-%d").to_string(),
            Granularity::Weekly => format!(
                "{}..{}",
                start.format("%Y-%m-%d"),
                (end - Duration::milliseconds(1)).format("%Y-%m-%d")
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Average,
    Max,
    Min,
    Count,
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    sum: f64,
    count: usize,
    max: Option<f64>,
    min: Option<f64>,
}

impl Accumulator {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
    }

    fn finish(&self, aggregation: Aggregation) -> Option<f64> {
        match aggregation {
            Aggregation::Sum => Some(self.sum),
            Aggregation::Count => Some(self.count as f64),
            Aggregation::Average if self.count > 0 => Some(self.sum / self.count as f64),
            Aggregation::Average => None,
            Aggregation::Max => self.max,
            Aggregation::Min => self.min,
        }
    }
}

/// Fixed-width, left-closed slots covering `[start, end]`. The last slot also
/// takes readings exactly at `end` and may be narrower than the others.
struct Layout {
    granularity: Granularity,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    width: Duration,
    count: usize,
}

impl Layout {
    fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Granularity,
        config: &BucketConfig,
    ) -> Result<Self, EngineError> {
        if end < start {
            return Err(EngineError::invalid(format!("bucket range ends ({end}) before it starts ({start})")));
        }
        let granularity = granularity.resolve(start, end, config);
        let width = granularity.width();
        let span_ms = (end - start).num_milliseconds();
        let width_ms = width.num_milliseconds();
        let count = ((span_ms + width_ms - 1) / width_ms).max(1) as usize;
        Ok(Self {
            granularity,
            start,
            end,
            width,
            count,
        })
    }

    fn index_of(&self, at: DateTime<Utc>) -> Option<usize> {
        if at < self.start || at > self.end {
            return None;
        }
        let offset = (at - self.start).num_milliseconds() / self.width.num_milliseconds();
        Some((offset as usize).min(self.count - 1))
    }

    fn bounds(&self, index: usize) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.start + self.width * index as i32;
        let end = (start + self.width).min(self.end);
        (start, end)
    }

    fn bucket(&self, index: usize, value: Option<f64>, count: usize) -> Bucket {
        let (start, end) = self.bounds(index);
        Bucket {
            label: self.granularity.label(start, start + self.width),
            start,
            end,
            value,
            count,
        }
    }
}

/// Resamples points into uniform buckets. Every bucket in range is emitted,
/// empty ones included, so the series has a constant step.
pub fn bucketize(
    points: &[TimedValue],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
    aggregation: Aggregation,
    config: &BucketConfig,
) -> Result<Vec<Bucket>, EngineError> {
    let layout = Layout::new(start, end, granularity, config)?;
    let mut slots = vec![Accumulator::default(); layout.count];

    for point in points {
        if let Some(index) = layout.index_of(point.timestamp) {
            slots[index].push(point.value);
        }
    }

    Ok(slots
        .iter()
        .enumerate()
        .map(|(index, acc)| layout.bucket(index, acc.finish(aggregation), acc.count))
        .collect())
}

/// Splits interval durations across buckets by overlap; each bucket's value is
/// the hours covered inside it and `count` the intervals touching it.
pub fn bucketize_intervals<I: Interval>(
    intervals: &[I],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
    config: &BucketConfig,
) -> Result<Vec<Bucket>, EngineError> {
    let layout = Layout::new(start, end, granularity, config)?;
    let mut hours = vec![0.0_f64; layout.count];
    let mut counts = vec![0_usize; layout.count];

    for item in intervals {
        let (from, to) = item.interval();
        let from = from.max(start);
        let to = to.min(end);
        if to <= from {
            continue;
        }
        let (Some(first), Some(last)) = (layout.index_of(from), layout.index_of(to)) else {
            continue;
        };
        for index in first..=last {
            let (slot_start, slot_end) = layout.bounds(index);
            let overlap = hours_between(from.max(slot_start), to.min(slot_end));
            if overlap > 0.0 {
                hours[index] += overlap;
                counts[index] += 1;
            }
        }
    }

    Ok((0..layout.count)
        .map(|index| layout.bucket(index, Some(hours[index]), counts[index]))
        .collect())
}

/// Numeric points from raw readings; unusable readings are counted and skipped.
pub fn values_from_readings<R: Borrow<Reading>>(readings: &[R]) -> (Vec<TimedValue>, BatchIssues) {
    let mut issues = BatchIssues::default();
    let mut points = Vec::with_capacity(readings.len());
    for reading in readings {
        let reading: &Reading = Borrow::borrow(reading);
        let point = reading.observed_at().and_then(|timestamp| {
            Ok(TimedValue {
                timestamp,
                value: reading.numeric_value()?,
            })
        });
        match point {
            Ok(point) => {
                issues.record_ok();
                points.push(point);
            }
            Err(err) => {
                log_warn!("skipping series reading: {err}");
                issues.record(&err);
            }
        }
    }
    points.sort_by_key(|p| p.timestamp);
    (points, issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkingPeriod;
    use chrono::TimeZone;

    fn origin() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap()
    }

    fn point(minutes: i64, value: f64) -> TimedValue {
        TimedValue {
            timestamp: origin() + Duration::minutes(minutes),
            value,
        }
    }

    #[test]
    fn auto_picks_width_from_span() {
        let config = BucketConfig::default();
        let s = origin();
        assert_eq!(Granularity::Auto.resolve(s, s + Duration::hours(48), &config), Granularity::Hourly);
        assert_eq!(Granularity::Auto.resolve(s, s + Duration::hours(49), &config), Granularity::Daily);
        assert_eq!(Granularity::Auto.resolve(s, s + Duration::days(60), &config), Granularity::Daily);
        assert_eq!(Granularity::Auto.resolve(s, s + Duration::days(61), &config), Granularity::Weekly);
        assert_eq!(Granularity::Daily.resolve(s, s + Duration::hours(1), &config), Granularity::Daily);
    }

    #[test]
    fn out_of_range_cut_off_counts_as_unbounded() {
        let config = BucketConfig {
            hourly_max_span_hours: i64::MAX,
            ..BucketConfig::default()
        };
        let s = origin();
        assert_eq!(Granularity::Auto.resolve(s, s + Duration::days(400), &config), Granularity::Hourly);
    }

    #[test]
    fn one_day_auto_gives_24_hourly_buckets_without_losing_points() {
        let points: Vec<TimedValue> = (0..=144).map(|i| point(i * 10, 1.0)).collect();
        let buckets = bucketize(
            &points,
            origin(),
            origin() + Duration::hours(24),
            Granularity::Auto,
            Aggregation::Count,
            &BucketConfig::default(),
        )
        .unwrap();

        assert_eq!(buckets.len(), 24);
        let total: usize = buckets.iter().map(|b| b.count).sum();
        assert_eq!(total, points.len());
        assert_eq!(buckets[0].count, 6);
        assert_eq!(buckets[23].count, 7);
        assert_eq!(buckets[0].label, "2024-10-01 00:00");
        assert_eq!(buckets[23].end, origin() + Duration::hours(24));
    }

    #[test]
    fn empty_buckets_are_filled() {
        let points = vec![point(5, 10.0), point(15, 20.0), point(130, 7.0)];
        let config = BucketConfig::default();
        let end = origin() + Duration::hours(3);

        let avg = bucketize(&points, origin(), end, Granularity::Hourly, Aggregation::Average, &config).unwrap();
        assert_eq!(avg.len(), 3);
        assert_eq!(avg[0].value, Some(15.0));
        assert_eq!(avg[1].value, None);
        assert_eq!(avg[1].count, 0);
        assert_eq!(avg[2].value, Some(7.0));

        let sum = bucketize(&points, origin(), end, Granularity::Hourly, Aggregation::Sum, &config).unwrap();
        assert_eq!(sum[0].value, Some(30.0));
        assert_eq!(sum[1].value, Some(0.0));

        let max = bucketize(&points, origin(), end, Granularity::Hourly, Aggregation::Max, &config).unwrap();
        assert_eq!(max[0].value, Some(20.0));
        let min = bucketize(&points, origin(), end, Granularity::Hourly, Aggregation::Min, &config).unwrap();
        assert_eq!(min[0].value, Some(10.0));
    }

    #[test]
    fn out_of_range_points_are_not_counted() {
        let points = vec![point(-1, 1.0), point(0, 1.0), point(60 * 24 + 1, 1.0)];
        let buckets = bucketize(
            &points,
            origin(),
            origin() + Duration::days(1),
            Granularity::Hourly,
            Aggregation::Count,
            &BucketConfig::default(),
        )
        .unwrap();
        assert_eq!(buckets.iter().map(|b| b.count).sum::<usize>(), 1);
    }

    #[test]
    fn partial_last_bucket_and_weekly_labels() {
        let end = origin() + Duration::days(10);
        let buckets = bucketize(&[], origin(), end, Granularity::Weekly, Aggregation::Sum, &BucketConfig::default()).unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].label, "2024-10-01..2024-10-07");
        assert_eq!(buckets[1].end, end);
    }

    #[test]
    fn zero_span_is_one_bucket_and_inverted_span_is_invalid() {
        let config = BucketConfig::default();
        let one = bucketize(&[point(0, 3.0)], origin(), origin(), Granularity::Auto, Aggregation::Sum, &config).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].value, Some(3.0));

        let err = bucketize(&[], origin(), origin() - Duration::hours(1), Granularity::Auto, Aggregation::Sum, &config);
        assert!(matches!(err, Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn interval_hours_are_split_across_days() {
        let periods = vec![
            WorkingPeriod::closed("crane", origin() + Duration::hours(20), origin() + Duration::hours(26)),
            WorkingPeriod::closed("crane", origin() + Duration::hours(30), origin() + Duration::hours(31)),
            WorkingPeriod::ongoing("crane", origin() + Duration::hours(70), origin() + Duration::hours(80)),
        ];
        let buckets = bucketize_intervals(
            &periods,
            origin(),
            origin() + Duration::days(3),
            Granularity::Daily,
            &BucketConfig::default(),
        )
        .unwrap();
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].value, Some(4.0));
        assert_eq!(buckets[1].value, Some(3.0));
        assert_eq!(buckets[1].count, 2);
        assert_eq!(buckets[2].value, Some(2.0));
    }

    #[test]
    fn readings_become_sorted_points() {
        let readings = vec![
            Reading::new("p", origin() + Duration::minutes(30)).with_value(4.0),
            Reading::new("p", origin()).with_value(2.0),
            Reading::new("p", origin()),
        ];
        let (points, issues) = values_from_readings(&readings);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].value, 2.0);
        assert_eq!(issues.skipped_invalid, 1);
    }
}
