//! Worker-per-device fan-out for fleet-wide computations.
//!
//! Reconstruction and distance are stateless per device, so each device runs
//! as its own blocking task. Results are merged by device id and match the
//! sequential functions exactly.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use tokio::task::JoinSet;

use crate::distance::{self, combine, group_by_device};
use crate::error::BatchIssues;
use crate::models::{DistanceSummary, FleetDistanceSummary, Reading, WorkingSummary};
use crate::working::{derive_activity_samples, reconstruct_device, summarize_device, ActivitySample};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

async fn fan_out<T, F>(
    groups: BTreeMap<String, Vec<T>>,
    work: F,
) -> Result<Vec<(String, <F as DeviceJob<T>>::Output)>>
where
    T: Send + 'static,
    F: DeviceJob<T> + Send + Sync + 'static,
{
    let work = Arc::new(work);
    let mut tasks = JoinSet::new();
    for (device_id, items) in groups {
        let work = Arc::clone(&work);
        tasks.spawn_blocking(move || {
            let output = work.run(&device_id, items);
            (device_id, output)
        });
    }

    let mut results = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(err) => {
                log_error!("device worker failed: {err}");
                return Err(err).context("device worker panicked or was cancelled");
            }
        }
    }
    results.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(results)
}

/// Per-device unit of work run on the blocking pool.
pub trait DeviceJob<T> {
    type Output: Send + 'static;

    fn run(&self, device_id: &str, items: Vec<T>) -> Self::Output;
}

struct WorkingJob {
    evaluation_time: DateTime<Utc>,
}

impl DeviceJob<ActivitySample> for WorkingJob {
    type Output = WorkingSummary;

    fn run(&self, device_id: &str, samples: Vec<ActivitySample>) -> WorkingSummary {
        let refs: Vec<&ActivitySample> = samples.iter().collect();
        summarize_device(device_id, reconstruct_device(device_id, &refs, self.evaluation_time))
    }
}

struct DistanceJob {
    target_date: NaiveDate,
}

impl DeviceJob<Reading> for DistanceJob {
    type Output = DistanceSummary;

    fn run(&self, device_id: &str, readings: Vec<Reading>) -> Self::Output {
        distance::daily_distance(device_id, &readings, self.target_date)
    }
}

/// Working summaries for every device in the batch, one task per device.
pub async fn working_hours_by_device<R, F>(
    readings: &[R],
    predicate: F,
    evaluation_time: DateTime<Utc>,
) -> Result<(BTreeMap<String, WorkingSummary>, BatchIssues)>
where
    R: Borrow<Reading>,
    F: Fn(&Reading) -> Option<bool>,
{
    let (samples, issues) = derive_activity_samples(readings, predicate);
    let mut groups: BTreeMap<String, Vec<ActivitySample>> = BTreeMap::new();
    for sample in samples {
        groups.entry(sample.device_id.clone()).or_default().push(sample);
    }

    log_info!("reconstructing working hours for {} devices", groups.len());
    let results = fan_out(groups, WorkingJob { evaluation_time }).await?;
    Ok((results.into_iter().collect(), issues))
}

/// Fleet distance for one day, one task per device.
pub async fn distance_by_device<R: Borrow<Reading>>(
    readings: &[R],
    target_date: NaiveDate,
) -> Result<(FleetDistanceSummary, BatchIssues)> {
    let (groups, issues) = group_by_device(readings);
    log_info!("computing distance for {} devices on {target_date}", groups.len());
    let results = fan_out(groups, DistanceJob { target_date }).await?;
    Ok((combine(results.into_iter().collect()), issues))
}
