use std::borrow::Borrow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::alarms::classifier::ThresholdClassifier;
use crate::alarms::config::ThresholdConfig;
use crate::error::{BatchIssues, EngineError};
use crate::models::{AlarmEpisode, Reading, ThresholdBand};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EpisodeKey {
    pub device_id: String,
    pub sensor_id: String,
}

impl EpisodeKey {
    pub fn new(device_id: impl Into<String>, sensor_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            sensor_id: sensor_id.into(),
        }
    }
}

/// Hysteresis state for one key.
#[derive(Debug, Clone, PartialEq)]
pub enum EpisodeState {
    Clear,
    Open(AlarmEpisode),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum EpisodeEvent {
    /// First abnormal reading after NORMAL; the only event that notifies.
    Opened,
    LevelChanged {
        from: ThresholdBand,
        to: ThresholdBand,
    },
    Sustained,
    Closed {
        episode: AlarmEpisode,
    },
    /// NORMAL reading with nothing open.
    Quiet,
}

impl EpisodeState {
    /// Transition: the next state plus the event it emits. Deterministic apart
    /// from opening an episode, which mints a fresh v4 id.
    pub fn step(
        self,
        key: &EpisodeKey,
        band: ThresholdBand,
        value: f64,
        at: DateTime<Utc>,
    ) -> (EpisodeState, EpisodeEvent) {
        match (self, band.is_normal()) {
            (EpisodeState::Clear, true) => (EpisodeState::Clear, EpisodeEvent::Quiet),
            (EpisodeState::Open(episode), true) => {
                (EpisodeState::Clear, EpisodeEvent::Closed { episode })
            }
            (EpisodeState::Clear, false) => {
                let episode = AlarmEpisode {
                    id: Uuid::new_v4().to_string(),
                    device_id: key.device_id.clone(),
                    sensor_id: key.sensor_id.clone(),
                    opened_at: at,
                    level: band,
                    peak_level: band,
                    last_value: value,
                    last_seen_at: at,
                    sample_count: 1,
                    notified: true,
                };
                (EpisodeState::Open(episode), EpisodeEvent::Opened)
            }
            (EpisodeState::Open(mut episode), false) => {
                let previous = episode.level;
                episode.level = band;
                episode.last_value = value;
                episode.last_seen_at = at;
                episode.sample_count += 1;
                if band.severity() > episode.peak_level.severity() {
                    episode.peak_level = band;
                }
                let event = if previous == band {
                    EpisodeEvent::Sustained
                } else {
                    EpisodeEvent::LevelChanged {
                        from: previous,
                        to: band,
                    }
                };
                (EpisodeState::Open(episode), event)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub should_notify: bool,
    /// The open episode after this reading, `None` once back to NORMAL.
    pub episode: Option<AlarmEpisode>,
    pub band: ThresholdBand,
    pub event: EpisodeEvent,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmBatchReport {
    /// Episodes that opened during the batch, in observation order.
    pub notifications: Vec<AlarmEpisode>,
    pub closed: Vec<AlarmEpisode>,
    pub issues: BatchIssues,
}

struct KeyState {
    last_seen: DateTime<Utc>,
    state: EpisodeState,
}

/// Keyed store of open alarm episodes. Clones share the same state.
pub struct AlarmTracker {
    classifier: ThresholdClassifier,
    inner: Arc<Mutex<HashMap<EpisodeKey, KeyState>>>,
}

impl AlarmTracker {
    pub fn new(config: ThresholdConfig) -> Self {
        Self {
            classifier: ThresholdClassifier::new(config),
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EpisodeKey, KeyState>> {
        // A panic mid-update can only leave a fully written entry behind.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn classifier(&self) -> &ThresholdClassifier {
        &self.classifier
    }

    /// Feeds one reading for a key. Readings older than the last one seen
    /// for the key are rejected and leave the state untouched.
    pub fn observe(
        &self,
        device_id: &str,
        sensor_id: &str,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Observation, EngineError> {
        let band = self.classifier.classify(value)?;
        let key = EpisodeKey::new(device_id, sensor_id);

        let mut map = self.lock();
        if let Some(entry) = map.get(&key) {
            if timestamp < entry.last_seen {
                return Err(EngineError::OutOfOrderInput {
                    device_id: key.device_id,
                    sensor_id: key.sensor_id,
                    timestamp,
                    last_seen: entry.last_seen,
                });
            }
        }

        let previous = map
            .remove(&key)
            .map(|entry| entry.state)
            .unwrap_or(EpisodeState::Clear);
        let (next, event) = previous.step(&key, band, value, timestamp);

        let episode = match &next {
            EpisodeState::Open(episode) => Some(episode.clone()),
            EpisodeState::Clear => None,
        };
        map.insert(
            key.clone(),
            KeyState {
                last_seen: timestamp,
                state: next,
            },
        );
        drop(map);

        match &event {
            EpisodeEvent::Opened => log_info!(
                "alarm opened for {}/{}: {} at {}",
                key.device_id,
                key.sensor_id,
                band,
                value
            ),
            EpisodeEvent::Closed { episode } => log_info!(
                "alarm closed for {}/{} after {} samples (peak {})",
                key.device_id,
                key.sensor_id,
                episode.sample_count,
                episode.peak_level
            ),
            _ => {}
        }

        Ok(Observation {
            should_notify: matches!(event, EpisodeEvent::Opened),
            episode,
            band,
            event,
        })
    }

    pub fn observe_reading(&self, reading: &Reading) -> Result<Observation, EngineError> {
        let device_id = reading.device()?;
        let timestamp = reading.observed_at()?;
        let value = reading.numeric_value()?;
        self.observe(device_id, reading.sensor(), value, timestamp)
    }

    /// Observes a batch in timestamp order (stable for ties). Bad records are
    /// counted and skipped; the rest of the batch still applies.
    pub fn observe_batch<R: Borrow<Reading>>(&self, readings: &[R]) -> AlarmBatchReport {
        let mut report = AlarmBatchReport::default();
        let mut timed = Vec::with_capacity(readings.len());
        for reading in readings {
            let reading: &Reading = Borrow::borrow(reading);
            match reading.observed_at() {
                Ok(at) => timed.push((at, reading)),
                Err(err) => {
                    log_warn!("skipping alarm reading: {err}");
                    report.issues.record(&err);
                }
            }
        }
        timed.sort_by_key(|(at, _)| *at);

        for (_, reading) in timed {
            match self.observe_reading(reading) {
                Ok(observation) => {
                    report.issues.record_ok();
                    if observation.should_notify {
                        if let Some(episode) = observation.episode {
                            report.notifications.push(episode);
                        }
                    } else if let EpisodeEvent::Closed { episode } = observation.event {
                        report.closed.push(episode);
                    }
                }
                Err(err) => {
                    log_warn!("alarm update rejected: {err}");
                    report.issues.record(&err);
                }
            }
        }
        report
    }

    pub fn open_episode(&self, device_id: &str, sensor_id: &str) -> Option<AlarmEpisode> {
        let key = EpisodeKey::new(device_id, sensor_id);
        match self.lock().get(&key).map(|entry| &entry.state) {
            Some(EpisodeState::Open(episode)) => Some(episode.clone()),
            _ => None,
        }
    }

    /// All open episodes, ordered by (device, sensor).
    pub fn open_episodes(&self) -> Vec<AlarmEpisode> {
        let map = self.lock();
        let mut open: Vec<(&EpisodeKey, &AlarmEpisode)> = map
            .iter()
            .filter_map(|(key, entry)| match &entry.state {
                EpisodeState::Open(episode) => Some((key, episode)),
                EpisodeState::Clear => None,
            })
            .collect();
        open.sort_by(|a, b| a.0.cmp(b.0));
        open.into_iter().map(|(_, episode)| episode.clone()).collect()
    }

    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }

    /// Drops every key not observed within `max_idle` of `now`, open episodes
    /// included. Returns how many keys were dropped.
    pub fn evict_stale(&self, now: DateTime<Utc>, max_idle: Duration) -> usize {
        // A limit reaching past the representable range keeps everything.
        let Some(cutoff) = now.checked_sub_signed(max_idle) else {
            return 0;
        };
        let mut map = self.lock();
        let before = map.len();
        map.retain(|_, entry| entry.last_seen >= cutoff);
        let evicted = before - map.len();
        if evicted > 0 {
            log_info!("evicted {evicted} stale alarm keys (idle since before {cutoff})");
        }
        evicted
    }
}

impl Default for AlarmTracker {
    fn default() -> Self {
        Self::new(ThresholdConfig::default())
    }
}

impl Clone for AlarmTracker {
    fn clone(&self) -> Self {
        Self {
            classifier: self.classifier,
            inner: Arc::clone(&self.inner),
        }
    }
}
