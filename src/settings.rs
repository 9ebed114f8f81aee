use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
};

use crate::alarms::ThresholdConfig;
use crate::buckets::{BucketConfig, MAX_HORIZON_HOURS};
use crate::working::{ActivityPredicate, EventCodeTable};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    pub thresholds: ThresholdConfig,
    pub buckets: BucketConfig,
    pub activity: ActivityPredicate,
    pub event_codes: EventCodeTable,
    /// Alarm keys idle longer than this are evicted.
    pub stale_episode_hours: i64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            thresholds: ThresholdConfig::default(),
            buckets: BucketConfig::default(),
            activity: ActivityPredicate::default(),
            event_codes: EventCodeTable::default(),
            stale_episode_hours: 24,
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate().context("invalid thresholds")?;
        self.buckets.validate().context("invalid bucket settings")?;
        if self.stale_episode_hours <= 0 || self.stale_episode_hours > MAX_HORIZON_HOURS {
            anyhow::bail!("staleEpisodeHours must be between 1 and {MAX_HORIZON_HOURS}");
        }
        Ok(())
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<EngineSettings>,
}

impl SettingsStore {
    /// Loads settings from `path`. A missing file gives defaults; an
    /// unreadable one gives defaults with a warning; a readable file with
    /// invalid values is an error.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str::<EngineSettings>(&contents) {
                Ok(settings) => settings,
                Err(err) => {
                    warn!("Ignoring unparseable settings at {}: {err}", path.display());
                    EngineSettings::default()
                }
            }
        } else {
            EngineSettings::default()
        };
        data.validate()
            .with_context(|| format!("Rejected settings from {}", path.display()))?;

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn snapshot(&self) -> EngineSettings {
        self.data.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn update_thresholds(&self, thresholds: ThresholdConfig) -> Result<()> {
        thresholds.validate()?;
        self.update(|settings| settings.thresholds = thresholds)
    }

    pub fn update_buckets(&self, buckets: BucketConfig) -> Result<()> {
        buckets.validate()?;
        self.update(|settings| settings.buckets = buckets)
    }

    fn update(&self, apply: impl FnOnce(&mut EngineSettings)) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        apply(&mut next);
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }

    fn persist(&self, data: &EngineSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: EngineSettings = serde_json::from_str(&contents)?;
        data.validate()?;
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = data;
        Ok(())
    }
}
