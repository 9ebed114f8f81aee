pub mod classifier;
pub mod config;
pub mod tracker;

pub use classifier::ThresholdClassifier;
pub use config::ThresholdConfig;
pub use tracker::{AlarmBatchReport, AlarmTracker, EpisodeEvent, EpisodeKey, EpisodeState, Observation};
