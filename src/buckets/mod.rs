pub mod bucketize;
pub mod config;
pub mod downsample;

pub use bucketize::{bucketize, bucketize_intervals, values_from_readings, Aggregation, Granularity};
pub use config::{BucketConfig, MAX_HORIZON_HOURS};
pub use downsample::downsample;
