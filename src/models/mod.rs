pub mod alarm;
pub mod bucket;
pub mod distance;
pub mod period;
pub mod reading;

pub use alarm::{AlarmEpisode, ThresholdBand};
pub use bucket::{Bucket, TimedValue};
pub use distance::{DistanceSummary, FleetDistanceSummary};
pub use period::{
    EquipmentStatus, Interval, StatusHours, StatusSpan, WorkingPeriod, WorkingSummary,
};
pub use reading::{RawScalar, RawTimestamp, Reading};
