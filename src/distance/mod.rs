pub mod aggregator;

pub use aggregator::{
    combine, daily_distance, day_window, distance_in_range, fleet_distance, group_by_device,
};
