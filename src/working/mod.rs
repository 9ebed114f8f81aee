pub mod config;
pub mod reconstruct;
pub mod state;
pub mod status;

pub use config::ActivityPredicate;
pub use reconstruct::{
    derive_activity_samples, reconstruct, reconstruct_device, summarize, summarize_by_device, summarize_device,
    working_hours, ActivitySample,
};
pub use state::{MachineState, Transition};
pub use status::{status_hours, status_hours_by_device, status_spans, EventCodeTable};
