pub mod config;
pub mod error;

pub use config::{DriverConfig, SchedulerLimits};
pub use error::*;
