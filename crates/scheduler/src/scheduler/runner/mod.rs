//! Tick scheduler -- owns the task collection and runs one bounded tick at a time.
//!
//! Split into focused submodules:
//! - `core`: Scheduler struct, constructor, registration, configuration, and accessors
//! - `scheduling`: eligibility pass and weighted-priority selection
//! - `execution`: the budgeted tick loop

mod core;
mod execution;
mod scheduling;

pub use self::core::Scheduler;
