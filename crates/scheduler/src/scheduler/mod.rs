//! Cooperative, priority-based tick scheduler.
//!
//! The host calls [`Scheduler::tick`] once per frame with its current average
//! tick duration. Each tick the scheduler counts down every task's interval
//! timer, then steps eligible tasks in weighted-priority order until the step
//! budget or the eligible set runs out. Jobs are [`StepSource`]s: they do a
//! bounded amount of work per step and keep their position between ticks.

pub mod error;
pub mod metrics;
pub mod runner;
pub mod step;
pub mod task;
pub mod types;

pub use error::SchedulerError;
pub use metrics::SchedulerMetrics;
pub use runner::Scheduler;
pub use step::{Infallible, JobError, Resumable, StepError, StepList, StepSequence, StepSource};
pub use task::{Task, TaskId, TaskSnapshot, TaskSpec, TaskState, AGING_TICKS, weighted_priority};
pub use types::{TickOutcome, TickReport};
