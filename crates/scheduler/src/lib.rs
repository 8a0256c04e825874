pub mod driver;
pub mod scheduler;

pub use driver::{RuntimeAverage, TickDriver};
pub use scheduler::{
    JobError, Resumable, Scheduler, SchedulerError, SchedulerMetrics, StepError, StepList,
    StepSource, TaskId, TaskSnapshot, TaskSpec, TaskState, TickOutcome, TickReport,
};
pub use tickwork_core::{DriverConfig, SchedulerLimits};
