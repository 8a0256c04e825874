use super::step::StepError;
use super::task::TaskId;

/// Error returned by [`Scheduler::tick`](super::Scheduler::tick).
///
/// A failing step aborts the rest of the tick; the failing task stays in the
/// collection. One-shot tasks that finished earlier in the same tick are
/// already gone and listed in `removed`.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("task '{name}' ({id}) failed: {source}")]
    Step {
        id: TaskId,
        name: String,
        removed: Vec<TaskId>,
        #[source]
        source: StepError,
    },
}

impl SchedulerError {
    /// Id of the task that caused the error.
    pub fn task_id(&self) -> TaskId {
        match self {
            Self::Step { id, .. } => *id,
        }
    }

    /// One-shot tasks removed during the aborted tick, in order.
    pub fn removed(&self) -> &[TaskId] {
        match self {
            Self::Step { removed, .. } => removed,
        }
    }
}
