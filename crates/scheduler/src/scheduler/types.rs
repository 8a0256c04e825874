use serde::Serialize;

use super::task::TaskId;

/// How a tick ended before or during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TickOutcome {
    /// No task was eligible.
    Idle,
    /// Average tick duration exceeded the runtime ceiling; nothing ran.
    OverBudget,
    /// At least one step was executed.
    Ran,
}

/// Summary of a single [`Scheduler::tick`](super::Scheduler::tick) call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub outcome: TickOutcome,
    /// Average tick duration supplied by the host.
    pub average_runtime_ms: f64,
    /// Tasks found eligible by the check pass.
    pub eligible: usize,
    /// Number of `run()` calls made this tick.
    pub steps: u32,
    /// Tasks whose step source was exhausted this tick, in order.
    pub completed: Vec<TaskId>,
    /// One-shot tasks removed from the collection this tick.
    pub removed: Vec<TaskId>,
    /// The step budget ran out while work was still eligible.
    pub budget_exhausted: bool,
}

impl TickReport {
    pub(crate) fn new(outcome: TickOutcome, eligible: usize, average_runtime_ms: f64) -> Self {
        Self {
            outcome,
            average_runtime_ms,
            eligible,
            steps: 0,
            completed: Vec::new(),
            removed: Vec::new(),
            budget_exhausted: false,
        }
    }

    pub fn ran(&self) -> bool {
        self.outcome == TickOutcome::Ran
    }
}
