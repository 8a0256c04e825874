use tickwork_core::SchedulerLimits;
use tracing::info;

use crate::scheduler::metrics::SchedulerMetrics;
use crate::scheduler::step::StepSource;
use crate::scheduler::task::{Task, TaskId, TaskSnapshot, TaskSpec};

/// Cooperative, single-threaded scheduler. Call [`Scheduler::tick`] once per
/// host tick; tasks are stepped in weighted-priority order until the step
/// budget or the eligible set runs out.
///
/// Insertion order is significant: among equally weighted tasks the one added
/// first wins.
pub struct Scheduler {
    pub(super) tasks: Vec<Task>,
    pub(super) limits: SchedulerLimits,
    pub(super) step_budget: u32,
    pub(super) runtime_ceiling_ms: f64,
    pub(super) next_id: u64,
    pub(super) metrics: SchedulerMetrics,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerLimits::unbounded())
    }
}

impl Scheduler {
    /// Create a scheduler with the given tick limits.
    pub fn new(limits: SchedulerLimits) -> Self {
        Self {
            tasks: Vec::new(),
            limits,
            step_budget: limits.resolved_step_budget(),
            runtime_ceiling_ms: limits.resolved_runtime_ceiling_ms(),
            next_id: 1,
            metrics: SchedulerMetrics::default(),
        }
    }

    /// Update the tick limits. 0 or negative means unbounded for either value.
    pub fn configure(&mut self, step_budget: i64, runtime_ceiling_ms: f64) {
        self.set_limits(SchedulerLimits::new(step_budget, runtime_ceiling_ms));
    }

    pub fn set_limits(&mut self, limits: SchedulerLimits) {
        self.limits = limits;
        self.step_budget = limits.resolved_step_budget();
        self.runtime_ceiling_ms = limits.resolved_runtime_ceiling_ms();
        info!(
            step_budget = self.step_budget,
            runtime_ceiling_ms = self.runtime_ceiling_ms,
            "Scheduler limits updated"
        );
    }

    /// Register a task. Interval and priority are clamped to non-negative.
    /// Takes effect from the next tick's eligibility pass.
    pub fn schedule(
        &mut self,
        name: impl Into<String>,
        source: impl StepSource + 'static,
        interval: i64,
        priority: i64,
        multi_run: bool,
    ) -> TaskId {
        let spec = TaskSpec::new(name)
            .interval(interval)
            .priority(priority)
            .multi_run(multi_run);
        self.schedule_spec(spec, source)
    }

    /// Register a task from a [`TaskSpec`].
    pub fn schedule_spec(&mut self, spec: TaskSpec, source: impl StepSource + 'static) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;

        let task = Task::new(id, spec, Box::new(source));
        info!(
            "Scheduled task: {} {} (interval: {}, priority: {}, multi_run: {})",
            task.name(),
            id,
            task.interval(),
            task.priority(),
            task.multi_run()
        );
        self.tasks.push(task);
        id
    }

    /// Remove a task between ticks, dropping its step source.
    pub fn remove(&mut self, id: TaskId) -> bool {
        match self.position(id) {
            Some(index) => {
                let task = self.tasks.remove(index);
                info!("Removed task: {} {}", task.name(), id);
                true
            }
            None => false,
        }
    }

    pub(super) fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.id() == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.position(id).is_some()
    }

    /// Snapshot of one task.
    pub fn task(&self, id: TaskId) -> Option<TaskSnapshot> {
        self.tasks.iter().find(|t| t.id() == id).map(Task::snapshot)
    }

    /// Snapshots of all tasks in insertion order.
    pub fn tasks(&self) -> Vec<TaskSnapshot> {
        self.tasks.iter().map(Task::snapshot).collect()
    }

    pub fn limits(&self) -> SchedulerLimits {
        self.limits
    }

    /// Effective step budget per tick.
    pub fn step_budget(&self) -> u32 {
        self.step_budget
    }

    /// Effective runtime ceiling in ms.
    pub fn runtime_ceiling_ms(&self) -> f64 {
        self.runtime_ceiling_ms
    }

    pub fn metrics(&self) -> &SchedulerMetrics {
        &self.metrics
    }
}
