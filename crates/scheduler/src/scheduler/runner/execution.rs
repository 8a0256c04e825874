use tracing::{debug, info, warn};

use crate::scheduler::error::SchedulerError;
use crate::scheduler::types::{TickOutcome, TickReport};

use super::Scheduler;

impl Scheduler {
    /// Run one scheduling pass. Call once per host tick.
    ///
    /// `average_runtime_ms` is the host's current average tick duration. If it
    /// exceeds the runtime ceiling, or nothing is eligible, no task runs. The
    /// ceiling is only checked here: a single slow step can still overrun it.
    ///
    /// A failing step aborts the tick immediately and is returned as
    /// [`SchedulerError::Step`]; no further tasks run and the failing task is
    /// left in the collection. Removals made earlier in the tick still count
    /// and are carried on the error.
    pub fn tick(&mut self, average_runtime_ms: f64) -> Result<TickReport, SchedulerError> {
        let eligible = self.check_all();

        if eligible == 0 {
            let report = TickReport::new(TickOutcome::Idle, 0, average_runtime_ms);
            self.metrics.record_tick(&report);
            return Ok(report);
        }

        if average_runtime_ms > self.runtime_ceiling_ms {
            warn!(
                average_runtime_ms,
                runtime_ceiling_ms = self.runtime_ceiling_ms,
                eligible,
                "Average runtime over ceiling, skipping tick"
            );
            let report = TickReport::new(TickOutcome::OverBudget, eligible, average_runtime_ms);
            self.metrics.record_tick(&report);
            return Ok(report);
        }

        let mut report = TickReport::new(TickOutcome::Ran, eligible, average_runtime_ms);
        let mut in_line = eligible;
        let mut current = self.select_next();
        let mut stopped_early = false;

        for _ in 0..self.step_budget {
            let Some(index) = current else {
                stopped_early = true;
                break;
            };

            let task = &mut self.tasks[index];
            report.steps += 1;
            let has_more = match task.run() {
                Ok(has_more) => has_more,
                Err(source) => {
                    let (id, name) = (task.id(), task.name().to_string());
                    warn!(
                        task = %name,
                        error = %source,
                        steps = report.steps,
                        removed = report.removed.len(),
                        "Tick aborted by failing step"
                    );
                    self.metrics.record_failure(&report);
                    return Err(SchedulerError::Step {
                        id,
                        name,
                        removed: report.removed,
                        source,
                    });
                }
            };
            self.metrics.record_step(task.name());
            debug!(task = task.name(), has_more, "Ran step");

            if !has_more {
                let id = task.id();
                report.completed.push(id);
                if task.is_one_shot() {
                    let task = self.tasks.remove(index);
                    info!("Task finished and removed: {} {}", task.name(), id);
                    report.removed.push(id);
                }

                in_line = in_line.saturating_sub(1);
                if in_line == 0 {
                    stopped_early = true;
                    break;
                }
                current = self.select_next();
            } else if !task.is_eligible() {
                current = self.select_next();
            }
        }

        // Budget spent with a selected task still waiting.
        report.budget_exhausted = !stopped_early && current.is_some();
        debug!(
            steps = report.steps,
            completed = report.completed.len(),
            removed = report.removed.len(),
            budget_exhausted = report.budget_exhausted,
            "Tick finished"
        );
        self.metrics.record_tick(&report);
        Ok(report)
    }
}
