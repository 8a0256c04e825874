use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::types::{TickOutcome, TickReport};

/// Cumulative scheduler counters exposed to the host.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerMetrics {
    /// Total `tick` calls, including failed ones.
    pub ticks: u64,
    /// Ticks with nothing eligible.
    pub idle_ticks: u64,
    /// Ticks skipped by admission control.
    pub over_budget_ticks: u64,
    /// Ticks aborted by a failing step.
    pub failed_ticks: u64,
    /// Total `run()` calls across all tasks.
    pub total_steps: u64,
    /// Steps executed by task name.
    pub steps_by_task: HashMap<String, u64>,
    /// One-shot tasks removed after exhausting their steps.
    pub tasks_removed: u64,
    /// Eligible count from the most recent tick.
    pub last_eligible: usize,
    /// When the most recent tick finished.
    pub last_tick: Option<DateTime<Utc>>,
}

impl SchedulerMetrics {
    /// Record one executed step.
    pub fn record_step(&mut self, task_name: &str) {
        self.total_steps += 1;
        *self.steps_by_task.entry(task_name.to_string()).or_default() += 1;
    }

    /// Record a finished tick.
    pub fn record_tick(&mut self, report: &TickReport) {
        self.ticks += 1;
        match report.outcome {
            TickOutcome::Idle => self.idle_ticks += 1,
            TickOutcome::OverBudget => self.over_budget_ticks += 1,
            TickOutcome::Ran => {}
        }
        self.tasks_removed += report.removed.len() as u64;
        self.last_eligible = report.eligible;
        self.last_tick = Some(Utc::now());
    }

    /// Record a tick aborted by a failing step, keeping what the partial
    /// report already did.
    pub fn record_failure(&mut self, report: &TickReport) {
        self.ticks += 1;
        self.failed_ticks += 1;
        self.tasks_removed += report.removed.len() as u64;
        self.last_eligible = report.eligible;
        self.last_tick = Some(Utc::now());
    }

    /// Fraction of ticks that executed work (0.0 - 1.0).
    pub fn utilization(&self) -> f64 {
        if self.ticks == 0 {
            return 0.0;
        }
        let busy = self.ticks - self.idle_ticks - self.over_budget_ticks;
        busy as f64 / self.ticks as f64
    }
}
