use tracing::debug;

use super::Scheduler;

impl Scheduler {
    /// Advance every task's timer and count the eligible ones.
    pub(crate) fn check_all(&mut self) -> usize {
        let mut eligible = 0;
        for task in &mut self.tasks {
            if task.check(true) {
                eligible += 1;
            }
        }
        eligible
    }

    /// Index of the eligible task with the greatest weighted priority.
    ///
    /// Scans in insertion order and replaces the candidate only on a strictly
    /// greater weight, so the earliest-added task wins ties. Returns `None`
    /// when nothing is eligible.
    pub(crate) fn select_next(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (index, task) in self.tasks.iter().enumerate() {
            if !task.is_eligible() {
                continue;
            }
            let better = match best {
                Some(b) => task.weighted_priority() > self.tasks[b].weighted_priority(),
                None => true,
            };
            if better {
                best = Some(index);
            }
        }
        if let Some(index) = best {
            let task = &self.tasks[index];
            debug!(
                task = task.name(),
                weighted_priority = task.weighted_priority(),
                "Selected task"
            );
        }
        best
    }
}
