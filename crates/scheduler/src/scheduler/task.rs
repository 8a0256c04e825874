use std::fmt;

use serde::Serialize;

use super::step::{StepError, StepSource};

/// Wait ticks after which a waiting task's weighted priority has halved.
pub const AGING_TICKS: f64 = 300.0;

/// Largest interval or priority a task accepts; larger values are clamped.
pub const MAX_TASK_VALUE: i64 = i32::MAX as i64;

/// Stable handle for a scheduled task. Never reused within one scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a task within the tick loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskState {
    /// Counting down, or waiting for the next eligibility check.
    Armed,
    /// Timer reached zero; a candidate for selection this tick.
    Eligible,
    /// A step is executing, or the last step failed.
    Running,
    /// One-shot task whose steps are exhausted. Terminal.
    Done,
}

/// Scheduling parameters for a new task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: String,
    /// Ticks between runs. 0 = run once, then discard.
    pub interval: i64,
    /// Base priority; higher wins.
    pub priority: i64,
    /// Allow more than one step of this task per tick.
    pub multi_run: bool,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interval: 0,
            priority: 0,
            multi_run: false,
        }
    }

    pub fn interval(mut self, interval: i64) -> Self {
        self.interval = interval;
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn multi_run(mut self, multi_run: bool) -> Self {
        self.multi_run = multi_run;
        self
    }
}

fn clamp_non_negative(value: i64) -> u32 {
    // Bounded by MAX_TASK_VALUE, so the cast is lossless.
    value.clamp(0, MAX_TASK_VALUE) as u32
}

/// Point-in-time view of a task, for host-side display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub name: String,
    pub interval: u32,
    pub priority: u32,
    pub multi_run: bool,
    pub timer: u32,
    pub eligible: bool,
    pub wait_ticks: u32,
    pub weighted_priority: f64,
    pub state: TaskState,
}

/// A scheduled job: one step source plus its timer and aging state.
pub struct Task {
    id: TaskId,
    name: String,
    source: Box<dyn StepSource>,
    interval: u32,
    priority: u32,
    multi_run: bool,
    timer: u32,
    eligible: bool,
    wait_ticks: u32,
    weighted_priority: f64,
    state: TaskState,
}

impl Task {
    /// Build a task. Interval and priority are clamped to `[0, MAX_TASK_VALUE]`;
    /// one-shot tasks start eligible, periodic ones start armed with a full timer.
    pub fn new(id: TaskId, spec: TaskSpec, source: Box<dyn StepSource>) -> Self {
        let interval = clamp_non_negative(spec.interval);
        let priority = clamp_non_negative(spec.priority);
        let eligible = interval == 0;
        Self {
            id,
            name: spec.name,
            source,
            interval,
            priority,
            multi_run: spec.multi_run,
            timer: interval,
            eligible,
            wait_ticks: 0,
            weighted_priority: f64::from(priority),
            state: if eligible { TaskState::Eligible } else { TaskState::Armed },
        }
    }

    /// Update the timer and eligibility. Called once per task per tick with
    /// `advance_timer = true`.
    ///
    /// While eligible, each timed check counts one wait tick and recomputes
    /// `weighted = priority / (wait_ticks / AGING_TICKS + 1)`. Note the
    /// direction: the longer a task waits, the *lower* its weighted priority.
    pub fn check(&mut self, advance_timer: bool) -> bool {
        if advance_timer && self.timer > 0 {
            self.timer -= 1;
        }

        if self.timer == 0 {
            if advance_timer {
                self.wait_ticks = self.wait_ticks.saturating_add(1);
                self.weighted_priority = weighted_priority(self.priority, self.wait_ticks);
            }
            self.eligible = true;
            if self.state != TaskState::Done {
                self.state = TaskState::Eligible;
            }
            return true;
        }

        self.eligible = false;
        if self.state != TaskState::Done {
            self.state = TaskState::Armed;
        }
        false
    }

    /// Execute one step. Returns whether the source has more steps.
    ///
    /// Resets the aging state and timer before stepping. When the source is
    /// exhausted a one-shot task becomes [`TaskState::Done`]; a periodic task
    /// restarts its source and waits for its timer. A failing step leaves the
    /// task in [`TaskState::Running`] and is returned as-is.
    pub fn run(&mut self) -> Result<bool, StepError> {
        self.eligible = self.multi_run;
        self.wait_ticks = 0;
        self.timer = self.interval;
        self.weighted_priority = f64::from(self.priority);
        self.state = TaskState::Running;

        if !self.source.advance()? {
            if self.interval == 0 {
                self.state = TaskState::Done;
            } else {
                self.source.restart()?;
                self.state = TaskState::Armed;
            }
            self.eligible = false;
            return Ok(false);
        }

        self.state = if self.eligible {
            TaskState::Eligible
        } else {
            TaskState::Armed
        };
        Ok(true)
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn multi_run(&self) -> bool {
        self.multi_run
    }

    pub fn timer(&self) -> u32 {
        self.timer
    }

    pub fn is_eligible(&self) -> bool {
        self.eligible
    }

    pub fn wait_ticks(&self) -> u32 {
        self.wait_ticks
    }

    pub fn weighted_priority(&self) -> f64 {
        self.weighted_priority
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn is_one_shot(&self) -> bool {
        self.interval == 0
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id,
            name: self.name.clone(),
            interval: self.interval,
            priority: self.priority,
            multi_run: self.multi_run,
            timer: self.timer,
            eligible: self.eligible,
            wait_ticks: self.wait_ticks,
            weighted_priority: self.weighted_priority,
            state: self.state,
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("priority", &self.priority)
            .field("timer", &self.timer)
            .field("eligible", &self.eligible)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// The aging formula used by [`Task::check`].
pub fn weighted_priority(priority: u32, wait_ticks: u32) -> f64 {
    f64::from(priority) / (f64::from(wait_ticks) / AGING_TICKS + 1.0)
}
