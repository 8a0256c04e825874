//! Host-side tick driver.
//!
//! Paces [`Scheduler::tick`] on a tokio interval, measures how long each tick
//! takes, and feeds the rolling average back into the next tick so admission
//! control can skip work when the host is running hot.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tickwork_core::DriverConfig;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::scheduler::{Scheduler, SchedulerError, TickReport};

/// Rolling average over the most recent tick durations, in milliseconds.
#[derive(Debug, Clone)]
pub struct RuntimeAverage {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl RuntimeAverage {
    /// `capacity` is clamped to at least one sample.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, millis: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(millis);
    }

    /// Mean of the retained samples; 0.0 before the first sample.
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Drives a [`Scheduler`] at a fixed cadence for a fixed number of ticks.
pub struct TickDriver {
    scheduler: Scheduler,
    runtime: RuntimeAverage,
    tick_interval: Duration,
    max_ticks: u64,
    ticks_driven: u64,
}

impl TickDriver {
    pub fn new(scheduler: Scheduler, config: &DriverConfig) -> Self {
        Self {
            scheduler,
            runtime: RuntimeAverage::new(config.runtime_window),
            tick_interval: Duration::from_millis(config.tick_interval_ms.max(1)),
            max_ticks: config.ticks,
            ticks_driven: 0,
        }
    }

    /// Run a single tick now, timing it into the rolling average.
    pub fn tick_once(&mut self) -> Result<TickReport, SchedulerError> {
        let average = self.runtime.average();
        let started = Instant::now();
        let result = self.scheduler.tick(average);
        self.runtime.push(started.elapsed().as_secs_f64() * 1000.0);
        self.ticks_driven += 1;
        result
    }

    /// Drive ticks until the configured count is reached or no tasks remain.
    /// Returns the number of ticks driven by this call.
    pub async fn run(&mut self) -> Result<u64, SchedulerError> {
        info!(
            "Driver starting: {} ticks every {:?}, {} tasks",
            self.max_ticks,
            self.tick_interval,
            self.scheduler.len()
        );

        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut driven = 0;
        while driven < self.max_ticks {
            interval.tick().await;
            let report = self.tick_once()?;
            driven += 1;
            debug!(
                tick = self.ticks_driven,
                outcome = ?report.outcome,
                steps = report.steps,
                removed = report.removed.len(),
                average_runtime_ms = report.average_runtime_ms,
                "Tick complete"
            );

            if self.scheduler.is_empty() {
                info!("No tasks left, stopping driver");
                break;
            }
        }

        info!("Driver stopped after {} ticks", driven);
        Ok(driven)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn into_scheduler(self) -> Scheduler {
        self.scheduler
    }

    pub fn average_runtime_ms(&self) -> f64 {
        self.runtime.average()
    }

    /// Total ticks driven over this driver's lifetime.
    pub fn ticks_driven(&self) -> u64 {
        self.ticks_driven
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{JobError, Resumable, StepList};

    fn config(ticks: u64) -> DriverConfig {
        DriverConfig {
            ticks,
            tick_interval_ms: 10,
            ..DriverConfig::local()
        }
    }

    #[test]
    fn runtime_average_window() {
        let mut avg = RuntimeAverage::new(3);
        assert!(avg.is_empty());
        assert_eq!(avg.average(), 0.0);

        avg.push(3.0);
        avg.push(6.0);
        assert_eq!(avg.average(), 4.5);

        avg.push(9.0);
        avg.push(12.0);
        // Oldest sample (3.0) dropped.
        assert_eq!(avg.len(), 3);
        assert_eq!(avg.average(), 9.0);
    }

    #[test]
    fn runtime_average_zero_capacity_keeps_one() {
        let mut avg = RuntimeAverage::new(0);
        avg.push(1.0);
        avg.push(5.0);
        assert_eq!(avg.len(), 1);
        assert_eq!(avg.average(), 5.0);
    }

    #[test]
    fn tick_once_records_runtime() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule("noop", StepList::new().step(|| Ok(())), 1, 1, false);
        let mut driver = TickDriver::new(scheduler, &config(1));

        driver.tick_once().unwrap();
        driver.tick_once().unwrap();
        assert_eq!(driver.ticks_driven(), 2);
        assert!(driver.average_runtime_ms() >= 0.0);
        assert_eq!(driver.scheduler().metrics().ticks, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn run_drives_configured_ticks() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(
            "forever",
            Resumable::infallible(|| std::iter::repeat(true).take(2)),
            1,
            1,
            false,
        );
        let mut driver = TickDriver::new(scheduler, &config(5));

        let driven = driver.run().await.unwrap();
        assert_eq!(driven, 5);
        assert_eq!(driver.scheduler().metrics().ticks, 5);
        assert_eq!(driver.scheduler().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_when_no_tasks_remain() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule("once", StepList::new().step(|| Ok(())), 0, 1, true);
        let mut driver = TickDriver::new(scheduler, &config(50));

        let driven = driver.run().await.unwrap();
        assert_eq!(driven, 1);
        assert!(driver.into_scheduler().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_propagates_step_failure() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(
            "broken",
            StepList::new().step(|| Err(JobError::Failed("bad sensor".into()))),
            0,
            1,
            false,
        );
        let mut driver = TickDriver::new(scheduler, &config(3));

        let err = driver.run().await.unwrap_err();
        assert!(err.to_string().contains("bad sensor"));
        assert_eq!(driver.ticks_driven(), 1);
    }
}
