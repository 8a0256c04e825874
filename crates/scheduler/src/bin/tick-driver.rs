//! tick-driver: runs the tick scheduler against a set of demo jobs.
//!
//! Stands in for a real host: paces ticks, reports the measured average tick
//! duration back to the scheduler, and prints final metrics as JSON.
//!
//! Demo jobs:
//! - `boot`: one-shot step list, runs before anything else
//! - `sweep`: periodic, multi-run sweep over a fixed number of segments
//! - `inventory`: periodic enum-state machine (scan slots, tally, report)
//! - `heartbeat`: every tick, lowest priority

use std::cell::RefCell;
use std::rc::Rc;

use clap::Parser;
use tracing::{debug, info, warn};

use tickwork_core::config::load_dotenv;
use tickwork_core::DriverConfig;
use tickwork_scheduler::{
    Resumable, Scheduler, StepError, StepList, StepSource, TaskSpec, TickDriver,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Cooperative tick scheduler demo host.
#[derive(Parser, Debug)]
#[command(name = "tick-driver", version, about)]
struct Cli {
    /// Path to tickwork.toml config file.
    #[arg(long, env = "TICKWORK_CONFIG", default_value = "config/tickwork.toml")]
    config: String,

    /// Number of ticks to drive (overrides config).
    #[arg(long)]
    ticks: Option<u64>,

    /// Milliseconds between ticks (overrides config).
    #[arg(long)]
    tick_interval_ms: Option<u64>,

    /// Steps per tick, 0 = unbounded (overrides config).
    #[arg(long, allow_negative_numbers = true)]
    step_budget: Option<i64>,

    /// Skip ticks whose average duration exceeds this many ms, 0 = disabled (overrides config).
    #[arg(long, allow_negative_numbers = true)]
    runtime_ceiling_ms: Option<f64>,

    /// Segments covered by the sweep job per cycle.
    #[arg(long, default_value_t = 6)]
    sweep_segments: usize,

    /// Print the final task table alongside the metrics.
    #[arg(long)]
    show_tasks: bool,
}

// ── Inventory job ───────────────────────────────────────────────────

/// Where the inventory job is within one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InventoryStage {
    Scan { slot: usize },
    Tally,
    Report,
    Finished,
}

/// Inventory pass written as an explicit state machine: one slot per step,
/// then a tally step and a report step.
struct InventoryJob {
    slots: Vec<u32>,
    stage: InventoryStage,
    total: u64,
    reports: Rc<RefCell<Vec<u64>>>,
}

impl InventoryJob {
    fn new(slots: Vec<u32>, reports: Rc<RefCell<Vec<u64>>>) -> Self {
        Self {
            slots,
            stage: InventoryStage::Scan { slot: 0 },
            total: 0,
            reports,
        }
    }
}

impl StepSource for InventoryJob {
    fn advance(&mut self) -> Result<bool, StepError> {
        self.stage = match self.stage {
            InventoryStage::Scan { slot } if slot < self.slots.len() => {
                debug!(slot, amount = self.slots[slot], "inventory: scanned slot");
                InventoryStage::Scan { slot: slot + 1 }
            }
            InventoryStage::Scan { .. } => {
                self.total = self.slots.iter().map(|&n| u64::from(n)).sum();
                InventoryStage::Tally
            }
            InventoryStage::Tally => {
                info!(total = self.total, "inventory: pass complete");
                self.reports.borrow_mut().push(self.total);
                InventoryStage::Report
            }
            InventoryStage::Report | InventoryStage::Finished => {
                self.stage = InventoryStage::Finished;
                return Ok(false);
            }
        };
        Ok(true)
    }

    fn restart(&mut self) -> Result<(), StepError> {
        if self.stage != InventoryStage::Finished {
            return Err(StepError::RestartInProgress);
        }
        self.stage = InventoryStage::Scan { slot: 0 };
        self.total = 0;
        Ok(())
    }

    fn is_exhausted(&self) -> bool {
        self.stage == InventoryStage::Finished
    }
}

// ── Job registration ────────────────────────────────────────────────

/// Register the demo jobs. Returns the inventory job's report log.
fn register_demo_jobs(
    scheduler: &mut Scheduler,
    sweep_segments: usize,
) -> Rc<RefCell<Vec<u64>>> {
    let boot = StepList::new()
        .step(|| {
            info!("boot: loading world state");
            Ok(())
        })
        .step(|| {
            info!("boot: warming caches");
            Ok(())
        })
        .step(|| {
            info!("boot: ready");
            Ok(())
        });
    scheduler.schedule_spec(TaskSpec::new("boot").priority(100).multi_run(true), boot);

    let sweep = Resumable::infallible(move || {
        (0..sweep_segments).map(|segment| {
            debug!(segment, "sweep: segment");
            true
        })
    });
    scheduler.schedule_spec(
        TaskSpec::new("sweep").interval(5).priority(20).multi_run(true),
        sweep,
    );

    let reports = Rc::new(RefCell::new(Vec::new()));
    let inventory = InventoryJob::new(vec![12, 0, 7, 31, 4], Rc::clone(&reports));
    scheduler.schedule_spec(TaskSpec::new("inventory").interval(3).priority(10), inventory);

    let heartbeat = Resumable::infallible(|| std::iter::once(true));
    scheduler.schedule_spec(TaskSpec::new("heartbeat").interval(1).priority(1), heartbeat);

    reports
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    // Load config (fall back to local defaults if file not found)
    let mut config = match DriverConfig::from_file(&cli.config) {
        Ok(cfg) => {
            info!(path = %cli.config, "loaded driver config");
            cfg
        }
        Err(e) => {
            warn!(
                error = %e,
                path = %cli.config,
                "failed to load config, using local defaults"
            );
            DriverConfig::local()
        }
    };
    config.apply_env_overrides()?;

    if let Some(ticks) = cli.ticks {
        config.ticks = ticks;
    }
    if let Some(interval) = cli.tick_interval_ms {
        config.tick_interval_ms = interval;
    }
    if let Some(budget) = cli.step_budget {
        config.limits.step_budget = budget;
    }
    if let Some(ceiling) = cli.runtime_ceiling_ms {
        config.limits.runtime_ceiling_ms = ceiling;
    }
    config.validate()?;
    config.log_summary();

    let mut scheduler = Scheduler::new(config.limits);
    let reports = register_demo_jobs(&mut scheduler, cli.sweep_segments);

    let mut driver = TickDriver::new(scheduler, &config);
    driver.run().await?;

    info!(
        inventory_passes = reports.borrow().len(),
        average_runtime_ms = driver.average_runtime_ms(),
        "tick-driver finished"
    );

    let scheduler = driver.into_scheduler();
    let mut output = serde_json::json!({ "metrics": scheduler.metrics() });
    if cli.show_tasks {
        output["tasks"] = serde_json::to_value(scheduler.tasks())?;
    }
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
