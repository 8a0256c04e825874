use std::env;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

/// Parse an override value, keeping the current value when it doesn't parse.
fn parse_override<T: FromStr>(key: &str, raw: Option<String>, current: T) -> T {
    match raw {
        Some(v) => match v.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!(key, value = %v, "ignoring unparsable config override");
                current
            }
        },
        None => current,
    }
}

// ── Scheduler limits ──────────────────────────────────────────

/// Tick-level limits for the scheduler.
///
/// Both values follow the "0 or negative means unbounded" convention; use the
/// `resolved_*` accessors to get the effective limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulerLimits {
    /// Maximum number of steps executed per tick. <= 0 = unbounded.
    #[serde(default)]
    pub step_budget: i64,
    /// Average tick duration (ms) above which a tick does no work. <= 0 = unbounded.
    #[serde(default)]
    pub runtime_ceiling_ms: f64,
}

impl Default for SchedulerLimits {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl SchedulerLimits {
    pub fn new(step_budget: i64, runtime_ceiling_ms: f64) -> Self {
        Self {
            step_budget,
            runtime_ceiling_ms,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0, 0.0)
    }

    /// Effective step budget. Non-positive values map to `u32::MAX`.
    pub fn resolved_step_budget(&self) -> u32 {
        if self.step_budget > 0 {
            u32::try_from(self.step_budget).unwrap_or(u32::MAX)
        } else {
            u32::MAX
        }
    }

    /// Effective runtime ceiling in ms. Non-positive (or NaN) values map to `f64::MAX`.
    pub fn resolved_runtime_ceiling_ms(&self) -> f64 {
        if self.runtime_ceiling_ms > 0.0 {
            self.runtime_ceiling_ms
        } else {
            f64::MAX
        }
    }
}

// ── Driver config ─────────────────────────────────────────────

/// Configuration for a host process driving the scheduler.
///
/// Parsed from TOML, then overridden from the environment. Every key may be
/// profiled: with `TICKWORK_PROFILE=BENCH`, `BENCH_TICKWORK_STEP_BUDGET` wins
/// over `TICKWORK_STEP_BUDGET`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Active profile name (empty = default).
    #[serde(default)]
    pub profile: String,

    #[serde(default)]
    pub limits: SchedulerLimits,

    /// Wall-clock spacing between ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Number of ticks to drive before exiting.
    #[serde(default = "default_ticks")]
    pub ticks: u64,

    /// Number of recent ticks averaged into the runtime passed to `tick`.
    #[serde(default = "default_runtime_window")]
    pub runtime_window: usize,
}

fn default_tick_interval_ms() -> u64 {
    16
}

fn default_ticks() -> u64 {
    60
}

fn default_runtime_window() -> usize {
    10
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::local()
    }
}

impl DriverConfig {
    /// Defaults for running on a developer machine.
    pub fn local() -> Self {
        Self {
            profile: String::new(),
            limits: SchedulerLimits::unbounded(),
            tick_interval_ms: default_tick_interval_ms(),
            ticks: default_ticks(),
            runtime_window: default_runtime_window(),
        }
    }

    /// Parse a TOML document and validate it.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Apply `TICKWORK_*` environment overrides (call `load_dotenv()` first).
    /// Profile is read from `TICKWORK_PROFILE` unless the file already set one.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if self.profile.is_empty() {
            self.profile = env_opt("TICKWORK_PROFILE").unwrap_or_default().to_uppercase();
        }
        let profile = self.profile.clone();
        self.apply_overrides_from(|key| profiled_env_opt(&profile, key));
        self.validate()
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.limits.step_budget = parse_override(
            "TICKWORK_STEP_BUDGET",
            lookup("TICKWORK_STEP_BUDGET"),
            self.limits.step_budget,
        );
        self.limits.runtime_ceiling_ms = parse_override(
            "TICKWORK_RUNTIME_CEILING_MS",
            lookup("TICKWORK_RUNTIME_CEILING_MS"),
            self.limits.runtime_ceiling_ms,
        );
        self.tick_interval_ms = parse_override(
            "TICKWORK_TICK_INTERVAL_MS",
            lookup("TICKWORK_TICK_INTERVAL_MS"),
            self.tick_interval_ms,
        );
        self.ticks = parse_override("TICKWORK_TICKS", lookup("TICKWORK_TICKS"), self.ticks);
        self.runtime_window = parse_override(
            "TICKWORK_RUNTIME_WINDOW",
            lookup("TICKWORK_RUNTIME_WINDOW"),
            self.runtime_window,
        );
    }

    /// Reject values the driver loop can't work with. Scheduler limits are
    /// never rejected, only normalised.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "tick_interval_ms must be greater than 0".into(),
            ));
        }
        if self.runtime_window == 0 {
            return Err(ConfigError::Invalid(
                "runtime_window must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  limits:  step_budget={}, runtime_ceiling_ms={}",
            self.limits.resolved_step_budget(),
            self.limits.resolved_runtime_ceiling_ms()
        );
        tracing::info!(
            "  driver:  tick_interval_ms={}, ticks={}, runtime_window={}",
            self.tick_interval_ms,
            self.ticks,
            self.runtime_window
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn limits_unbounded_by_default() {
        let limits = SchedulerLimits::default();
        assert_eq!(limits.resolved_step_budget(), u32::MAX);
        assert_eq!(limits.resolved_runtime_ceiling_ms(), f64::MAX);
    }

    #[test]
    fn limits_non_positive_mean_unbounded() {
        let limits = SchedulerLimits::new(-5, -1.0);
        assert_eq!(limits.resolved_step_budget(), u32::MAX);
        assert_eq!(limits.resolved_runtime_ceiling_ms(), f64::MAX);

        let nan = SchedulerLimits::new(0, f64::NAN);
        assert_eq!(nan.resolved_runtime_ceiling_ms(), f64::MAX);
    }

    #[test]
    fn limits_positive_pass_through() {
        let limits = SchedulerLimits::new(7, 12.5);
        assert_eq!(limits.resolved_step_budget(), 7);
        assert_eq!(limits.resolved_runtime_ceiling_ms(), 12.5);
    }

    #[test]
    fn limits_budget_saturates() {
        let limits = SchedulerLimits::new(i64::MAX, 1.0);
        assert_eq!(limits.resolved_step_budget(), u32::MAX);
    }

    #[test]
    fn parse_full_toml() {
        let cfg = DriverConfig::from_toml(
            r#"
            tick_interval_ms = 50
            ticks = 5
            runtime_window = 3

            [limits]
            step_budget = 4
            runtime_ceiling_ms = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(cfg.tick_interval_ms, 50);
        assert_eq!(cfg.ticks, 5);
        assert_eq!(cfg.runtime_window, 3);
        assert_eq!(cfg.limits.step_budget, 4);
        assert_eq!(cfg.limits.runtime_ceiling_ms, 0.5);
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let cfg = DriverConfig::from_toml("").unwrap();
        assert_eq!(cfg, DriverConfig::local());
    }

    #[test]
    fn reject_zero_tick_interval() {
        let err = DriverConfig::from_toml("tick_interval_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn reject_malformed_toml() {
        let err = DriverConfig::from_toml("ticks = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ticks = 3\n[limits]\nstep_budget = 2").unwrap();

        let cfg = DriverConfig::from_file(file.path()).unwrap();
        assert_eq!(cfg.ticks, 3);
        assert_eq!(cfg.limits.resolved_step_budget(), 2);
    }

    #[test]
    fn from_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DriverConfig::from_file(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn overrides_replace_values() {
        let vars: HashMap<&str, &str> = [
            ("TICKWORK_STEP_BUDGET", "9"),
            ("TICKWORK_RUNTIME_CEILING_MS", "1.25"),
            ("TICKWORK_TICKS", "12"),
        ]
        .into_iter()
        .collect();

        let mut cfg = DriverConfig::local();
        cfg.apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.limits.step_budget, 9);
        assert_eq!(cfg.limits.runtime_ceiling_ms, 1.25);
        assert_eq!(cfg.ticks, 12);
        assert_eq!(cfg.tick_interval_ms, default_tick_interval_ms());
    }

    #[test]
    fn unparsable_override_is_ignored() {
        let mut cfg = DriverConfig::local();
        cfg.apply_overrides_from(|k| (k == "TICKWORK_TICKS").then(|| "lots".to_string()));
        assert_eq!(cfg.ticks, default_ticks());
    }

    #[test]
    fn profile_label_defaults() {
        let mut cfg = DriverConfig::local();
        assert_eq!(cfg.profile_label(), "default");
        cfg.profile = "BENCH".into();
        assert_eq!(cfg.profile_label(), "BENCH");
    }
}
