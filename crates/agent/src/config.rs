//! Orchestrator configuration.
//!
//! Built once from defaults plus `BOT_*` environment overrides and never
//! mutated afterwards.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use erpbot_probes::{CoverageConfig, Credentials, ProbeConfig};
use erpbot_simulation::UserSimulatorConfig;

use crate::cycle::CycleKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: &'static str) -> Self {
        Self::InvalidValue {
            key,
            value: value.to_string(),
            reason,
        }
    }
}

/// One period per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Intervals {
    pub testing: Duration,
    pub healing: Duration,
    pub generation: Duration,
    pub ux_analysis: Duration,
    pub performance: Duration,
    pub simulation: Duration,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            testing: Duration::from_millis(30_000),
            healing: Duration::from_millis(60_000),
            generation: Duration::from_millis(45_000),
            ux_analysis: Duration::from_millis(300_000),
            performance: Duration::from_millis(10_000),
            simulation: Duration::from_millis(60_000),
        }
    }
}

impl Intervals {
    pub fn of(&self, cycle: CycleKind) -> Duration {
        match cycle {
            CycleKind::Testing => self.testing,
            CycleKind::Healing => self.healing,
            CycleKind::Generation => self.generation,
            CycleKind::UxAnalysis => self.ux_analysis,
            CycleKind::Performance => self.performance,
            CycleKind::Simulation => self.simulation,
        }
    }

    /// Every cycle on the same period.
    pub fn uniform(period: Duration) -> Self {
        Self {
            testing: period,
            healing: period,
            generation: period,
            ux_analysis: period,
            performance: period,
            simulation: period,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotConfig {
    /// Base URL of the ERP API the probes and the simulator talk to.
    pub api_url: String,
    pub intervals: Intervals,
    pub max_error_history: usize,
    pub suggestion_capacity: usize,
    pub auto_fix: bool,
    pub verbose: bool,
    /// Frontend sources scanned by the UX analysis cycle.
    pub frontend_dir: PathBuf,
    #[serde(skip)]
    pub credentials: Credentials,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".to_string(),
            intervals: Intervals::default(),
            max_error_history: 100,
            suggestion_capacity: 500,
            auto_fix: true,
            verbose: true,
            frontend_dir: PathBuf::from("frontend/src"),
            credentials: Credentials::default(),
        }
    }
}

fn parse_millis(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let ms: u64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(key, raw, "expected milliseconds"))?;
    if ms == 0 {
        return Err(ConfigError::invalid(key, raw, "must be greater than zero"));
    }
    Ok(Duration::from_millis(ms))
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, raw, "expected a boolean")),
    }
}

impl BotConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("BOT_API_URL") {
            let url = url.trim();
            if url.is_empty() {
                return Err(ConfigError::invalid("BOT_API_URL", url, "must not be empty"));
            }
            config.api_url = url.trim_end_matches('/').to_string();
        }

        let intervals: [(&'static str, &mut Duration); 6] = [
            ("BOT_TEST_INTERVAL_MS", &mut config.intervals.testing),
            ("BOT_HEAL_INTERVAL_MS", &mut config.intervals.healing),
            ("BOT_GENERATE_INTERVAL_MS", &mut config.intervals.generation),
            ("BOT_UX_INTERVAL_MS", &mut config.intervals.ux_analysis),
            ("BOT_PERFORMANCE_INTERVAL_MS", &mut config.intervals.performance),
            ("BOT_SIMULATION_INTERVAL_MS", &mut config.intervals.simulation),
        ];
        for (key, slot) in intervals {
            if let Some(raw) = lookup(key) {
                *slot = parse_millis(key, &raw)?;
            }
        }

        if let Some(raw) = lookup("BOT_MAX_ERRORS") {
            let n: usize = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid("BOT_MAX_ERRORS", &raw, "expected a count"))?;
            if n == 0 {
                return Err(ConfigError::invalid("BOT_MAX_ERRORS", &raw, "must be greater than zero"));
            }
            config.max_error_history = n;
        }
        if let Some(raw) = lookup("BOT_AUTO_FIX") {
            config.auto_fix = parse_bool("BOT_AUTO_FIX", &raw)?;
        }
        if let Some(raw) = lookup("BOT_VERBOSE") {
            config.verbose = parse_bool("BOT_VERBOSE", &raw)?;
        }
        if let Some(dir) = lookup("BOT_FRONTEND_DIR") {
            if dir.trim().is_empty() {
                return Err(ConfigError::invalid("BOT_FRONTEND_DIR", &dir, "must not be empty"));
            }
            config.frontend_dir = PathBuf::from(dir.trim());
        }
        if let Some(email) = lookup("BOT_ADMIN_EMAIL") {
            config.credentials.email = email;
        }
        if let Some(password) = lookup("BOT_ADMIN_PASSWORD") {
            config.credentials.password = password;
        }

        Ok(config)
    }

    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig::with_credentials(self.credentials.clone())
    }

    pub fn coverage_config(&self) -> CoverageConfig {
        CoverageConfig {
            credentials: self.credentials.clone(),
            ..CoverageConfig::default()
        }
    }

    pub fn simulator_config(&self) -> UserSimulatorConfig {
        UserSimulatorConfig {
            credentials: self.credentials.clone(),
            ..UserSimulatorConfig::default()
        }
    }
}
