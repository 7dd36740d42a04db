//! State owned exclusively by the orchestrator.
//!
//! Cycles never touch these directly; they return results that are turned
//! into a [`StatsDelta`] and applied under one lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::time::Instant;

use erpbot_core::ErrorId;

/// Public view of the lifecycle. `paused` implies `running`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotState {
    pub running: bool,
    pub paused: bool,
    pub started_at: Option<DateTime<Utc>>,
}

/// `Stopped -> Running <-> Paused -> Stopped`.
///
/// `epoch` changes on every start and stop; a cycle result tagged with an
/// older epoch belongs to a run that no longer exists and is dropped.
#[derive(Debug, Default)]
pub struct Lifecycle {
    state: BotState,
    started: Option<Instant>,
    epoch: u64,
}

impl Lifecycle {
    pub fn state(&self) -> BotState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    /// `Some(epoch)` of the new run, `None` when already running.
    pub fn start(&mut self, now: DateTime<Utc>) -> Option<u64> {
        if self.state.running {
            return None;
        }
        self.epoch += 1;
        self.state = BotState {
            running: true,
            paused: false,
            started_at: Some(now),
        };
        self.started = Some(Instant::now());
        Some(self.epoch)
    }

    /// `false` when already stopped.
    pub fn stop(&mut self) -> bool {
        if !self.state.running {
            return false;
        }
        self.epoch += 1;
        self.state.running = false;
        self.state.paused = false;
        true
    }

    /// `false` unless running and not yet paused.
    pub fn pause(&mut self) -> bool {
        if !self.state.running || self.state.paused {
            return false;
        }
        self.state.paused = true;
        true
    }

    pub fn resume(&mut self) -> bool {
        if !self.state.paused {
            return false;
        }
        self.state.paused = false;
        true
    }

    /// A result from `epoch` may still be applied.
    pub fn accepts(&self, epoch: u64) -> bool {
        self.state.running && self.epoch == epoch
    }

    /// Seconds since the current run started; 0 when stopped.
    pub fn uptime_secs(&self) -> u64 {
        match (self.state.running, self.started) {
            (true, Some(started)) => started.elapsed().as_secs(),
            _ => 0,
        }
    }
}

/// Monotonic counters across the life of the process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub started_at: Option<DateTime<Utc>>,
    pub tests_run: u64,
    pub tests_passed: u64,
    pub tests_failed: u64,
    pub errors_found: u64,
    pub errors_fixed: u64,
    pub suggestions_generated: u64,
    pub suggestions_applied: u64,
    pub invoices_created: u64,
    pub transactions_created: u64,
    pub simulation_sessions: u64,
    pub simulation_scenarios: u64,
    pub simulation_successful: u64,
    pub uptime_seconds: u64,
}

/// Increments produced by one cycle result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsDelta {
    pub tests_run: u64,
    pub tests_passed: u64,
    pub tests_failed: u64,
    pub errors_found: u64,
    pub errors_fixed: u64,
    pub suggestions_generated: u64,
    pub suggestions_applied: u64,
    pub invoices_created: u64,
    pub transactions_created: u64,
    pub simulation_sessions: u64,
    pub simulation_scenarios: u64,
    pub simulation_successful: u64,
}

impl StatsDelta {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Stats {
    pub fn apply(&mut self, d: &StatsDelta) {
        self.tests_run = self.tests_run.saturating_add(d.tests_run);
        self.tests_passed = self.tests_passed.saturating_add(d.tests_passed);
        self.tests_failed = self.tests_failed.saturating_add(d.tests_failed);
        self.errors_found = self.errors_found.saturating_add(d.errors_found);
        self.errors_fixed = self.errors_fixed.saturating_add(d.errors_fixed);
        self.suggestions_generated = self.suggestions_generated.saturating_add(d.suggestions_generated);
        self.suggestions_applied = self.suggestions_applied.saturating_add(d.suggestions_applied);
        self.invoices_created = self.invoices_created.saturating_add(d.invoices_created);
        self.transactions_created = self.transactions_created.saturating_add(d.transactions_created);
        self.simulation_sessions = self.simulation_sessions.saturating_add(d.simulation_sessions);
        self.simulation_scenarios = self.simulation_scenarios.saturating_add(d.simulation_scenarios);
        self.simulation_successful = self.simulation_successful.saturating_add(d.simulation_successful);
    }
}

/// A contained cycle failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: ErrorId,
    pub source: String,
    pub message: String,
    pub detail: JsonValue,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(source: impl Into<String>, message: impl Into<String>, detail: JsonValue) -> Self {
        Self {
            id: ErrorId::new(),
            source: source.into(),
            message: message.into(),
            detail,
            timestamp: Utc::now(),
        }
    }
}

/// Everything `status` reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotStatus {
    pub name: String,
    pub version: String,
    #[serde(flatten)]
    pub state: BotState,
    pub stats: Stats,
    pub error_count: usize,
    pub suggestion_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_is_idempotent_and_keeps_started_at() {
        let mut life = Lifecycle::default();
        let first = Utc::now();
        let epoch = life.start(first).expect("first start");
        assert!(life.start(Utc::now()).is_none());
        assert_eq!(life.epoch(), epoch);
        assert_eq!(life.state().started_at, Some(first));
    }

    #[test]
    fn pause_requires_running() {
        let mut life = Lifecycle::default();
        assert!(!life.pause());
        assert!(!life.state().paused);

        life.start(Utc::now());
        assert!(life.pause());
        assert!(!life.pause());
        assert!(life.resume());
        assert!(!life.resume());
    }

    #[test]
    fn stop_invalidates_the_running_epoch() {
        let mut life = Lifecycle::default();
        let epoch = life.start(Utc::now()).unwrap();
        assert!(life.accepts(epoch));
        life.pause();
        assert!(life.stop());
        assert!(!life.stop());
        assert!(!life.accepts(epoch));
        assert_eq!(life.state(), BotState {
            running: false,
            paused: false,
            started_at: life.state().started_at,
        });

        let next = life.start(Utc::now()).unwrap();
        assert!(next > epoch);
        assert!(!life.accepts(epoch));
    }

    #[test]
    fn deltas_accumulate() {
        let mut stats = Stats::default();
        let delta = StatsDelta {
            tests_run: 10,
            tests_passed: 9,
            tests_failed: 1,
            ..StatsDelta::default()
        };
        stats.apply(&delta);
        stats.apply(&delta);
        assert_eq!((stats.tests_run, stats.tests_passed, stats.tests_failed), (20, 18, 2));
        assert!(StatsDelta::default().is_empty());
        assert!(!delta.is_empty());
    }
}
