//! Outbound orchestrator events.
//!
//! Delivered over a lossy broadcast channel: a slow subscriber misses events,
//! and emitting never blocks or fails the emitter.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use erpbot_core::records::{Fix, Suggestion};
use erpbot_perf::{Issue, PerformanceSample};
use erpbot_probes::{CoverageReport, ProbeResult};
use erpbot_simulation::ScenarioOutcome;

use crate::state::{ErrorRecord, Stats};

pub const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum BotEvent {
    Started { started_at: DateTime<Utc> },
    Stopped { stats: Stats },
    Paused,
    Resumed,
    TestsFailed { failures: Vec<ProbeResult> },
    ErrorsFixed { fixes: Vec<Fix> },
    DataGenerated { invoices: u64, transactions: u64 },
    UxSuggestions { suggestions: Vec<Suggestion> },
    PerformanceData { sample: Box<PerformanceSample> },
    PerformanceIssues { issues: Vec<Issue> },
    SimulationCompleted { outcome: ScenarioOutcome },
    FeatureReport { report: Box<CoverageReport> },
    Error { record: ErrorRecord },
}

impl BotEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BotEvent::Started { .. } => "started",
            BotEvent::Stopped { .. } => "stopped",
            BotEvent::Paused => "paused",
            BotEvent::Resumed => "resumed",
            BotEvent::TestsFailed { .. } => "tests_failed",
            BotEvent::ErrorsFixed { .. } => "errors_fixed",
            BotEvent::DataGenerated { .. } => "data_generated",
            BotEvent::UxSuggestions { .. } => "ux_suggestions",
            BotEvent::PerformanceData { .. } => "performance_data",
            BotEvent::PerformanceIssues { .. } => "performance_issues",
            BotEvent::SimulationCompleted { .. } => "simulation_completed",
            BotEvent::FeatureReport { .. } => "feature_report",
            BotEvent::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventChannel {
    tx: broadcast::Sender<BotEvent>,
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new(EVENT_CAPACITY)
    }
}

impl EventChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn emit(&self, event: BotEvent) {
        tracing::trace!(event = event.name(), "bot event");
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BotEvent> {
        self.tx.subscribe()
    }
}
