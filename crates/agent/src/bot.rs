//! The orchestrator.
//!
//! Owns lifecycle, counters, the error history, and the suggestion queue.
//! Every cycle body runs in its own task; its result comes back here and is
//! applied under one lock, so cycles never share mutable state with each
//! other. A failure or panic in a body becomes an [`ErrorRecord`] and the
//! ticker keeps going.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument};

use erpbot_core::records::{Suggestion, SuggestionStatus};
use erpbot_core::{BoundedHistory, SuggestionId};
use erpbot_infra::audit::AuditSink;
use erpbot_infra::db::QueryExecutor;
use erpbot_infra::erp::ErpStore;
use erpbot_infra::http::ApiClient;
use erpbot_perf::{HostMetrics, PerformanceSample, PerformanceSampler, PerformanceSummary, Recommendation, SamplerConfig};
use erpbot_probes::{CoverageReport, FeatureCoverageRunner, ProbeRunner, TestReport};
use erpbot_simulation::{
    ActivityGenerator, BulkCounts, BulkReport, GenerationReport, GeneratorConfig, Scenario, ScenarioOutcome,
    SessionReport, UserSimulator,
};

use crate::config::BotConfig;
use crate::cycle::CycleKind;
use crate::error::{BotError, BotResult};
use crate::events::{BotEvent, EventChannel, EVENT_CAPACITY};
use crate::healer::{HealReport, Healer, RuleHealer};
use crate::persist::{actions, AuditWrite, AuditWriter};
use crate::state::{BotState, BotStatus, ErrorRecord, Lifecycle, Stats, StatsDelta};
use crate::ticker::TickerSet;
use crate::ux::{ApplyOutcome, RuleUxAnalyzer, UxAnalyzer};

pub const NAME: &str = "erpbot";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const MAX_SESSION_SCENARIOS: usize = 20;
pub const DEFAULT_SESSION_SCENARIOS: usize = 5;

const FEATURE_TEST_SOURCE: &str = "feature_test";
const UPTIME_TICK: Duration = Duration::from_secs(1);

/// Logs a cycle summary at info when verbose, debug otherwise.
macro_rules! tick_summary {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+);
        } else {
            tracing::debug!($($arg)+);
        }
    };
}

/// The outside world, as the orchestrator sees it.
#[derive(Clone)]
pub struct Collaborators {
    pub db: Arc<dyn QueryExecutor>,
    pub api: Arc<dyn ApiClient>,
    pub store: Arc<dyn ErpStore>,
    pub audit: Arc<dyn AuditSink>,
    pub host: Arc<dyn HostMetrics>,
}

/// The components the cycles delegate to.
pub struct BotParts {
    pub probes: ProbeRunner,
    pub coverage: FeatureCoverageRunner,
    pub healer: Arc<dyn Healer>,
    pub generator: ActivityGenerator,
    pub ux: Arc<dyn UxAnalyzer>,
    pub sampler: PerformanceSampler,
    pub simulator: UserSimulator,
    pub audit: Arc<dyn AuditSink>,
}

impl BotParts {
    /// Default wiring: rule healer and rule UX analyzer over `frontend_dir`.
    pub fn wire(config: &BotConfig, c: Collaborators) -> Self {
        Self {
            probes: ProbeRunner::new(Arc::clone(&c.api), Arc::clone(&c.db), config.probe_config()),
            coverage: FeatureCoverageRunner::new(Arc::clone(&c.api), Arc::clone(&c.db), config.coverage_config()),
            healer: Arc::new(RuleHealer::new(Arc::clone(&c.db))),
            generator: ActivityGenerator::new(c.store, GeneratorConfig::default()),
            ux: Arc::new(RuleUxAnalyzer::new(config.frontend_dir.clone())),
            sampler: PerformanceSampler::new(c.host, c.db, SamplerConfig::default()),
            simulator: UserSimulator::new(c.api, config.simulator_config()),
            audit: c.audit,
        }
    }

    pub fn with_healer(mut self, healer: Arc<dyn Healer>) -> Self {
        self.healer = healer;
        self
    }

    pub fn with_ux(mut self, ux: Arc<dyn UxAnalyzer>) -> Self {
        self.ux = ux;
        self
    }

    pub fn with_generator(mut self, generator: ActivityGenerator) -> Self {
        self.generator = generator;
        self
    }
}

/// Where a cycle result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// A tick of the run with this epoch; dropped once that run has ended.
    Scheduled(u64),
    /// A direct operation; always applied.
    Manual,
}

struct Shared {
    lifecycle: Lifecycle,
    stats: Stats,
    errors: BoundedHistory<ErrorRecord>,
    suggestions: BoundedHistory<Suggestion>,
    /// Tickers of the current run; swapped together with `lifecycle`.
    tickers: Option<TickerSet>,
}

struct BotInner {
    config: Arc<BotConfig>,
    parts: BotParts,
    audit: AuditWriter,
    shared: Mutex<Shared>,
    events: EventChannel,
}

struct UxPass {
    suggestions: Vec<Suggestion>,
    applied: u64,
}

#[derive(Clone)]
pub struct Bot {
    inner: Arc<BotInner>,
}

impl Bot {
    pub fn new(config: BotConfig, parts: BotParts) -> Self {
        let shared = Shared {
            lifecycle: Lifecycle::default(),
            stats: Stats::default(),
            errors: BoundedHistory::new(config.max_error_history),
            suggestions: BoundedHistory::new(config.suggestion_capacity),
            tickers: None,
        };
        let audit = AuditWriter::new(Arc::clone(&parts.audit));
        Self {
            inner: Arc::new(BotInner {
                config: Arc::new(config),
                parts,
                audit,
                shared: Mutex::new(shared),
                events: EventChannel::new(EVENT_CAPACITY),
            }),
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.inner.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BotEvent> {
        self.inner.events.subscribe()
    }

    /// Start every cycle. `false` (and nothing else happens) when already
    /// running.
    #[instrument(skip(self))]
    pub async fn start(&self) -> bool {
        let now = Utc::now();
        let epoch = {
            let mut shared = self.inner.lock();
            let Some(epoch) = shared.lifecycle.start(now) else {
                info!("bot is already running");
                return false;
            };
            shared.stats.started_at = Some(now);
            shared.stats.uptime_seconds = 0;
            if let Some(previous) = shared.tickers.replace(self.inner.spawn_tickers(epoch)) {
                previous.shutdown();
            }
            epoch
        };

        let config = serde_json::to_value(self.inner.config.as_ref()).unwrap_or_default();
        self.inner
            .audit
            .write(AuditWrite::log(actions::BOT_STARTED, json!({ "config": config })))
            .await;
        self.inner.events.emit(BotEvent::Started { started_at: now });
        info!(epoch, api_url = %self.inner.config.api_url, "bot started");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            for kind in [CycleKind::Testing, CycleKind::Healing, CycleKind::Generation] {
                inner.tick(kind, epoch).await;
            }
            debug!(epoch, "initial checks finished");
        });
        true
    }

    /// Cancel every ticker. Bodies already running finish, but their results
    /// are discarded. `false` when not running.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> bool {
        let stats = {
            let mut shared = self.inner.lock();
            let uptime = shared.lifecycle.uptime_secs();
            if !shared.lifecycle.stop() {
                info!("bot is not running");
                return false;
            }
            shared.stats.uptime_seconds = uptime;
            if let Some(tickers) = shared.tickers.take() {
                tickers.shutdown();
            }
            shared.stats.clone()
        };

        let data = serde_json::to_value(&stats).unwrap_or_default();
        self.inner
            .audit
            .write(AuditWrite::log(actions::BOT_STOPPED, json!({ "stats": data })))
            .await;
        info!(uptime_secs = stats.uptime_seconds, "bot stopped");
        self.inner.events.emit(BotEvent::Stopped { stats });
        true
    }

    /// `false` unless running and not already paused.
    pub fn pause(&self) -> bool {
        let changed = self.inner.lock().lifecycle.pause();
        if changed {
            info!("bot paused");
            self.inner.events.emit(BotEvent::Paused);
        }
        changed
    }

    pub fn resume(&self) -> bool {
        let changed = self.inner.lock().lifecycle.resume();
        if changed {
            info!("bot resumed");
            self.inner.events.emit(BotEvent::Resumed);
        }
        changed
    }

    pub fn state(&self) -> BotState {
        self.inner.lock().lifecycle.state()
    }

    pub fn stats(&self) -> Stats {
        let shared = self.inner.lock();
        let mut stats = shared.stats.clone();
        if shared.lifecycle.is_running() {
            stats.uptime_seconds = shared.lifecycle.uptime_secs();
        }
        stats
    }

    pub fn status(&self) -> BotStatus {
        let shared = self.inner.lock();
        let mut stats = shared.stats.clone();
        if shared.lifecycle.is_running() {
            stats.uptime_seconds = shared.lifecycle.uptime_secs();
        }
        BotStatus {
            name: NAME.to_string(),
            version: VERSION.to_string(),
            state: shared.lifecycle.state(),
            stats,
            error_count: shared.errors.len(),
            suggestion_count: shared.suggestions.len(),
        }
    }

    /// Live tickers of the current run.
    pub fn ticker_count(&self) -> usize {
        self.inner.lock().tickers.as_ref().map_or(0, TickerSet::len)
    }

    /// Most recent errors, newest last.
    pub fn error_history(&self, limit: usize) -> Vec<ErrorRecord> {
        self.inner.lock().errors.recent_vec(limit)
    }

    pub fn suggestions(&self, status: Option<SuggestionStatus>) -> Vec<Suggestion> {
        self.inner
            .lock()
            .suggestions
            .iter()
            .filter(|s| status.is_none_or(|wanted| s.status == wanted))
            .cloned()
            .collect()
    }

    /// Apply one queued suggestion through the UX analyzer.
    #[instrument(skip(self))]
    pub async fn apply_suggestion(&self, id: SuggestionId) -> BotResult<ApplyOutcome> {
        let suggestion = {
            let shared = self.inner.lock();
            shared.suggestions.iter().find(|s| s.id == id).cloned()
        }
        .ok_or(BotError::SuggestionNotFound(id))?;
        if !suggestion.is_pending() {
            return Err(BotError::SuggestionNotPending {
                id,
                status: suggestion.status,
            });
        }

        let outcome = self.inner.parts.ux.apply_suggestion(&suggestion).await?;
        if !outcome.success {
            debug!(suggestion = %id, reason = ?outcome.reason, "suggestion declined");
            return Ok(outcome);
        }

        let updated = {
            let mut guard = self.inner.lock();
            let shared = &mut *guard;
            let updated = shared
                .suggestions
                .iter_mut()
                .find(|s| s.id == id && s.is_pending())
                .map(|s| {
                    s.mark_applied(Utc::now());
                    s.clone()
                });
            if updated.is_some() {
                shared.stats.suggestions_applied += 1;
            }
            updated
        };
        if let Some(suggestion) = updated {
            info!(suggestion = %id, component = %suggestion.component, "suggestion applied");
            self.inner.audit.write(AuditWrite::Suggestion(suggestion)).await;
        }
        Ok(outcome)
    }

    pub async fn run_tests_now(&self) -> BotResult<TestReport> {
        self.inner.testing(Trigger::Manual).await
    }

    pub async fn heal_now(&self) -> BotResult<HealReport> {
        self.inner.healing(Trigger::Manual).await
    }

    pub async fn generate_now(&self) -> BotResult<GenerationReport> {
        self.inner.generation(Trigger::Manual).await
    }

    /// Run the UX analyzer; returns the suggestions it queued.
    pub async fn analyze_now(&self) -> BotResult<Vec<Suggestion>> {
        self.inner.ux_analysis(Trigger::Manual).await.map(|pass| pass.suggestions)
    }

    pub async fn sample_now(&self) -> BotResult<PerformanceSample> {
        self.inner.performance(Trigger::Manual).await
    }

    pub async fn simulate_scenario_now(&self, scenario: Option<Scenario>) -> BotResult<ScenarioOutcome> {
        self.inner.simulation(Trigger::Manual, scenario).await
    }

    /// One simulated session of `scenarios` scenarios, clamped to
    /// `1..=MAX_SESSION_SCENARIOS`.
    #[instrument(skip(self))]
    pub async fn simulate_now(&self, scenarios: usize) -> BotResult<SessionReport> {
        let scenarios = scenarios.clamp(1, MAX_SESSION_SCENARIOS);
        let inner = Arc::clone(&self.inner);
        let report = self
            .inner
            .contained(
                CycleKind::Simulation.source(),
                Trigger::Manual,
                async move { Ok(inner.parts.simulator.run_session(scenarios).await) },
            )
            .await?;

        let delta = StatsDelta {
            simulation_sessions: report.sessions,
            simulation_scenarios: report.scenarios,
            simulation_successful: report.successful,
            ..StatsDelta::default()
        };
        if self.inner.commit(Trigger::Manual, &delta, |_| {}) {
            tick_summary!(
                self.inner.config.verbose,
                scenarios = report.scenarios,
                successful = report.successful,
                "simulated session finished"
            );
            for outcome in &report.outcomes {
                self.inner.events.emit(BotEvent::SimulationCompleted {
                    outcome: outcome.clone(),
                });
            }
        }
        Ok(report)
    }

    pub fn simulation_log(&self, limit: usize) -> Vec<ScenarioOutcome> {
        self.inner.parts.simulator.action_log(limit)
    }

    /// Walk every feature category and persist the report.
    #[instrument(skip(self))]
    pub async fn run_feature_tests(&self) -> BotResult<CoverageReport> {
        let inner = Arc::clone(&self.inner);
        let report = self
            .inner
            .contained(FEATURE_TEST_SOURCE, Trigger::Manual, async move {
                Ok(inner.parts.coverage.run().await)
            })
            .await?;

        let data = serde_json::to_value(&report).unwrap_or_default();
        self.inner
            .audit
            .write(AuditWrite::log(actions::FEATURE_TEST, data))
            .await;
        self.inner.events.emit(BotEvent::FeatureReport {
            report: Box::new(report.clone()),
        });
        Ok(report)
    }

    /// Create fixed numbers of records in one pass.
    #[instrument(skip(self))]
    pub async fn generate_bulk(&self, counts: BulkCounts) -> BotResult<BulkReport> {
        let inner = Arc::clone(&self.inner);
        let report = self
            .inner
            .contained(CycleKind::Generation.source(), Trigger::Manual, async move {
                Ok::<_, BotError>(inner.parts.generator.generate_bulk(counts).await?)
            })
            .await?;

        let delta = StatsDelta {
            invoices_created: u64::from(report.invoices),
            ..StatsDelta::default()
        };
        self.inner.commit(Trigger::Manual, &delta, |_| {});
        let data = serde_json::to_value(report).unwrap_or_default();
        self.inner
            .audit
            .write(AuditWrite::log(actions::DATA_GENERATED, json!({ "bulk": data })))
            .await;
        self.inner.events.emit(BotEvent::DataGenerated {
            invoices: u64::from(report.invoices),
            transactions: 0,
        });
        Ok(report)
    }

    pub fn performance_summary(&self) -> Option<PerformanceSummary> {
        self.inner.parts.sampler.summary()
    }

    pub fn performance_history(&self, limit: usize) -> Vec<PerformanceSample> {
        self.inner.parts.sampler.history(limit)
    }

    pub fn performance_recommendations(&self) -> Vec<Recommendation> {
        self.inner.parts.sampler.recommendations()
    }
}

impl BotInner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One ticker per cycle plus the uptime counter, all bound to `epoch`.
    fn spawn_tickers(self: &Arc<Self>, epoch: u64) -> TickerSet {
        let mut tickers = TickerSet::new();
        for kind in CycleKind::ALL {
            let inner = Arc::clone(self);
            tickers.spawn(kind.source(), self.config.intervals.of(kind), move || {
                let inner = Arc::clone(&inner);
                async move { inner.tick(kind, epoch).await }
            });
        }
        let inner = Arc::clone(self);
        tickers.spawn("uptime", UPTIME_TICK, move || {
            let inner = Arc::clone(&inner);
            async move { inner.refresh_uptime(epoch) }
        });
        tickers
    }

    fn refresh_uptime(&self, epoch: u64) {
        let mut shared = self.lock();
        if shared.lifecycle.accepts(epoch) {
            shared.stats.uptime_seconds = shared.lifecycle.uptime_secs();
        }
    }

    /// Whether a scheduled tick of `epoch` should run at all.
    fn should_tick(&self, epoch: u64) -> bool {
        let shared = self.lock();
        shared.lifecycle.accepts(epoch) && !shared.lifecycle.is_paused()
    }

    async fn tick(self: &Arc<Self>, kind: CycleKind, epoch: u64) {
        if !self.should_tick(epoch) {
            return;
        }
        let trigger = Trigger::Scheduled(epoch);
        // Failures are already in the error history.
        let _ = match kind {
            CycleKind::Testing => self.testing(trigger).await.map(drop),
            CycleKind::Healing => self.healing(trigger).await.map(drop),
            CycleKind::Generation => self.generation(trigger).await.map(drop),
            CycleKind::UxAnalysis => self.ux_analysis(trigger).await.map(drop),
            CycleKind::Performance => self.performance(trigger).await.map(drop),
            CycleKind::Simulation => self.simulation(trigger, None).await.map(drop),
        };
    }

    /// Apply `delta` (and `extra`) if the result is still wanted.
    fn commit(&self, trigger: Trigger, delta: &StatsDelta, extra: impl FnOnce(&mut Shared)) -> bool {
        let mut shared = self.lock();
        if let Trigger::Scheduled(epoch) = trigger {
            if !shared.lifecycle.accepts(epoch) {
                debug!(epoch, "discarding result of an ended run");
                return false;
            }
        }
        shared.stats.apply(delta);
        extra(&mut *shared);
        true
    }

    /// Run `body` in its own task. An error or panic is recorded under
    /// `source` and handed back.
    async fn contained<T, Fut>(&self, source: &'static str, trigger: Trigger, body: Fut) -> BotResult<T>
    where
        T: Send + 'static,
        Fut: Future<Output = BotResult<T>> + Send + 'static,
    {
        match tokio::spawn(body).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                self.record_error(source, err.to_string(), json!({ "error": format!("{err:?}") }), trigger)
                    .await;
                Err(err)
            }
            Err(join) => {
                let reason = if join.is_panic() {
                    panic_message(join.into_panic())
                } else {
                    "cancelled".to_string()
                };
                let err = BotError::Panicked { cycle: source };
                self.record_error(source, err.to_string(), json!({ "panic": reason }), trigger)
                    .await;
                Err(err)
            }
        }
    }

    async fn record_error(&self, source: &'static str, message: String, detail: JsonValue, trigger: Trigger) {
        let record = ErrorRecord::new(source, message, detail);
        {
            let mut shared = self.lock();
            if let Trigger::Scheduled(epoch) = trigger {
                if !shared.lifecycle.accepts(epoch) {
                    debug!(source, "discarding error of an ended run");
                    return;
                }
            }
            shared.errors.push(record.clone());
        }
        error!(source, error_id = %record.id, message = %record.message, "cycle failed");
        let data = serde_json::to_value(&record).unwrap_or_default();
        self.audit.write(AuditWrite::log(actions::BOT_ERROR, data)).await;
        self.events.emit(BotEvent::Error { record });
    }

    async fn testing(self: &Arc<Self>, trigger: Trigger) -> BotResult<TestReport> {
        let inner = Arc::clone(self);
        let report = self
            .contained(CycleKind::Testing.source(), trigger, async move {
                Ok(inner.parts.probes.run_all().await)
            })
            .await?;

        let delta = StatsDelta {
            tests_run: report.total as u64,
            tests_passed: report.passed as u64,
            tests_failed: report.failed as u64,
            ..StatsDelta::default()
        };
        if !self.commit(trigger, &delta, |_| {}) {
            return Ok(report);
        }
        tick_summary!(
            self.config.verbose,
            total = report.total,
            passed = report.passed,
            failed = report.failed,
            duration_ms = report.duration_ms,
            "testing cycle finished"
        );
        if report.failed > 0 {
            self.events.emit(BotEvent::TestsFailed {
                failures: report.failures.clone(),
            });
        }
        let failures: Vec<&str> = report.failures.iter().map(|f| f.name.as_str()).collect();
        let data = json!({
            "total": report.total,
            "passed": report.passed,
            "failed": report.failed,
            "duration_ms": report.duration_ms,
            "failures": failures,
        });
        self.audit.write(AuditWrite::log(actions::TEST_RESULTS, data)).await;
        Ok(report)
    }

    async fn healing(self: &Arc<Self>, trigger: Trigger) -> BotResult<HealReport> {
        let inner = Arc::clone(self);
        let auto_fix = self.config.auto_fix;
        let report = self
            .contained(CycleKind::Healing.source(), trigger, async move {
                Ok::<_, BotError>(inner.parts.healer.check_and_heal(auto_fix).await?)
            })
            .await?;

        let delta = StatsDelta {
            errors_found: report.errors_found,
            errors_fixed: report.errors_fixed,
            ..StatsDelta::default()
        };
        if !self.commit(trigger, &delta, |_| {}) {
            return Ok(report);
        }
        tick_summary!(
            self.config.verbose,
            found = report.errors_found,
            fixed = report.errors_fixed,
            "healing cycle finished"
        );
        for fix in &report.fixes {
            self.audit.write(AuditWrite::Fix(fix.clone())).await;
        }
        if report.errors_fixed > 0 {
            self.events.emit(BotEvent::ErrorsFixed {
                fixes: report.fixes.clone(),
            });
        }
        Ok(report)
    }

    async fn generation(self: &Arc<Self>, trigger: Trigger) -> BotResult<GenerationReport> {
        let inner = Arc::clone(self);
        let report = self
            .contained(CycleKind::Generation.source(), trigger, async move {
                Ok(inner.parts.generator.generate().await)
            })
            .await?;

        let delta = StatsDelta {
            invoices_created: report.invoices,
            transactions_created: report.transactions,
            ..StatsDelta::default()
        };
        if !self.commit(trigger, &delta, |_| {}) {
            return Ok(report);
        }
        tick_summary!(
            self.config.verbose,
            invoices = report.invoices,
            transactions = report.transactions,
            actions = report.outcomes.len(),
            "generation cycle finished"
        );
        self.events.emit(BotEvent::DataGenerated {
            invoices: report.invoices,
            transactions: report.transactions,
        });
        let outcomes = serde_json::to_value(&report.outcomes).unwrap_or_default();
        let data = json!({
            "invoices": report.invoices,
            "transactions": report.transactions,
            "outcomes": outcomes,
        });
        self.audit.write(AuditWrite::log(actions::DATA_GENERATED, data)).await;

        for (action, message) in report.failures() {
            self.record_error(
                CycleKind::Generation.source(),
                format!("{}: {message}", action.as_str()),
                json!({ "action": action.as_str() }),
                trigger,
            )
            .await;
        }
        Ok(report)
    }

    async fn ux_analysis(self: &Arc<Self>, trigger: Trigger) -> BotResult<UxPass> {
        let inner = Arc::clone(self);
        let pass = self
            .contained(CycleKind::UxAnalysis.source(), trigger, async move {
                let suggestions = inner.parts.ux.analyze().await?;
                let applied = if inner.config.auto_fix && !suggestions.is_empty() {
                    inner.parts.ux.apply_auto_suggestions(&suggestions).await
                } else {
                    Vec::new()
                };
                let now = Utc::now();
                let suggestions: Vec<Suggestion> = suggestions
                    .into_iter()
                    .map(|mut s| {
                        if applied.contains(&s.id) {
                            s.mark_applied(now);
                        }
                        s
                    })
                    .collect();
                Ok::<_, BotError>(UxPass {
                    suggestions,
                    applied: applied.len() as u64,
                })
            })
            .await?;

        let delta = StatsDelta {
            suggestions_generated: pass.suggestions.len() as u64,
            suggestions_applied: pass.applied,
            ..StatsDelta::default()
        };
        let queued = self.commit(trigger, &delta, |shared| {
            for suggestion in &pass.suggestions {
                shared.suggestions.push(suggestion.clone());
            }
        });
        if !queued {
            return Ok(pass);
        }
        tick_summary!(
            self.config.verbose,
            suggestions = pass.suggestions.len(),
            applied = pass.applied,
            "ux analysis cycle finished"
        );
        for suggestion in &pass.suggestions {
            self.audit.write(AuditWrite::Suggestion(suggestion.clone())).await;
        }
        if !pass.suggestions.is_empty() {
            self.events.emit(BotEvent::UxSuggestions {
                suggestions: pass.suggestions.clone(),
            });
        }
        Ok(pass)
    }

    async fn performance(self: &Arc<Self>, trigger: Trigger) -> BotResult<PerformanceSample> {
        let inner = Arc::clone(self);
        let sample = self
            .contained(CycleKind::Performance.source(), trigger, async move {
                Ok(inner.parts.sampler.collect().await)
            })
            .await?;

        if !self.commit(trigger, &StatsDelta::default(), |_| {}) {
            return Ok(sample);
        }
        debug!(
            cpu = sample.system.cpu_usage,
            memory = sample.system.memory_usage,
            db_ms = sample.db.query_time_ms,
            issues = sample.issues.len(),
            "performance sample taken"
        );
        self.audit.write(AuditWrite::Metrics(sample.to_record())).await;
        let cutoff = self.parts.sampler.retention_cutoff(Utc::now());
        self.audit.write(AuditWrite::Prune(cutoff)).await;

        self.events.emit(BotEvent::PerformanceData {
            sample: Box::new(sample.clone()),
        });
        if !sample.issues.is_empty() {
            self.events.emit(BotEvent::PerformanceIssues {
                issues: sample.issues.clone(),
            });
        }
        Ok(sample)
    }

    async fn simulation(self: &Arc<Self>, trigger: Trigger, scenario: Option<Scenario>) -> BotResult<ScenarioOutcome> {
        let inner = Arc::clone(self);
        let outcome = self
            .contained(CycleKind::Simulation.source(), trigger, async move {
                let simulator = &inner.parts.simulator;
                Ok(match scenario {
                    Some(scenario) => simulator.run_scenario(scenario).await,
                    None => simulator.run_random_scenario().await,
                })
            })
            .await?;

        let delta = StatsDelta {
            simulation_sessions: u64::from(outcome.new_session),
            simulation_scenarios: 1,
            simulation_successful: u64::from(outcome.success),
            ..StatsDelta::default()
        };
        if !self.commit(trigger, &delta, |_| {}) {
            return Ok(outcome);
        }
        tick_summary!(
            self.config.verbose,
            scenario = outcome.scenario.as_str(),
            success = outcome.success,
            duration_ms = outcome.duration_ms,
            "simulation cycle finished"
        );
        self.events.emit(BotEvent::SimulationCompleted {
            outcome: outcome.clone(),
        });
        Ok(outcome)
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "unknown panic".to_string()
}

#[cfg(test)]
mod tests;
