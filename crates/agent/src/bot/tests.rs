use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use proptest::prelude::*;

use erpbot_core::records::{Fix, Priority};
use erpbot_infra::audit::InMemoryAuditSink;
use erpbot_infra::db::ScriptedQueryExecutor;
use erpbot_infra::erp::InMemoryErpStore;
use erpbot_infra::http::StaticApiClient;
use erpbot_perf::StaticHost;
use erpbot_simulation::ActionKind;

use super::*;
use crate::config::Intervals;
use crate::healer::HealError;
use crate::ux::UxError;

struct Harness {
    bot: Bot,
    audit: Arc<InMemoryAuditSink>,
    store: Arc<InMemoryErpStore>,
}

fn harness_with(config: BotConfig, audit: InMemoryAuditSink, tweak: impl FnOnce(BotParts) -> BotParts) -> Harness {
    let audit = Arc::new(audit);
    let store = Arc::new(InMemoryErpStore::new());
    let parts = BotParts::wire(
        &config,
        Collaborators {
            db: Arc::new(ScriptedQueryExecutor::new()),
            api: Arc::new(StaticApiClient::always_ok()),
            store: store.clone(),
            audit: audit.clone(),
            host: Arc::new(StaticHost::default()),
        },
    )
    .with_generator(ActivityGenerator::new(
        store.clone(),
        GeneratorConfig::only(ActionKind::Customer).with_seed(3),
    ));
    let parts = tweak(parts);
    Harness {
        bot: Bot::new(config, parts),
        audit,
        store,
    }
}

fn harness() -> Harness {
    harness_with(BotConfig::default(), InMemoryAuditSink::new(), |p| p)
}

struct FailingHealer {
    attempts: AtomicU64,
}

#[async_trait]
impl Healer for FailingHealer {
    async fn check_and_heal(&self, _auto_fix: bool) -> Result<HealReport, HealError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        Err(HealError::Unavailable(format!("attempt {n}")))
    }
}

struct PanickingHealer;

#[async_trait]
impl Healer for PanickingHealer {
    async fn check_and_heal(&self, _auto_fix: bool) -> Result<HealReport, HealError> {
        panic!("heal exploded");
    }
}

struct SlowHealer;

#[async_trait]
impl Healer for SlowHealer {
    async fn check_and_heal(&self, auto_fix: bool) -> Result<HealReport, HealError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(auto_fix);
        Ok(HealReport {
            errors_found: 2,
            errors_fixed: 2,
            fixes: vec![Fix::new("negative_stock", 2, 2)],
        })
    }
}

struct FixedUx {
    suggestions: Vec<Suggestion>,
}

#[async_trait]
impl UxAnalyzer for FixedUx {
    async fn analyze(&self) -> Result<Vec<Suggestion>, UxError> {
        Ok(self.suggestions.clone())
    }

    async fn apply_suggestion(&self, _suggestion: &Suggestion) -> Result<ApplyOutcome, UxError> {
        Ok(ApplyOutcome::applied())
    }
}

fn drain(rx: &mut broadcast::Receiver<BotEvent>) -> Vec<&'static str> {
    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        names.push(event.name());
    }
    names
}

#[tokio::test(start_paused = true)]
async fn second_start_is_a_no_op() {
    let h = harness();
    assert!(h.bot.start().await);
    let started_at = h.bot.state().started_at;
    assert!(started_at.is_some());
    assert_eq!(h.bot.ticker_count(), 7);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!h.bot.start().await);
    assert_eq!(h.bot.state().started_at, started_at);
    assert_eq!(h.bot.ticker_count(), 7);
    let starts = h.audit.actions().iter().filter(|a| *a == "bot_started").count();
    assert_eq!(starts, 1);

    assert!(h.bot.stop().await);
    assert!(!h.bot.stop().await);
    assert_eq!(h.bot.ticker_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn paused_ticks_have_no_side_effects() {
    let h = harness();
    h.bot.start().await;
    assert!(h.bot.pause());
    assert!(!h.bot.pause());

    tokio::time::sleep(Duration::from_secs(600)).await;
    let stats = h.bot.stats();
    assert_eq!(stats.tests_run, 0);
    assert_eq!(stats.simulation_scenarios, 0);
    assert!(h.store.customers().is_empty());
    assert!(h.audit.metrics().is_empty());
    assert_eq!(h.audit.actions(), vec!["bot_started"]);
    assert!(h.bot.error_history(10).is_empty());

    assert!(h.bot.resume());
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(h.bot.stats().tests_run > 0);
    assert!(!h.store.customers().is_empty());
    assert!(!h.audit.metrics().is_empty());
    h.bot.stop().await;
}

#[tokio::test]
async fn pause_while_stopped_is_ignored() {
    let h = harness();
    assert!(!h.bot.pause());
    assert!(!h.bot.resume());
    assert_eq!(h.bot.state(), BotState::default());
}

#[tokio::test(start_paused = true)]
async fn initial_checks_run_without_waiting_for_a_tick() {
    let h = harness();
    h.bot.start().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let stats = h.bot.stats();
    assert!(stats.tests_run > 0);
    assert_eq!(h.store.customers().len(), 1);
    assert!(h.audit.actions().contains(&"test_results".to_string()));
    h.bot.stop().await;
}

#[tokio::test(start_paused = true)]
async fn a_panicking_cycle_is_recorded_and_keeps_ticking() {
    let h = harness_with(BotConfig::default(), InMemoryAuditSink::new(), |p| {
        p.with_healer(Arc::new(PanickingHealer))
    });
    h.bot.start().await;
    tokio::time::sleep(Duration::from_secs(125)).await;

    let heal_errors: Vec<ErrorRecord> = h
        .bot
        .error_history(100)
        .into_iter()
        .filter(|e| e.source == "healing_cycle")
        .collect();
    // the initial pass plus ticks at 60s and 120s
    assert_eq!(heal_errors.len(), 3);
    assert_eq!(heal_errors[0].message, "healing_cycle panicked");
    assert_eq!(heal_errors[0].detail["panic"], "heal exploded");
    assert_eq!(h.bot.ticker_count(), 7);
    assert!(h.bot.state().running);
    assert!(h.bot.stats().tests_run > 0);
    assert!(h.audit.actions().contains(&"bot_error".to_string()));
    h.bot.stop().await;
}

#[tokio::test]
async fn error_history_keeps_only_the_newest() {
    let config = BotConfig {
        max_error_history: 3,
        ..BotConfig::default()
    };
    let h = harness_with(config, InMemoryAuditSink::new(), |p| {
        p.with_healer(Arc::new(FailingHealer {
            attempts: AtomicU64::new(0),
        }))
    });

    for _ in 0..5 {
        let err = h.bot.heal_now().await.unwrap_err();
        assert!(matches!(err, BotError::Heal(HealError::Unavailable(_))));
    }
    let messages: Vec<String> = h.bot.error_history(10).into_iter().map(|e| e.message).collect();
    assert_eq!(
        messages,
        vec![
            "healer unavailable: attempt 3",
            "healer unavailable: attempt 4",
            "healer unavailable: attempt 5",
        ]
    );
    assert_eq!(h.bot.status().error_count, 3);
}

#[tokio::test(start_paused = true)]
async fn results_of_a_stopped_run_are_discarded() {
    let h = harness_with(BotConfig::default(), InMemoryAuditSink::new(), |p| {
        p.with_healer(Arc::new(SlowHealer))
    });
    h.bot.start().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.bot.stop().await);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.bot.stats().errors_found, 0);
    assert!(h.audit.fixes().is_empty());

    // Direct operations still apply while stopped.
    let report = h.bot.heal_now().await.unwrap();
    assert_eq!(report.errors_fixed, 2);
    assert_eq!(h.bot.stats().errors_fixed, 2);
    assert_eq!(h.audit.fixes(), vec![Fix::new("negative_stock", 2, 2)]);
}

#[tokio::test(start_paused = true)]
async fn missing_audit_tables_are_created_on_first_write() {
    let h = harness_with(BotConfig::default(), InMemoryAuditSink::without_schema(), |p| p);
    h.bot.start().await;
    h.bot.stop().await;

    let actions = h.audit.actions();
    assert_eq!(actions.first().map(String::as_str), Some("bot_started"));
    assert!(actions.contains(&"bot_stopped".to_string()));
    assert_eq!(h.audit.ensure_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn unavailable_audit_store_never_fails_a_cycle() {
    let h = harness_with(BotConfig::default(), InMemoryAuditSink::unavailable(), |p| p);
    h.bot.start().await;
    tokio::time::sleep(Duration::from_secs(50)).await;

    assert!(h.bot.stats().tests_run > 0);
    assert!(h.bot.error_history(10).is_empty());
    assert!(h.bot.stop().await);
}

#[tokio::test]
async fn suggestions_are_queued_and_applied_once() {
    let safe = Suggestion::new("ux", "products", "add placeholder text", Priority::Low).with_auto_fix(true);
    let manual = Suggestion::new("ux", "invoices", "split the long form", Priority::Medium);
    let ux = Arc::new(FixedUx {
        suggestions: vec![safe, manual.clone()],
    });
    let h = harness_with(BotConfig::default(), InMemoryAuditSink::new(), |p| p.with_ux(ux));

    let queued = h.bot.analyze_now().await.unwrap();
    assert_eq!(queued.len(), 2);
    let stats = h.bot.stats();
    assert_eq!(stats.suggestions_generated, 2);
    assert_eq!(stats.suggestions_applied, 1);

    let pending = h.bot.suggestions(Some(SuggestionStatus::Pending));
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, manual.id);

    let unknown = SuggestionId::new();
    assert_eq!(
        h.bot.apply_suggestion(unknown).await,
        Err(BotError::SuggestionNotFound(unknown))
    );

    assert!(h.bot.apply_suggestion(manual.id).await.unwrap().success);
    assert_eq!(h.bot.stats().suggestions_applied, 2);
    assert_eq!(
        h.bot.apply_suggestion(manual.id).await,
        Err(BotError::SuggestionNotPending {
            id: manual.id,
            status: SuggestionStatus::Applied,
        })
    );
    assert!(h.bot.suggestions(Some(SuggestionStatus::Pending)).is_empty());

    let persisted = h.audit.suggestions();
    assert_eq!(persisted.len(), 2);
    assert!(persisted.iter().all(|s| s.status == SuggestionStatus::Applied));
}

#[tokio::test]
async fn auto_apply_is_off_without_auto_fix() {
    let safe = Suggestion::new("ux", "products", "add placeholder text", Priority::Low).with_auto_fix(true);
    let config = BotConfig {
        auto_fix: false,
        ..BotConfig::default()
    };
    let ux = Arc::new(FixedUx {
        suggestions: vec![safe],
    });
    let h = harness_with(config, InMemoryAuditSink::new(), |p| p.with_ux(ux));

    h.bot.analyze_now().await.unwrap();
    assert_eq!(h.bot.stats().suggestions_applied, 0);
    assert_eq!(h.bot.suggestions(Some(SuggestionStatus::Pending)).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn events_follow_the_lifecycle() {
    let h = harness();
    let mut rx = h.bot.subscribe();
    h.bot.start().await;
    tokio::time::sleep(Duration::from_secs(11)).await;
    h.bot.pause();
    h.bot.resume();
    h.bot.stop().await;

    let names = drain(&mut rx);
    assert_eq!(names.first(), Some(&"started"));
    assert_eq!(names.last(), Some(&"stopped"));
    for expected in ["data_generated", "performance_data", "paused", "resumed"] {
        assert!(names.contains(&expected), "missing {expected} in {names:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn manual_sessions_are_clamped() {
    let h = harness();
    let report = h.bot.simulate_now(50).await.unwrap();
    assert_eq!(report.scenarios, MAX_SESSION_SCENARIOS as u64);
    assert_eq!(h.bot.stats().simulation_scenarios, MAX_SESSION_SCENARIOS as u64);

    let report = h.bot.simulate_now(0).await.unwrap();
    assert_eq!(report.scenarios, 1);
    assert_eq!(h.bot.simulation_log(100).len(), MAX_SESSION_SCENARIOS + 1);
}

#[tokio::test]
async fn feature_tests_are_persisted() {
    let h = harness();
    let mut rx = h.bot.subscribe();
    let report = h.bot.run_feature_tests().await.unwrap();
    assert!(report.total > 0);
    assert!(h.audit.actions().contains(&"feature_test".to_string()));
    assert_eq!(drain(&mut rx), vec!["feature_report"]);
}

#[tokio::test]
async fn bulk_generation_counts_invoices() {
    let h = harness();
    let report = h
        .bot
        .generate_bulk(BulkCounts {
            customers: 2,
            products: 2,
            ..BulkCounts::default()
        })
        .await
        .unwrap();
    assert_eq!(report.customers, 2);
    assert_eq!(h.store.customers().len(), 2);
    assert_eq!(h.bot.stats().invoices_created, 0);
}

#[tokio::test]
async fn status_reports_name_and_counts() {
    let h = harness();
    let status = h.bot.status();
    assert_eq!(status.name, "erpbot");
    assert_eq!(status.version, env!("CARGO_PKG_VERSION"));
    assert!(!status.state.running);
    assert_eq!(status.suggestion_count, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_stop_and_start_never_orphan_a_run() {
    let h = harness();
    for _ in 0..100 {
        h.bot.start().await;
        let (stopper, starter) = (h.bot.clone(), h.bot.clone());
        let stop = tokio::spawn(async move { stopper.stop().await });
        let start = tokio::spawn(async move { starter.start().await });
        let _ = tokio::join!(stop, start);

        let running = h.bot.state().running;
        let tickers = h.bot.ticker_count();
        assert_eq!(tickers, if running { 7 } else { 0 }, "running={running}");
    }
    h.bot.stop().await;
    assert_eq!(h.bot.ticker_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn zero_intervals_keep_every_ticker_alive() {
    let config = BotConfig {
        intervals: Intervals::uniform(Duration::ZERO),
        ..BotConfig::default()
    };
    let h = harness_with(config, InMemoryAuditSink::new(), |p| p);
    h.bot.start().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(h.bot.ticker_count(), 7);
    assert!(h.bot.stats().tests_run > 1);
    h.bot.stop().await;
}

#[tokio::test]
async fn default_wiring_analyzes_the_frontend_sources() {
    let dir = std::env::temp_dir().join(format!("erpbot-bot-ux-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(dir.join("components")).unwrap();
    let toolbar = dir.join("components/Toolbar.jsx");
    std::fs::write(&toolbar, "<form>\n<button>Save</button>\n</form>\n").unwrap();

    let config = BotConfig {
        frontend_dir: dir.clone(),
        ..BotConfig::default()
    };
    let h = harness_with(config, InMemoryAuditSink::new(), |p| p);
    let suggestions = h.bot.analyze_now().await.unwrap();
    assert_eq!(suggestions.len(), 2);
    assert_eq!(h.bot.stats().suggestions_applied, 1);
    assert!(std::fs::read_to_string(&toolbar).unwrap().contains("حفظ"));

    let pending = h.bot.suggestions(Some(SuggestionStatus::Pending));
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].issue.as_deref(), Some("form_without_onsubmit"));
    let outcome = h.bot.apply_suggestion(pending[0].id).await.unwrap();
    assert!(!outcome.success);
    assert_eq!(h.audit.suggestions().len(), 2);
}

proptest! {
    #[test]
    fn error_history_never_exceeds_its_capacity(capacity in 1usize..6, failures in 0usize..12) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let config = BotConfig { max_error_history: capacity, ..BotConfig::default() };
        let h = harness_with(config, InMemoryAuditSink::new(), |p| {
            p.with_healer(Arc::new(FailingHealer { attempts: AtomicU64::new(0) }))
        });
        rt.block_on(async {
            for _ in 0..failures {
                let _ = h.bot.heal_now().await;
            }
        });
        let history = h.bot.error_history(usize::MAX);
        prop_assert_eq!(history.len(), failures.min(capacity));
        if let Some(last) = history.last() {
            prop_assert_eq!(&last.message, &format!("healer unavailable: attempt {failures}"));
        }
    }
}
