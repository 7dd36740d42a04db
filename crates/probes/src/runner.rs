//! The testing-cycle probe runner.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use erpbot_infra::db::QueryExecutor;
use erpbot_infra::http::ApiClient;

use crate::battery;
use crate::probe::{
    login, probe_endpoint, Credentials, DbProbe, EndpointProbe, LogicAssertion, ProbeKind,
    ProbeResult,
};

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub credentials: Credentials,
    pub request_timeout: Duration,
    pub login_timeout: Duration,
    pub endpoints: Vec<EndpointProbe>,
    pub db_probes: Vec<DbProbe>,
    pub assertions: Vec<LogicAssertion>,
}

impl ProbeConfig {
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            db_probes: battery::db_probes(&credentials.email),
            credentials,
            request_timeout: Duration::from_secs(10),
            login_timeout: Duration::from_secs(5),
            endpoints: battery::endpoints(),
            assertions: battery::assertions(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self::with_credentials(Credentials::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub failures: Vec<ProbeResult>,
    pub details: Vec<ProbeResult>,
    pub duration_ms: u64,
}

impl TestReport {
    pub fn record(&mut self, result: ProbeResult) {
        self.total += 1;
        if result.success {
            self.passed += 1;
        } else {
            self.failed += 1;
            self.failures.push(result.clone());
        }
        self.details.push(result);
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

pub struct ProbeRunner {
    client: Arc<dyn ApiClient>,
    db: Arc<dyn QueryExecutor>,
    config: ProbeConfig,
}

impl ProbeRunner {
    pub fn new(client: Arc<dyn ApiClient>, db: Arc<dyn QueryExecutor>, config: ProbeConfig) -> Self {
        Self { client, db, config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Run endpoints, then database probes, then logic assertions.
    pub async fn run_all(&self) -> TestReport {
        let start = Instant::now();
        let mut report = TestReport::default();

        let token = login(
            self.client.as_ref(),
            &self.config.credentials,
            self.config.login_timeout,
        )
        .await;

        for probe in &self.config.endpoints {
            let result = probe_endpoint(
                self.client.as_ref(),
                probe,
                token.as_deref(),
                self.config.request_timeout,
            )
            .await;
            report.record(result);
        }

        for probe in &self.config.db_probes {
            let started = Instant::now();
            let outcome = probe.evaluate(self.db.as_ref()).await;
            report.record(ProbeResult::check(
                ProbeKind::Database,
                probe.name.clone(),
                outcome,
                started.elapsed().as_millis() as u64,
            ));
        }

        for assertion in &self.config.assertions {
            let outcome = if (assertion.check)() {
                Ok(())
            } else {
                Err("assertion failed".to_string())
            };
            report.record(ProbeResult::check(ProbeKind::BusinessLogic, assertion.name, outcome, 0));
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        if report.all_passed() {
            info!(passed = report.passed, total = report.total, "probe battery passed");
        } else {
            warn!(
                passed = report.passed,
                failed = report.failed,
                total = report.total,
                "probe battery has failures"
            );
            for failure in &report.failures {
                warn!(probe = %failure.name, error = failure.error.as_deref().unwrap_or(""), "probe failed");
            }
        }
        report
    }
}
