//! Category-bucketed feature coverage run with an overall letter grade.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use erpbot_infra::db::{column_i64, column_str, QueryExecutor};
use erpbot_infra::http::{ApiClient, ApiRequest};

use crate::battery;
use crate::grade::{pass_rate, Grade};
use crate::probe::{login, probe_endpoint, send_bounded, Credentials, EndpointProbe};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Database,
    Auth,
    Permissions,
    Api,
    BusinessLogic,
    Integrations,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryReport {
    pub passed: usize,
    pub failed: usize,
    pub checks: Vec<CheckResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
    pub grade: Grade,
    pub categories: BTreeMap<Category, CategoryReport>,
}

#[derive(Debug, Clone)]
pub struct CoverageConfig {
    pub credentials: Credentials,
    pub request_timeout: Duration,
    pub expected_tables: Vec<String>,
    pub main_tables: Vec<String>,
    pub endpoints: Vec<EndpointProbe>,
    /// ERP schema file whose presence is checked.
    pub schema_file: PathBuf,
    /// ERP seeds directory whose presence is checked.
    pub seeds_dir: PathBuf,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            request_timeout: Duration::from_secs(10),
            expected_tables: battery::EXPECTED_TABLES.iter().map(|t| t.to_string()).collect(),
            main_tables: battery::MAIN_TABLES.iter().map(|t| t.to_string()).collect(),
            endpoints: battery::coverage_endpoints(),
            schema_file: PathBuf::from("database/schema.sql"),
            seeds_dir: PathBuf::from("database/seeds"),
        }
    }
}

/// Accumulates checks while a run is in progress.
#[derive(Debug, Default)]
struct Tally {
    categories: BTreeMap<Category, CategoryReport>,
}

impl Tally {
    fn add(&mut self, category: Category, name: impl Into<String>, passed: bool, error: Option<String>) {
        let bucket = self.categories.entry(category).or_default();
        if passed {
            bucket.passed += 1;
        } else {
            bucket.failed += 1;
        }
        bucket.checks.push(CheckResult {
            name: name.into(),
            passed,
            error,
        });
    }

    fn finish(self, started_at: DateTime<Utc>) -> CoverageReport {
        let passed: usize = self.categories.values().map(|c| c.passed).sum();
        let failed: usize = self.categories.values().map(|c| c.failed).sum();
        let total = passed + failed;
        let rate = pass_rate(passed, total);
        CoverageReport {
            started_at,
            finished_at: Utc::now(),
            total,
            passed,
            failed,
            pass_rate: rate,
            grade: Grade::from_pass_rate(rate),
            categories: self.categories,
        }
    }
}

/// Table names are interpolated into `COUNT(*)` queries, so only plain
/// identifiers are accepted.
fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
        && !name.as_bytes()[0].is_ascii_digit()
}

pub struct FeatureCoverageRunner {
    client: Arc<dyn ApiClient>,
    db: Arc<dyn QueryExecutor>,
    config: CoverageConfig,
}

impl FeatureCoverageRunner {
    pub fn new(client: Arc<dyn ApiClient>, db: Arc<dyn QueryExecutor>, config: CoverageConfig) -> Self {
        Self { client, db, config }
    }

    #[instrument(skip(self))]
    pub async fn run(&self) -> CoverageReport {
        let started_at = Utc::now();
        let mut tally = Tally::default();

        let token = login(
            self.client.as_ref(),
            &self.config.credentials,
            self.config.request_timeout,
        )
        .await;
        tally.add(
            Category::Auth,
            "login",
            token.is_some(),
            token.is_none().then(|| "no token issued".to_string()),
        );

        self.check_database(&mut tally).await;
        self.check_permissions(&mut tally).await;
        self.check_api(&mut tally, token.as_deref()).await;
        self.check_business_logic(&mut tally, token.as_deref()).await;
        self.check_integrations(&mut tally).await;

        let report = tally.finish(started_at);
        info!(
            total = report.total,
            passed = report.passed,
            pass_rate = report.pass_rate,
            grade = %report.grade,
            "feature coverage finished"
        );
        report
    }

    async fn check_database(&self, tally: &mut Tally) {
        let tables = self
            .db
            .all(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_type = 'BASE TABLE'",
                &[],
            )
            .await;
        let names: Vec<String> = match tables {
            Ok(rows) => rows
                .iter()
                .filter_map(|r| column_str(r, "table_name").map(str::to_string))
                .collect(),
            Err(e) => {
                tally.add(Category::Database, "list tables", false, Some(e.to_string()));
                return;
            }
        };
        tally.add(Category::Database, format!("total tables: {}", names.len()), true, None);

        for table in &self.config.expected_tables {
            let exists = names.iter().any(|n| n == table);
            tally.add(
                Category::Database,
                format!("table {table}"),
                exists,
                (!exists).then(|| "table missing".to_string()),
            );
        }

        for table in &self.config.main_tables {
            if !is_identifier(table) {
                tally.add(Category::Database, format!("rows in {table}"), false, Some("invalid table name".into()));
                continue;
            }
            let sql = format!("SELECT COUNT(*) AS count FROM {table}");
            match self.db.get(&sql, &[]).await {
                Ok(row) => {
                    let count = row.as_ref().and_then(|r| column_i64(r, "count")).unwrap_or(0);
                    tally.add(Category::Database, format!("rows in {table}: {count}"), true, None);
                }
                Err(e) => tally.add(Category::Database, format!("read {table}"), false, Some(e.to_string())),
            }
        }
    }

    async fn check_permissions(&self, tally: &mut Tally) {
        let permissions = match self.db.all("SELECT id FROM permissions LIMIT 100", &[]).await {
            Ok(rows) => rows,
            Err(e) => {
                tally.add(Category::Permissions, "permission system", false, Some(e.to_string()));
                return;
            }
        };
        tally.add(
            Category::Permissions,
            format!("permissions defined: {}", permissions.len()),
            !permissions.is_empty(),
            permissions.is_empty().then(|| "no permissions defined".to_string()),
        );

        for (label, sql) in [
            ("roles", "SELECT id FROM roles"),
            ("role permissions", "SELECT role_id FROM role_permissions LIMIT 100"),
        ] {
            match self.db.all(sql, &[]).await {
                Ok(rows) => tally.add(Category::Permissions, format!("{label}: {}", rows.len()), true, None),
                Err(e) => tally.add(Category::Permissions, label, false, Some(e.to_string())),
            }
        }
    }

    async fn check_api(&self, tally: &mut Tally, token: Option<&str>) {
        for probe in &self.config.endpoints {
            let result = probe_endpoint(self.client.as_ref(), probe, token, self.config.request_timeout).await;
            tally.add(
                Category::Api,
                format!("{} ({})", probe.name, probe.path),
                result.success,
                result.error,
            );
        }
    }

    async fn check_business_logic(&self, tally: &mut Tally, token: Option<&str>) {
        let stamp = Utc::now().timestamp_millis();
        let timeout = self.config.request_timeout;

        let created = send_bounded(
            self.client.as_ref(),
            ApiRequest::post(
                "/api/customers",
                json!({
                    "code": format!("TEST-{stamp}"),
                    "name": "Coverage test customer",
                    "type": "retail",
                    "phone": "0771234567"
                }),
            )
            .with_bearer(token)
            .with_timeout(timeout),
        )
        .await;
        let customer_id = match &created {
            Ok(resp) if resp.is_success() => {
                tally.add(Category::BusinessLogic, "create customer", true, None);
                resp.field_str("id").map(str::to_string)
            }
            Ok(resp) => {
                tally.add(Category::BusinessLogic, "create customer", false, Some(format!("HTTP {}", resp.status)));
                None
            }
            Err(e) => {
                tally.add(Category::BusinessLogic, "create customer", false, Some(e.to_string()));
                None
            }
        };

        match &customer_id {
            Some(id) => {
                let fetched = send_bounded(
                    self.client.as_ref(),
                    ApiRequest::get(format!("/api/customers/{id}"))
                        .with_bearer(token)
                        .with_timeout(timeout),
                )
                .await;
                let ok = matches!(&fetched, Ok(r) if r.is_success());
                tally.add(
                    Category::BusinessLogic,
                    "verify created customer",
                    ok,
                    (!ok).then(|| "created customer not readable".to_string()),
                );
            }
            None => tally.add(
                Category::BusinessLogic,
                "verify created customer",
                false,
                Some("no customer id returned".into()),
            ),
        }

        let invoice = json!({
            "type": "sale",
            "customer_id": customer_id.clone().unwrap_or_default(),
            "items": [{ "product_id": "test", "quantity": 1, "price": 1000 }],
            "total": 1000
        });
        let task = json!({
            "title": "Coverage test task",
            "description": "automated check",
            "priority": "medium"
        });
        for (label, path, body) in [
            ("create invoice", "/api/invoices", invoice),
            ("create task", "/api/tasks", task),
        ] {
            let result = send_bounded(
                self.client.as_ref(),
                ApiRequest::post(path, body).with_bearer(token).with_timeout(timeout),
            )
            .await;
            match result {
                Ok(r) if r.is_success() => tally.add(Category::BusinessLogic, label, true, None),
                Ok(r) => tally.add(Category::BusinessLogic, label, false, Some(format!("HTTP {}", r.status))),
                Err(e) => tally.add(Category::BusinessLogic, label, false, Some(e.to_string())),
            }
        }
    }

    async fn check_integrations(&self, tally: &mut Tally) {
        for (label, path) in [
            ("schema file present", &self.config.schema_file),
            ("seeds directory present", &self.config.seeds_dir),
        ] {
            let exists = tokio::fs::try_exists(path).await.unwrap_or(false);
            tally.add(
                Category::Integrations,
                label,
                exists,
                (!exists).then(|| format!("{} not found", path.display())),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::LOGIN_PATH;
    use erpbot_infra::db::{DbError, Row, ScriptedQueryExecutor};
    use erpbot_infra::http::{ApiResponse, HttpMethod, StaticApiClient};

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap_or_default()
    }

    fn config(dir: &std::path::Path) -> CoverageConfig {
        CoverageConfig {
            expected_tables: vec!["users".into(), "products".into()],
            main_tables: vec!["users".into()],
            endpoints: vec![EndpointProbe::get("Health Check", "/api/health", false)],
            schema_file: dir.join("schema.sql"),
            seeds_dir: dir.to_path_buf(),
            ..CoverageConfig::default()
        }
    }

    #[tokio::test]
    async fn buckets_checks_and_grades_the_run() {
        let client = Arc::new(StaticApiClient::always_ok());
        client.route(HttpMethod::Post, LOGIN_PATH, Ok(ApiResponse::ok(json!({"data": {"token": "t"}}))));
        client.route(HttpMethod::Post, "/api/customers", Ok(ApiResponse::new(201, json!({"data": {"id": "c1"}}))));

        let db = Arc::new(ScriptedQueryExecutor::new());
        db.rows("information_schema.tables", vec![row(json!({"table_name": "users"}))]);
        db.rows("COUNT(*)", vec![row(json!({"count": 3}))]);
        db.rows("FROM permissions", vec![row(json!({"id": 1}))]);

        let dir = std::env::temp_dir();
        let runner = FeatureCoverageRunner::new(client.clone(), db, config(&dir));
        let report = runner.run().await;

        // products table and schema file are missing; everything else passes.
        assert_eq!(report.failed, 2);
        assert_eq!(report.categories[&Category::Database].failed, 1);
        assert_eq!(report.categories[&Category::Integrations].failed, 1);
        assert_eq!(report.categories[&Category::BusinessLogic].failed, 0);
        assert_eq!(report.total, report.passed + report.failed);
        assert_eq!(report.grade, Grade::from_pass_rate(report.pass_rate));
        assert_eq!(client.call_count(HttpMethod::Get, "/api/customers/c1"), 1);
    }

    #[tokio::test]
    async fn unreachable_system_grades_f_without_panicking() {
        let client = Arc::new(StaticApiClient::new());
        client.fallback(Err(erpbot_infra::http::HttpError::Connection("refused".into())));
        let db = Arc::new(ScriptedQueryExecutor::new());
        db.fail("", DbError::Connection("down".into()));

        let dir = std::env::temp_dir().join("erpbot-coverage-missing");
        let runner = FeatureCoverageRunner::new(client, db, config(&dir));
        let report = runner.run().await;

        assert_eq!(report.passed, 0);
        assert_eq!(report.grade, Grade::F);
        assert!(!report.categories[&Category::Auth].checks[0].passed);
    }

    #[tokio::test]
    async fn test_customer_code_carries_a_millisecond_stamp() {
        let client = Arc::new(StaticApiClient::always_ok());
        let db = Arc::new(ScriptedQueryExecutor::new());
        let before = Utc::now().timestamp_millis();
        FeatureCoverageRunner::new(client.clone(), db, config(&std::env::temp_dir()))
            .run()
            .await;
        let after = Utc::now().timestamp_millis();

        let created = client
            .calls()
            .into_iter()
            .find(|c| c.method == HttpMethod::Post && c.path == "/api/customers")
            .and_then(|c| c.body)
            .unwrap();
        let code = created["code"].as_str().unwrap();
        let stamp: i64 = code.strip_prefix("TEST-").unwrap().parse().unwrap();
        assert!((before..=after).contains(&stamp));
    }

    #[test]
    fn only_plain_identifiers_are_counted() {
        assert!(is_identifier("invoice_items"));
        assert!(!is_identifier("users; DROP TABLE users"));
        assert!(!is_identifier("1users"));
        assert!(!is_identifier(""));
    }
}
