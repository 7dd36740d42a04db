//! Probe definitions and the shared request/login helpers.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use erpbot_infra::db::{QueryExecutor, SqlValue};
use erpbot_infra::http::{ApiClient, ApiRequest, HttpError, HttpMethod};

/// Login used by probes that need an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            email: "admin@bi-company.com".to_string(),
            password: "Admin@123".to_string(),
        }
    }
}

pub const LOGIN_PATH: &str = "/api/auth/login";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointProbe {
    pub name: String,
    pub method: HttpMethod,
    pub path: String,
    pub requires_auth: bool,
}

impl EndpointProbe {
    pub fn get(name: impl Into<String>, path: impl Into<String>, requires_auth: bool) -> Self {
        Self {
            name: name.into(),
            method: HttpMethod::Get,
            path: path.into(),
            requires_auth,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DbExpectation {
    /// `get` returns a row.
    RowPresent,
    /// `all` succeeds, whatever it returns.
    Executes,
    /// `all` returns at least this many rows.
    MinRows(usize),
    /// `run` succeeds.
    Writes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DbProbe {
    pub name: String,
    pub sql: String,
    pub args: Vec<SqlValue>,
    pub expectation: DbExpectation,
}

impl DbProbe {
    pub fn new(name: impl Into<String>, sql: impl Into<String>, expectation: DbExpectation) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
            args: Vec::new(),
            expectation,
        }
    }

    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Evaluate against the database. `Err` carries the failure message.
    pub async fn evaluate(&self, db: &dyn QueryExecutor) -> Result<(), String> {
        let outcome = match self.expectation {
            DbExpectation::RowPresent => db
                .get(&self.sql, &self.args)
                .await
                .map(|row| row.is_some()),
            DbExpectation::Executes => db.all(&self.sql, &self.args).await.map(|_| true),
            DbExpectation::MinRows(n) => db
                .all(&self.sql, &self.args)
                .await
                .map(|rows| rows.len() >= n),
            DbExpectation::Writes => db.run(&self.sql, &self.args).await.map(|_| true),
        };
        match outcome {
            Ok(true) => Ok(()),
            Ok(false) => Err("assertion failed".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// A pure in-process check.
#[derive(Debug, Clone)]
pub struct LogicAssertion {
    pub name: &'static str,
    pub check: fn() -> bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    Endpoint,
    Database,
    BusinessLogic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub name: String,
    pub kind: ProbeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    /// Result of a database or logic check.
    pub fn check(kind: ProbeKind, name: impl Into<String>, outcome: Result<(), String>, duration_ms: u64) -> Self {
        let (success, error) = match outcome {
            Ok(()) => (true, None),
            Err(e) => (false, Some(e)),
        };
        Self {
            name: name.into(),
            kind,
            endpoint: None,
            method: None,
            success,
            status_code: None,
            duration_ms,
            error,
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Issue one endpoint probe. Never fails: timeouts and connection errors become
/// a failed result.
pub async fn probe_endpoint(
    client: &dyn ApiClient,
    probe: &EndpointProbe,
    token: Option<&str>,
    timeout: Duration,
) -> ProbeResult {
    let mut request = ApiRequest::new(probe.method, probe.path.clone()).with_timeout(timeout);
    if probe.requires_auth {
        request = request.with_bearer(token);
    }

    let start = Instant::now();
    let outcome = send_bounded(client, request).await;
    let duration_ms = elapsed_ms(start);

    let (success, status_code, error) = match outcome {
        Ok(resp) if resp.is_success() => (true, Some(resp.status), None),
        Ok(resp) => (false, Some(resp.status), Some(format!("HTTP {}", resp.status))),
        Err(e) => (false, None, Some(e.to_string())),
    };
    debug!(probe = %probe.name, path = %probe.path, success, duration_ms, "endpoint probed");

    ProbeResult {
        name: probe.name.clone(),
        kind: ProbeKind::Endpoint,
        endpoint: Some(probe.path.clone()),
        method: Some(probe.method),
        success,
        status_code,
        duration_ms,
        error,
    }
}

/// Send with the request's own timeout enforced here too, so a client that
/// ignores it still fails closed.
pub async fn send_bounded(
    client: &dyn ApiClient,
    request: ApiRequest,
) -> Result<erpbot_infra::http::ApiResponse, HttpError> {
    let timeout = request.timeout;
    match tokio::time::timeout(timeout, client.request(request)).await {
        Ok(result) => result,
        Err(_) => Err(HttpError::Timeout {
            after_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Obtain a bearer token; `None` on any failure.
pub async fn login(client: &dyn ApiClient, credentials: &Credentials, timeout: Duration) -> Option<String> {
    let request = ApiRequest::post(
        LOGIN_PATH,
        json!({ "email": credentials.email, "password": credentials.password }),
    )
    .with_timeout(timeout);

    match send_bounded(client, request).await {
        Ok(resp) if resp.is_success() => {
            let token = resp.field_str("token").map(str::to_string);
            if token.is_none() {
                warn!("login succeeded without a token");
            }
            token
        }
        Ok(resp) => {
            warn!(status = resp.status, "login rejected");
            None
        }
        Err(e) => {
            warn!(error = %e, "login failed");
            None
        }
    }
}
