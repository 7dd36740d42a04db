//! Request/response contract for the live ERP API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

mod reqwest_client;
mod static_client;

pub use reqwest_client::ReqwestApiClient;
pub use static_client::StaticApiClient;

/// Timeout applied when a request does not set its own.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Header stamped on every request the agent sends, so the ERP can tell
/// synthetic traffic from real users.
pub const BOT_HEADER: &str = "X-Bot-Request";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path relative to the API base, e.g. `/api/products`.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<JsonValue>,
    pub timeout: Duration,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>, body: JsonValue) -> Self {
        Self::new(HttpMethod::Post, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: JsonValue) -> Self {
        Self::new(HttpMethod::Put, path).with_body(body)
    }

    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add `Authorization: Bearer <token>` when a token is present.
    pub fn with_bearer(self, token: Option<&str>) -> Self {
        match token {
            Some(t) => self.with_header("Authorization", format!("Bearer {t}")),
            None => self,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Path without its query string.
    pub fn route(&self) -> &str {
        self.path.split('?').next().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: JsonValue,
}

impl ApiResponse {
    pub fn new(status: u16, body: JsonValue) -> Self {
        Self { status, body }
    }

    pub fn ok(body: JsonValue) -> Self {
        Self::new(200, body)
    }

    /// Statuses in `[200, 400)` count as success.
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }

    /// String field from the top level of the body, or from a `data` envelope.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.body
            .get(key)
            .or_else(|| self.body.get("data").and_then(|d| d.get(key)))
            .and_then(JsonValue::as_str)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[error("request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("http error: {0}")]
    Other(String),
}

#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse, HttpError>;
}

#[async_trait]
impl<C> ApiClient for Arc<C>
where
    C: ApiClient + ?Sized,
{
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse, HttpError> {
        (**self).request(request).await
    }
}
