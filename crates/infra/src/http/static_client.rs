//! In-memory [`ApiClient`] with routed canned responses (for tests/dev).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::json;

use super::{ApiClient, ApiRequest, ApiResponse, HttpError, HttpMethod};

#[derive(Debug)]
struct Routes {
    routes: HashMap<(HttpMethod, String), Result<ApiResponse, HttpError>>,
    fallback: Result<ApiResponse, HttpError>,
    calls: Vec<ApiRequest>,
}

/// Answers by `(method, path-without-query)`; everything else gets the fallback
/// (404 by default).
#[derive(Debug)]
pub struct StaticApiClient {
    inner: Mutex<Routes>,
}

impl Default for StaticApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticApiClient {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Routes {
                routes: HashMap::new(),
                fallback: Ok(ApiResponse::new(404, json!({"error": "not_found"}))),
                calls: Vec::new(),
            }),
        }
    }

    /// A client that answers every request with `200 {}`.
    pub fn always_ok() -> Self {
        let client = Self::new();
        client.fallback(Ok(ApiResponse::ok(json!({}))));
        client
    }

    pub fn route(
        &self,
        method: HttpMethod,
        path: impl Into<String>,
        response: Result<ApiResponse, HttpError>,
    ) -> &Self {
        self.lock().routes.insert((method, path.into()), response);
        self
    }

    pub fn fallback(&self, response: Result<ApiResponse, HttpError>) -> &Self {
        self.lock().fallback = response;
        self
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, method: HttpMethod, path: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|r| r.method == method && r.route() == path)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, Routes> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ApiClient for StaticApiClient {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse, HttpError> {
        let mut inner = self.lock();
        let key = (request.method, request.route().to_string());
        let response = inner
            .routes
            .get(&key)
            .cloned()
            .unwrap_or_else(|| inner.fallback.clone());
        inner.calls.push(request);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn routes_ignore_query_strings_and_log_calls() {
        let client = StaticApiClient::new();
        client.route(HttpMethod::Get, "/api/products", Ok(ApiResponse::ok(json!([]))));

        let hit = client.request(ApiRequest::get("/api/products?search=hp")).await.unwrap();
        assert_eq!(hit.status, 200);
        let miss = client.request(ApiRequest::get("/api/unknown")).await.unwrap();
        assert_eq!(miss.status, 404);
        assert_eq!(client.call_count(HttpMethod::Get, "/api/products"), 1);
        assert_eq!(client.calls().len(), 2);
    }

    #[tokio::test]
    async fn routes_can_fail() {
        let client = StaticApiClient::new();
        client.route(HttpMethod::Get, "/slow", Err(HttpError::Timeout { after_ms: 10 }));
        assert_eq!(
            client.request(ApiRequest::get("/slow")).await,
            Err(HttpError::Timeout { after_ms: 10 })
        );
    }
}
