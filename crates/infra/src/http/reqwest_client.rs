use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::{debug, instrument};

use super::{ApiClient, ApiRequest, ApiResponse, BOT_HEADER, HttpError, HttpMethod};

/// [`ApiClient`] over `reqwest`, rooted at the ERP base URL.
#[derive(Debug, Clone)]
pub struct ReqwestApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, HttpError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(HttpError::InvalidUrl(base_url));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| HttpError::Other(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

fn map_reqwest_error(err: reqwest::Error, timeout_ms: u64) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout {
            after_ms: timeout_ms,
        }
    } else if err.is_connect() {
        HttpError::Connection(err.to_string())
    } else if err.is_builder() {
        HttpError::InvalidUrl(err.to_string())
    } else {
        HttpError::Other(err.to_string())
    }
}

#[async_trait]
impl ApiClient for ReqwestApiClient {
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path), err)]
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse, HttpError> {
        let timeout_ms = request.timeout.as_millis() as u64;
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, self.url(&request.path))
            .timeout(request.timeout)
            .header(BOT_HEADER, "true");
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout_ms))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(e, timeout_ms))?;

        let body = if text.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_str(&text).unwrap_or(JsonValue::String(text))
        };
        debug!(status, "api response");
        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_paths_onto_the_base() {
        let client = ReqwestApiClient::new("http://localhost:3000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000");
        assert_eq!(client.url("/api/health"), "http://localhost:3000/api/health");
        assert_eq!(client.url("api/health"), "http://localhost:3000/api/health");
    }

    #[test]
    fn rejects_non_http_bases() {
        assert!(matches!(
            ReqwestApiClient::new("localhost:3000"),
            Err(HttpError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn refused_connections_are_errors_not_panics() {
        // Port 9 (discard) is closed on loopback in CI containers.
        let client = ReqwestApiClient::new("http://127.0.0.1:9").unwrap();
        let result = client
            .request(ApiRequest::get("/api/health").with_timeout(std::time::Duration::from_millis(500)))
            .await;
        assert!(result.is_err());
    }
}
