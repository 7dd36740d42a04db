use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use erpbot_core::records::SuggestionStatus;
use erpbot_simulation::Scenario;

pub const DEFAULT_ERROR_LIMIT: usize = 50;
pub const DEFAULT_LOG_LIMIT: usize = 50;
pub const PERFORMANCE_HISTORY: usize = 20;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuggestionsQuery {
    pub status: Option<SuggestionStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SimulateRequest {
    pub scenarios: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ScenarioRequest {
    pub scenario: Option<Scenario>,
}

// -------------------------
// Response helpers
// -------------------------

/// `200 {success: true, data}`.
pub fn ok<T: Serialize>(data: T) -> axum::response::Response {
    (StatusCode::OK, Json(json!({ "success": true, "data": data }))).into_response()
}

/// `200 {success, message}` for lifecycle transitions.
pub fn transition(changed: bool, done: &str, unchanged: &str) -> axum::response::Response {
    let message = if changed { done } else { unchanged };
    (
        StatusCode::OK,
        Json(json!({ "success": changed, "message": message })),
    )
        .into_response()
}
