use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use erpbot_agent::BotError;

pub fn bot_error_to_response(err: BotError) -> axum::response::Response {
    match err {
        BotError::SuggestionNotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        BotError::SuggestionNotPending { .. } => {
            json_error(StatusCode::CONFLICT, "not_pending", err.to_string())
        }
        BotError::Config(_) => json_error(StatusCode::BAD_REQUEST, "invalid_config", err.to_string()),
        BotError::Panicked { .. } => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "cycle_panicked", err.to_string())
        }
        BotError::Heal(_) | BotError::Ux(_) | BotError::Store(_) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "cycle_failed", err.to_string())
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
