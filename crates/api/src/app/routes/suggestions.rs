use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
};
use uuid::Uuid;

use erpbot_agent::Bot;
use erpbot_core::SuggestionId;

use crate::app::{dto, errors};

/// GET /bot/errors?limit=
pub async fn errors(
    Extension(bot): Extension<Bot>,
    Query(query): Query<dto::LimitQuery>,
) -> axum::response::Response {
    let limit = query.limit.unwrap_or(dto::DEFAULT_ERROR_LIMIT);
    dto::ok(bot.error_history(limit))
}

/// GET /bot/suggestions?status=
pub async fn list(
    Extension(bot): Extension<Bot>,
    Query(query): Query<dto::SuggestionsQuery>,
) -> axum::response::Response {
    dto::ok(bot.suggestions(query.status))
}

/// POST /bot/suggestions/:id/apply
pub async fn apply(Extension(bot): Extension<Bot>, Path(id): Path<String>) -> axum::response::Response {
    let id = match Uuid::parse_str(&id) {
        Ok(uuid) => SuggestionId::from_uuid(uuid),
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid suggestion id"),
    };
    match bot.apply_suggestion(id).await {
        Ok(outcome) => dto::ok(outcome),
        Err(e) => errors::bot_error_to_response(e),
    }
}
