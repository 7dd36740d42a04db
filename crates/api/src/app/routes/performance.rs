use axum::extract::Extension;
use serde_json::json;

use erpbot_agent::Bot;

use crate::app::dto;

/// GET /bot/performance
///
/// Rolling summary, threshold-driven recommendations and the latest samples.
pub async fn overview(Extension(bot): Extension<Bot>) -> axum::response::Response {
    dto::ok(json!({
        "summary": bot.performance_summary(),
        "recommendations": bot.performance_recommendations(),
        "history": bot.performance_history(dto::PERFORMANCE_HISTORY),
    }))
}
