use axum::extract::Extension;

use erpbot_agent::Bot;

use crate::app::dto;

/// GET /bot/status
///
/// `{name, version, running, paused, started_at, stats, error_count, suggestion_count}`.
pub async fn status(Extension(bot): Extension<Bot>) -> axum::response::Response {
    dto::ok(bot.status())
}

pub async fn stats(Extension(bot): Extension<Bot>) -> axum::response::Response {
    dto::ok(bot.stats())
}

pub async fn start(Extension(bot): Extension<Bot>) -> axum::response::Response {
    let changed = bot.start().await;
    dto::transition(changed, "Bot started", "Bot is already running")
}

pub async fn stop(Extension(bot): Extension<Bot>) -> axum::response::Response {
    let changed = bot.stop().await;
    dto::transition(changed, "Bot stopped", "Bot is not running")
}

pub async fn pause(Extension(bot): Extension<Bot>) -> axum::response::Response {
    dto::transition(bot.pause(), "Bot paused", "Bot is not running or already paused")
}

pub async fn resume(Extension(bot): Extension<Bot>) -> axum::response::Response {
    dto::transition(bot.resume(), "Bot resumed", "Bot is not paused")
}
