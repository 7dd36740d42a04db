//! Run a cycle now, outside its schedule.

use axum::{extract::Extension, Json};

use erpbot_agent::Bot;
use erpbot_simulation::BulkCounts;

use crate::app::{dto, errors};

pub async fn test(Extension(bot): Extension<Bot>) -> axum::response::Response {
    match bot.run_tests_now().await {
        Ok(report) => dto::ok(report),
        Err(e) => errors::bot_error_to_response(e),
    }
}

pub async fn test_features(Extension(bot): Extension<Bot>) -> axum::response::Response {
    match bot.run_feature_tests().await {
        Ok(report) => dto::ok(report),
        Err(e) => errors::bot_error_to_response(e),
    }
}

pub async fn heal(Extension(bot): Extension<Bot>) -> axum::response::Response {
    match bot.heal_now().await {
        Ok(report) => dto::ok(report),
        Err(e) => errors::bot_error_to_response(e),
    }
}

pub async fn generate(Extension(bot): Extension<Bot>) -> axum::response::Response {
    match bot.generate_now().await {
        Ok(report) => dto::ok(report),
        Err(e) => errors::bot_error_to_response(e),
    }
}

/// POST /bot/generate/bulk `{customers, products, invoices, tasks}`; missing
/// fields are zero.
pub async fn generate_bulk(
    Extension(bot): Extension<Bot>,
    body: Option<Json<BulkCounts>>,
) -> axum::response::Response {
    let counts = body.map(|Json(c)| c).unwrap_or_default();
    match bot.generate_bulk(counts).await {
        Ok(report) => dto::ok(report),
        Err(e) => errors::bot_error_to_response(e),
    }
}

pub async fn analyze(Extension(bot): Extension<Bot>) -> axum::response::Response {
    match bot.analyze_now().await {
        Ok(suggestions) => dto::ok(suggestions),
        Err(e) => errors::bot_error_to_response(e),
    }
}
