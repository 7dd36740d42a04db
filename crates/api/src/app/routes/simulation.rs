use axum::{
    extract::{Extension, Query},
    routing::{get, post},
    Json, Router,
};

use erpbot_agent::{Bot, DEFAULT_SESSION_SCENARIOS};

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/simulate", post(simulate))
        .route("/simulate/scenario", post(scenario))
        .route("/simulate/log", get(log))
}

/// POST /bot/simulate `{scenarios}`; one session, clamped to 1..=20.
pub async fn simulate(
    Extension(bot): Extension<Bot>,
    body: Option<Json<dto::SimulateRequest>>,
) -> axum::response::Response {
    let scenarios = body
        .and_then(|Json(b)| b.scenarios)
        .unwrap_or(DEFAULT_SESSION_SCENARIOS);
    match bot.simulate_now(scenarios).await {
        Ok(report) => dto::ok(report),
        Err(e) => errors::bot_error_to_response(e),
    }
}

/// POST /bot/simulate/scenario `{scenario}`; random when omitted.
pub async fn scenario(
    Extension(bot): Extension<Bot>,
    body: Option<Json<dto::ScenarioRequest>>,
) -> axum::response::Response {
    let scenario = body.and_then(|Json(b)| b.scenario);
    match bot.simulate_scenario_now(scenario).await {
        Ok(outcome) => dto::ok(outcome),
        Err(e) => errors::bot_error_to_response(e),
    }
}

pub async fn log(
    Extension(bot): Extension<Bot>,
    Query(query): Query<dto::LimitQuery>,
) -> axum::response::Response {
    dto::ok(bot.simulation_log(query.limit.unwrap_or(dto::DEFAULT_LOG_LIMIT)))
}
