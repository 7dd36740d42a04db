use axum::{
    routing::{get, post},
    Router,
};

pub mod cycles;
pub mod events;
pub mod lifecycle;
pub mod performance;
pub mod simulation;
pub mod suggestions;
pub mod system;

/// Everything under `/bot`.
pub fn router() -> Router {
    Router::new()
        .route("/status", get(lifecycle::status))
        .route("/stats", get(lifecycle::stats))
        .route("/start", post(lifecycle::start))
        .route("/stop", post(lifecycle::stop))
        .route("/pause", post(lifecycle::pause))
        .route("/resume", post(lifecycle::resume))
        .route("/errors", get(suggestions::errors))
        .route("/suggestions", get(suggestions::list))
        .route("/suggestions/:id/apply", post(suggestions::apply))
        .route("/performance", get(performance::overview))
        .route("/test", post(cycles::test))
        .route("/test-features", post(cycles::test_features))
        .route("/heal", post(cycles::heal))
        .route("/generate", post(cycles::generate))
        .route("/generate/bulk", post(cycles::generate_bulk))
        .route("/analyze", post(cycles::analyze))
        .merge(simulation::router())
        .route("/events", get(events::stream))
}
