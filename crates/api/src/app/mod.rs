//! Axum wiring for the control API.
//!
//! - `routes/`: handlers, one file per area
//! - `dto.rs`: query/body types and the `{success, data}` envelope
//! - `errors.rs`: consistent error responses

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use erpbot_agent::Bot;

pub mod dto;
pub mod errors;
pub mod routes;

/// Build the full router around a (started or stopped) bot.
pub fn build_app(bot: Bot) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/bot", routes::router())
        .layer(ServiceBuilder::new().layer(Extension(bot)))
}
