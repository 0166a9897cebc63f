//! HTTP route handlers.

use axum::Router;

use crate::state::AppState;

/// Liveness probe.
pub mod health;
/// Frame stylization and the daily allowance.
pub mod stylize;
/// Upload, generate and status streaming.
pub mod videos;
/// Processing worker endpoint.
pub mod worker;

/// All application routes except static file serving.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(videos::router())
        .merge(stylize::router())
        .merge(worker::router())
}
