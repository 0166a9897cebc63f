//! Shared application router builder.
//!
//! Provides [`build_app_router`] so both the binary and the integration tests use the same
//! middleware stack.

use std::time::Duration;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::Response;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::routes;
use crate::state::AppState;

/// Multipart framing on top of the largest accepted file.
const BODY_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Build the full application [`Router`] with all middleware layers.
///
/// The middleware stack is applied bottom-up:
///
/// 1. CORS
/// 2. Structured request/response tracing
/// 3. Panic recovery (catch panics, return 500)
/// 4. Request body limit
pub fn build_app_router(state: AppState) -> Router {
    let config = state.config.clone();
    let body_limit = usize::try_from(config.max_upload_bytes.saturating_add(BODY_OVERHEAD_BYTES))
        .unwrap_or(usize::MAX);

    let files: Router = Router::new()
        .fallback_service(ServeDir::new(&config.storage_dir))
        .layer(middleware::from_fn(attachment_on_download));

    Router::new()
        .merge(routes::api_routes())
        .nest_service("/files", files)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(build_cors_layer(&config))
        .with_state(state)
}

/// Serve stored files as attachments when the URL carries a `download` query parameter.
async fn attachment_on_download(request: Request, next: Next) -> Response {
    let download = request.uri().query().is_some_and(|query| {
        query
            .split('&')
            .any(|pair| pair == "download" || pair.starts_with("download="))
    });
    let file_name = request
        .uri()
        .path()
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();

    let mut response = next.run(request).await;
    if download && response.status().is_success() && !file_name.is_empty() {
        match HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\"")) {
            Ok(value) => {
                response.headers_mut().insert(CONTENT_DISPOSITION, value);
            }
            Err(e) => tracing::warn!(file = %file_name, error = %e, "unusable download file name"),
        }
    }
    response
}

/// Build the CORS middleware layer from server configuration.
///
/// Origins that do not parse as header values are skipped with a warning.
pub fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(origin) => Some(origin),
            Err(e) => {
                tracing::warn!(origin = %o, error = %e, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(3600))
}
