use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use doodle::DoodleError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`DoodleError`] for pipeline failures and adds HTTP-specific variants. Implements
/// [`IntoResponse`] to produce `{ "error": .., "code": .. }` bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A failure from the media pipeline or the stylization client.
    #[error(transparent)]
    Doodle(#[from] DoodleError),

    /// No record with this id.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of thing looked up.
        entity: &'static str,
        /// Requested id.
        id: String,
    },

    /// A bad request with a human-readable message.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The daily stylization allowance is used up.
    #[error("daily limit of {limit} stylizations reached")]
    RateLimited {
        /// Configured ceiling.
        limit: u64,
    },

    /// A required collaborator is not configured.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Storage, dispatch or other collaborator failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Shorthand for [`AppError::NotFound`] on a video record.
    pub fn video_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "video",
            id: id.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Doodle(err) => classify_doodle_error(err),
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                self.to_string(),
            ),
            AppError::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                msg.clone(),
            ),
            AppError::Internal(err) => {
                tracing::error!(error = %format!("{err:#}"), "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Map a pipeline error to status, stable code and user-facing message.
fn classify_doodle_error(err: &DoodleError) -> (StatusCode, &'static str, String) {
    let status = match err {
        DoodleError::Validation(_) => StatusCode::BAD_REQUEST,
        DoodleError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        DoodleError::Provider(_) => StatusCode::BAD_GATEWAY,
        DoodleError::LoadTimeout(_) | DoodleError::PollTimeoutExceeded { .. } => {
            StatusCode::GATEWAY_TIMEOUT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR || status == StatusCode::BAD_GATEWAY {
        tracing::error!(error = %err, code = err.kind(), "request failed");
    }
    let message = match err {
        // Validation messages describe the caller's own input.
        DoodleError::Validation(msg) => msg.clone(),
        other => other.user_message().to_string(),
    };
    (status, err.kind(), message)
}
