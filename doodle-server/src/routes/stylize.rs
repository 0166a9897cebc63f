use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use doodle::{ImageRef, TaskState, parse_data_url};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::state::{AppState, Stylizer};
use crate::usage::{LimitStatus, day_key, end_of_day};

/// Body of `POST /stylize`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylizeRequest {
    /// Captured frame as a base64 `data:` URL.
    pub frame_data_url: String,
    /// Original file name, used to label the stored frame.
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Response of `POST /stylize`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StylizeResponse {
    /// Provider task id.
    pub request_id: String,
    /// Task state right after submission.
    pub status: TaskState,
    /// Where the submitted frame was stored.
    pub frame_url: String,
    /// Present when the provider finished synchronously.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
}

/// Response of `GET /stylize/{requestId}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusResponse {
    /// Current task state.
    pub status: TaskState,
    /// Stylized image once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    /// Failure detail once failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Provider-reported percentage, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

fn stylizer(state: &AppState) -> AppResult<Arc<Stylizer>> {
    state
        .stylizer
        .clone()
        .ok_or_else(|| AppError::Unavailable("stylization is not configured".into()))
}

/// Today's usage; an unreachable counter reads as zero.
async fn usage_today(state: &AppState) -> LimitStatus {
    let used = match state.usage.get(&day_key(Utc::now())).await {
        Ok(used) => used,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "usage counter unavailable, failing open");
            0
        }
    };
    LimitStatus::new(used, state.config.daily_stylize_limit)
}

/// `POST /stylize`
///
/// Stores the frame, submits it and counts the submission against today's allowance.
pub async fn submit(
    State(state): State<AppState>,
    Json(body): Json<StylizeRequest>,
) -> AppResult<Json<StylizeResponse>> {
    let (mime, bytes) = parse_data_url(&body.frame_data_url)?;
    let stylizer = stylizer(&state)?;
    let usage = usage_today(&state).await;
    if usage.remaining == 0 {
        return Err(AppError::RateLimited { limit: usage.limit });
    }

    let key = format!(
        "frames/{}-{}.{}",
        uuid::Uuid::new_v4(),
        frame_label(body.file_name.as_deref()),
        image_extension(&mime)
    );
    let frame = state.blobs.put(&key, bytes, &mime).await?;

    let task = stylizer.submit(&ImageRef::Url(frame.url.clone())).await?;

    let now = Utc::now();
    let key = day_key(now);
    match state.usage.incr(&key).await {
        Ok(used) => {
            if let Err(e) = state.usage.expire_at(&key, end_of_day(now)).await {
                tracing::warn!(error = %format!("{e:#}"), "could not set usage expiry");
            }
            tracing::info!(request_id = %task.request_id, used, "stylization submitted");
        }
        Err(e) => tracing::warn!(error = %format!("{e:#}"), "could not count stylization"),
    }

    Ok(Json(StylizeResponse {
        request_id: task.request_id,
        status: task.state,
        frame_url: frame.url,
        result_url: task.result_url,
    }))
}

/// `GET /stylize/{requestId}`
pub async fn poll(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> AppResult<Json<TaskStatusResponse>> {
    let task = stylizer(&state)?.poll(&request_id).await?;
    Ok(Json(TaskStatusResponse {
        status: task.state,
        result_url: task.result_url,
        error: task.error_detail,
        progress: task.progress,
    }))
}

/// `GET /limit-status`
pub async fn limit_status(State(state): State<AppState>) -> Json<LimitStatus> {
    Json(usage_today(&state).await)
}

fn frame_label(file_name: Option<&str>) -> String {
    let stem = file_name
        .map(|name| name.rsplit_once('.').map_or(name, |(stem, _)| stem))
        .unwrap_or("frame");
    let label: String = stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .take(64)
        .collect();
    if label.is_empty() {
        "frame".to_string()
    } else {
        label
    }
}

fn image_extension(mime: &str) -> &'static str {
    match mime.to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

/// Stylization and allowance routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stylize", post(submit))
        .route("/stylize/{request_id}", get(poll))
        .route("/limit-status", get(limit_status))
}
