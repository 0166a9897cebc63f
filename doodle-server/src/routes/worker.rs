use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::{AppError, AppResult};
use crate::records::VideoStatus;
use crate::state::AppState;

/// Response of a successful `POST /worker/process`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    /// Always `true`.
    pub success: bool,
    /// Processed record.
    pub video_id: String,
    /// Stored cover.
    pub cover_url: String,
    /// Stored composed video.
    pub processed_url: String,
    /// Wall time of the job.
    pub processing_time_ms: u64,
}

/// Find the job id in a worker request body.
///
/// Accepts `videoId`, `video_id` or `id`, at the top level or inside a `body` envelope.
pub fn recover_video_id(raw: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(raw).ok()?;
    let find = |v: &Value| {
        ["videoId", "video_id", "id"]
            .iter()
            .find_map(|k| v.get(*k).and_then(Value::as_str))
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string)
    };
    find(&value).or_else(|| value.get("body").and_then(find))
}

/// `POST /worker/process`
///
/// Runs the pipeline for one record. Any failure, including a panic in the pipeline, marks
/// the record `failed`.
pub async fn process(State(state): State<AppState>, body: Bytes) -> AppResult<Response> {
    let video_id = recover_video_id(&body)
        .ok_or_else(|| AppError::BadRequest("request does not name a video".into()))?;
    let mut record = state
        .videos
        .get(&video_id)
        .await?
        .ok_or_else(|| AppError::video_not_found(&video_id))?;

    let started = Instant::now();
    let processor = state.processor.clone();
    let job = record.clone();
    let outcome = match tokio::spawn(async move { processor.process(&job).await }).await {
        Ok(result) => result,
        Err(join) => Err(anyhow::anyhow!("processing task aborted: {join}")),
    };
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    record.processing_time_ms = Some(elapsed_ms);

    match outcome {
        Ok(outcome) => {
            record.cover_url = Some(outcome.cover_url.clone());
            record.processed_url = Some(outcome.processed_url.clone());
            record.aspect_ratio = outcome.aspect_ratio;
            record.metadata = Some(outcome.metadata);
            record.transition(VideoStatus::Completed);
            state.videos.save(&record).await?;
            tracing::info!(%video_id, elapsed_ms, "video processed");
            Ok(Json(ProcessResponse {
                success: true,
                video_id,
                cover_url: outcome.cover_url,
                processed_url: outcome.processed_url,
                processing_time_ms: elapsed_ms,
            })
            .into_response())
        }
        Err(e) => {
            tracing::error!(%video_id, elapsed_ms, error = %format!("{e:#}"), "video processing failed");
            record.transition(VideoStatus::Failed);
            if let Err(save_err) = state.videos.save(&record).await {
                tracing::error!(%video_id, error = %save_err, "could not mark video failed");
            }
            let body = json!({
                "success": false,
                "videoId": video_id,
                "error": format!("{e:#}"),
            });
            Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response())
        }
    }
}

/// Worker endpoint.
pub fn router() -> Router<AppState> {
    Router::new().route("/worker/process", post(process))
}
