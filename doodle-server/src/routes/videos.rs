use std::convert::Infallible;

use axum::extract::{Multipart, Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use doodle::validate_upload;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

use crate::dispatch::ProcessJob;
use crate::error::{AppError, AppResult};
use crate::notifier::watch_status;
use crate::records::{VideoRecord, VideoStatus};
use crate::state::AppState;
use crate::storage::original_key;

/// Response of `POST /upload`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Public URL of the stored upload.
    pub url: String,
    /// URL that downloads the stored upload.
    pub download_url: String,
    /// Id of the new record.
    pub video_id: String,
}

/// Body of `POST /generate`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Record to process.
    pub video_id: String,
}

/// Response of `POST /generate`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    /// Always `"queued"`.
    pub status: &'static str,
    /// The dispatched record.
    pub video_id: String,
}

/// `POST /upload`
///
/// Reads the multipart field `video`, stores it and creates an `uploaded` record.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let mut video = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("video") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let mime = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        video = Some((file_name, mime, bytes));
        break;
    }

    let Some((file_name, mime, bytes)) = video else {
        return Err(AppError::BadRequest("no video file provided".into()));
    };
    let format = validate_upload(
        &mime,
        &file_name,
        bytes.len() as u64,
        state.config.max_upload_bytes,
    )?;

    let video_id = uuid::Uuid::new_v4().to_string();
    let blob = state
        .blobs
        .put(
            &original_key(&video_id, format.extension()),
            bytes.to_vec(),
            format.mime_type(),
        )
        .await?;
    state
        .videos
        .create(VideoRecord::uploaded(video_id.clone(), blob.url.clone()))
        .await?;
    tracing::info!(%video_id, file = %file_name, mime = %mime, bytes = bytes.len(), "video uploaded");

    Ok(Json(UploadResponse {
        url: blob.url,
        download_url: blob.download_url,
        video_id,
    }))
}

/// `POST /generate`
///
/// Marks the record `processing` and hands it to the dispatcher. Returns without waiting for
/// the worker. Concurrent calls for one id are not serialized.
pub async fn generate(
    State(state): State<AppState>,
    Json(body): Json<GenerateRequest>,
) -> AppResult<Json<GenerateResponse>> {
    let mut record = state
        .videos
        .get(&body.video_id)
        .await?
        .ok_or_else(|| AppError::video_not_found(&body.video_id))?;

    record.transition(VideoStatus::Processing);
    state.videos.save(&record).await?;

    let job = ProcessJob {
        video_id: record.id.clone(),
    };
    if let Err(e) = state.dispatcher.dispatch(job).await {
        record.transition(VideoStatus::Failed);
        if let Err(save_err) = state.videos.save(&record).await {
            tracing::error!(video_id = %record.id, error = %save_err, "could not mark video failed");
        }
        return Err(AppError::Internal(e.context("dispatch processing job")));
    }

    Ok(Json(GenerateResponse {
        status: "queued",
        video_id: record.id,
    }))
}

/// `GET /status/{id}`
///
/// Server-sent events, one JSON `data:` frame per sample, closed after a terminal status.
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = watch_status(state.videos.clone(), id, state.config.status_interval);
    let stream = ReceiverStream::new(rx).map(|frame| {
        let data = serde_json::to_string(&frame)
            .unwrap_or_else(|e| format!(r#"{{"error":"{e}"}}"#));
        Ok(Event::default().data(data))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Upload, generate and status routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .route("/generate", post(generate))
        .route("/status/{id}", get(status))
}
