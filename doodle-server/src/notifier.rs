//! Periodic status sampling for `GET /status/{id}`.
//!
//! One task per subscriber reads the record every interval and pushes a frame into a bounded
//! channel. The task ends after a terminal status, after the record disappears, or as soon as
//! the receiving side is dropped.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::records::{VideoRecord, VideoRepo, VideoStatus};

/// One status sample.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    /// Record id.
    pub id: String,
    /// Current status.
    pub status: VideoStatus,
    /// Coarse percentage derived from `status`.
    pub progress: u8,
    /// Stylized cover, once available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    /// Composed video, once available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_video_url: Option<String>,
}

impl From<&VideoRecord> for StatusUpdate {
    fn from(record: &VideoRecord) -> Self {
        Self {
            id: record.id.clone(),
            status: record.status,
            progress: record.status.progress(),
            cover_url: record.cover_url.clone(),
            processed_video_url: record.processed_url.clone(),
        }
    }
}

/// A frame of the status stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StatusFrame {
    /// Regular sample.
    Update(StatusUpdate),
    /// Final frame when the record cannot be read.
    Error {
        /// Requested id.
        id: String,
        /// What went wrong.
        error: String,
    },
}

impl StatusFrame {
    /// No frame follows this one.
    pub fn is_last(&self) -> bool {
        match self {
            Self::Update(update) => update.status.is_terminal(),
            Self::Error { .. } => true,
        }
    }
}

/// Start sampling `id` every `interval`; the first sample is taken immediately.
pub fn watch_status(
    repo: Arc<dyn VideoRepo>,
    id: String,
    interval: Duration,
) -> mpsc::Receiver<StatusFrame> {
    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = tx.closed() => {
                    tracing::debug!(%id, "status subscriber disconnected");
                    break;
                }
                _ = ticker.tick() => {
                    let frame = sample(repo.as_ref(), &id).await;
                    let last = frame.is_last();
                    if tx.send(frame).await.is_err() || last {
                        break;
                    }
                }
            }
        }
    });
    rx
}

async fn sample(repo: &dyn VideoRepo, id: &str) -> StatusFrame {
    match repo.get(id).await {
        Ok(Some(record)) => StatusFrame::Update(StatusUpdate::from(&record)),
        Ok(None) => StatusFrame::Error {
            id: id.to_string(),
            error: "video not found".to_string(),
        },
        Err(e) => {
            tracing::error!(%id, error = %format!("{e:#}"), "status lookup failed");
            StatusFrame::Error {
                id: id.to_string(),
                error: "status lookup failed".to_string(),
            }
        }
    }
}
