use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::records::{VideoRepo, VideoStatus};

/// Body delivered to `POST /worker/process`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessJob {
    /// Record to process.
    pub video_id: String,
}

/// Hands a [`ProcessJob`] to the processing worker without waiting for it to run.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    /// Enqueue `job`. Returns once the job is accepted, never after it ran.
    async fn dispatch(&self, job: ProcessJob) -> anyhow::Result<()>;
}

/// Publishes jobs to a durable HTTP queue that delivers them to the worker endpoint.
#[derive(Clone, Debug)]
pub struct QueueDispatcher {
    client: reqwest::Client,
    publish_url: String,
    token: String,
    destination: String,
}

impl QueueDispatcher {
    /// Publish to `publish_url`, asking the queue to deliver to `destination`.
    pub fn new(
        client: reqwest::Client,
        publish_url: impl Into<String>,
        token: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            client,
            publish_url: publish_url.into(),
            token: token.into(),
            destination: destination.into(),
        }
    }
}

#[async_trait]
impl JobDispatcher for QueueDispatcher {
    async fn dispatch(&self, job: ProcessJob) -> anyhow::Result<()> {
        self.client
            .post(&self.publish_url)
            .bearer_auth(&self.token)
            .json(&json!({ "destination": self.destination, "body": job }))
            .send()
            .await
            .context("publish job")?
            .error_for_status()
            .context("queue rejected job")?;
        tracing::info!(video_id = %job.video_id, "job queued");
        Ok(())
    }
}

/// Calls the worker endpoint directly from a background task.
///
/// Used when no queue is configured. The request runs detached, so the caller returns before
/// the worker starts. When the worker cannot be reached or answers with an error status, a
/// record still in `processing` is moved to `failed`.
#[derive(Clone)]
pub struct DirectDispatcher {
    client: reqwest::Client,
    worker_url: String,
    videos: Arc<dyn VideoRepo>,
}

impl DirectDispatcher {
    /// Deliver jobs to `worker_url`, reporting delivery failures into `videos`.
    pub fn new(
        client: reqwest::Client,
        worker_url: impl Into<String>,
        videos: Arc<dyn VideoRepo>,
    ) -> Self {
        Self {
            client,
            worker_url: worker_url.into(),
            videos,
        }
    }
}

#[async_trait]
impl JobDispatcher for DirectDispatcher {
    async fn dispatch(&self, job: ProcessJob) -> anyhow::Result<()> {
        let client = self.client.clone();
        let url = self.worker_url.clone();
        let videos = self.videos.clone();
        tokio::spawn(async move {
            let result = client
                .post(&url)
                .json(&job)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status);
            if let Err(e) = result {
                tracing::warn!(video_id = %job.video_id, error = %e, "direct worker call failed");
                mark_failed(videos.as_ref(), &job.video_id).await;
            }
        });
        tracing::info!(worker = %self.worker_url, "job dispatched directly");
        Ok(())
    }
}

/// Move a record that is still `processing` to `failed`. Errors are logged, not returned.
pub async fn mark_failed(videos: &dyn VideoRepo, video_id: &str) {
    match videos.get(video_id).await {
        Ok(Some(mut record)) if record.status == VideoStatus::Processing => {
            record.transition(VideoStatus::Failed);
            match videos.save(&record).await {
                Ok(_) => tracing::warn!(%video_id, "video marked failed"),
                Err(e) => tracing::error!(%video_id, error = %e, "could not mark video failed"),
            }
        }
        Ok(_) => {}
        Err(e) => tracing::error!(%video_id, error = %e, "could not load video to mark it failed"),
    }
}
