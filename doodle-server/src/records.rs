use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use doodle::{AspectRatio, FrameMetadata};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Lifecycle of one uploaded video.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    /// Stored, nothing requested yet.
    Uploaded,
    /// A processing job was dispatched.
    Processing,
    /// Cover and processed video are available.
    Completed,
    /// The processing job failed.
    Failed,
}

impl VideoStatus {
    /// `completed` and `failed` never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Coarse percentage shown to clients.
    pub fn progress(self) -> u8 {
        match self {
            Self::Uploaded => 10,
            Self::Processing => 50,
            Self::Completed => 100,
            Self::Failed => 0,
        }
    }

    /// Wire token.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted state of one uploaded video.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    /// Generated id.
    pub id: String,
    /// Blob URL of the upload.
    pub original_url: String,
    /// Blob URL of the stylized cover.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    /// Blob URL of the composed video.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_url: Option<String>,
    /// Aspect ratio of the upload, once known.
    pub aspect_ratio: AspectRatio,
    /// Current lifecycle state.
    pub status: VideoStatus,
    /// Wall time the worker spent on the job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    /// Extraction metadata recorded by the worker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FrameMetadata>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl VideoRecord {
    /// A freshly uploaded video.
    ///
    /// The aspect ratio is unknown until the worker probes the file, so it starts as 16:9.
    pub fn uploaded(id: impl Into<String>, original_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            original_url: original_url.into(),
            cover_url: None,
            processed_url: None,
            aspect_ratio: AspectRatio::Landscape16x9,
            status: VideoStatus::Uploaded,
            processing_time_ms: None,
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `status` and bump `updated_at`.
    pub fn transition(&mut self, status: VideoStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Storage for [`VideoRecord`]s.
///
/// Updates are whole-record writes without a version check: two concurrent read-modify-write
/// cycles on one id can lose one of the updates.
#[async_trait]
pub trait VideoRepo: Send + Sync {
    /// Insert a new record.
    async fn create(&self, record: VideoRecord) -> anyhow::Result<()>;
    /// Fetch a record by id.
    async fn get(&self, id: &str) -> anyhow::Result<Option<VideoRecord>>;
    /// Replace an existing record. Returns `false` when the id is unknown.
    async fn save(&self, record: &VideoRecord) -> anyhow::Result<bool>;
    /// Records in `status`, newest first.
    async fn list_by_status(&self, status: VideoStatus) -> anyhow::Result<Vec<VideoRecord>>;
}

/// Process-local [`VideoRepo`].
#[derive(Debug, Default)]
pub struct InMemoryVideoRepo {
    records: RwLock<HashMap<String, VideoRecord>>,
}

impl InMemoryVideoRepo {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VideoRepo for InMemoryVideoRepo {
    async fn create(&self, record: VideoRecord) -> anyhow::Result<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            anyhow::bail!("video {} already exists", record.id);
        }
        records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<VideoRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn save(&self, record: &VideoRecord) -> anyhow::Result<bool> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_by_status(&self, status: VideoStatus) -> anyhow::Result<Vec<VideoRecord>> {
        let mut out: Vec<_> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }
}
