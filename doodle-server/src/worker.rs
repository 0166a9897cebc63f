use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use doodle::{
    AspectRatio, ComposeOpts, ExtractorOpts, FrameExtractor, FrameMetadata, ImageRef, MediaFormat,
    Pacing, PollOpts, TaskState, VideoAsset, fetch_cover,
};

use crate::records::VideoRecord;
use crate::state::Stylizer;
use crate::storage::BlobStore;

/// Artifacts of a finished job.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessOutcome {
    /// Stored stylized cover.
    pub cover_url: String,
    /// Stored composed video.
    pub processed_url: String,
    /// Aspect ratio of the upload.
    pub aspect_ratio: AspectRatio,
    /// Extraction metadata.
    pub metadata: FrameMetadata,
}

/// Turns one uploaded video into its cover and composed video.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    /// Process `record`. The caller owns all record state transitions.
    async fn process(&self, record: &VideoRecord) -> anyhow::Result<ProcessOutcome>;
}

/// The real pipeline: extract, stylize, fetch cover, compose, store.
pub struct MediaPipeline {
    blobs: Arc<dyn BlobStore>,
    stylizer: Option<Arc<Stylizer>>,
    http: reqwest::Client,
    poll: PollOpts,
}

impl MediaPipeline {
    /// Pipeline storing its artifacts in `blobs`.
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        stylizer: Option<Arc<Stylizer>>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            blobs,
            stylizer,
            http,
            poll: PollOpts::default(),
        }
    }
}

#[async_trait]
impl JobProcessor for MediaPipeline {
    #[tracing::instrument(skip_all, fields(video_id = %record.id))]
    async fn process(&self, record: &VideoRecord) -> anyhow::Result<ProcessOutcome> {
        let stylizer = self
            .stylizer
            .as_ref()
            .context("stylization is not configured")?;

        let bytes = self.blobs.read_url(&record.original_url).await?;
        let file_name = file_name_of(&record.original_url);
        let mime = MediaFormat::from_extension(&file_name).mime_type();
        let asset = VideoAsset::new(bytes, mime, file_name);

        let (asset, frame) = tokio::task::spawn_blocking(move || {
            let frame = FrameExtractor::new(ExtractorOpts::default()).extract(&asset);
            (asset, frame)
        })
        .await
        .context("extraction task panicked")?;
        let frame = frame?;
        tracing::info!(aspect = %frame.metadata.aspect_ratio, "first frame extracted");

        let image = ImageRef::Bytes {
            mime_type: frame.mime_type.to_string(),
            bytes: frame.image.clone(),
        };
        let task = stylizer.stylize(&image, self.poll).await?;
        let result_url = match (task.state, task.result_url) {
            (TaskState::Completed, Some(url)) => url,
            _ => anyhow::bail!(
                "stylization {} ended {}: {}",
                task.request_id,
                task.state.as_str(),
                task.error_detail.as_deref().unwrap_or("no result")
            ),
        };
        let cover = fetch_cover(&self.http, &result_url).await?;

        let cover_for_compose = cover.clone();
        let video = tokio::task::spawn_blocking(move || {
            let opts = ComposeOpts {
                pacing: Pacing::Unpaced,
                ..ComposeOpts::default()
            };
            doodle::compose(&asset, &cover_for_compose, &opts, &mut |p| {
                tracing::trace!(progress = p, "composing");
            })
        })
        .await
        .context("composition task panicked")??;

        let cover_ext = image_extension(&result_url);
        let cover_blob = self
            .blobs
            .put(
                &format!("videos/{}/cover.{cover_ext}", record.id),
                cover,
                &format!("image/{}", if cover_ext == "jpg" { "jpeg" } else { cover_ext }),
            )
            .await?;
        let processed_blob = self
            .blobs
            .put(
                &format!("videos/{}/processed.{}", record.id, video.container_extension),
                video.bytes,
                &video.mime_type,
            )
            .await?;

        Ok(ProcessOutcome {
            cover_url: cover_blob.url,
            processed_url: processed_blob.url,
            aspect_ratio: frame.metadata.aspect_ratio,
            metadata: frame.metadata,
        })
    }
}

fn file_name_of(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path).to_string()
}

fn image_extension(url: &str) -> &'static str {
    let name = file_name_of(url).to_ascii_lowercase();
    match name.rsplit_once('.').map(|(_, ext)| ext) {
        Some("jpg" | "jpeg") => "jpg",
        Some("webp") => "webp",
        _ => "png",
    }
}
