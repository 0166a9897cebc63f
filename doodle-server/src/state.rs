use std::sync::Arc;

use doodle::{HttpTransport, StylizeClient, TaskTransport};

use crate::config::ServerConfig;
use crate::dispatch::{DirectDispatcher, JobDispatcher, QueueDispatcher};
use crate::records::{InMemoryVideoRepo, VideoRepo};
use crate::storage::{BlobStore, LocalBlobStore};
use crate::usage::{InMemoryUsageCounter, UsageCounter};
use crate::worker::{JobProcessor, MediaPipeline};

/// Stylization client over a shared, type-erased transport.
pub type Stylizer = StylizeClient<Arc<dyn TaskTransport>>;

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheap to clone; every collaborator sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Video records.
    pub videos: Arc<dyn VideoRepo>,
    /// Uploads, covers and composed videos.
    pub blobs: Arc<dyn BlobStore>,
    /// Delivers processing jobs to the worker.
    pub dispatcher: Arc<dyn JobDispatcher>,
    /// Daily stylization counter.
    pub usage: Arc<dyn UsageCounter>,
    /// Runs one processing job.
    pub processor: Arc<dyn JobProcessor>,
    /// Provider client; `None` when no API key is configured.
    pub stylizer: Option<Arc<Stylizer>>,
}

impl AppState {
    /// Wire the production collaborators for `config`.
    ///
    /// Records and usage counts live in process memory; blobs go to `config.storage_dir`.
    pub fn from_config(config: ServerConfig) -> Self {
        let http = reqwest::Client::new();
        let videos: Arc<dyn VideoRepo> = Arc::new(InMemoryVideoRepo::new());
        let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(
            config.storage_dir.clone(),
            config.public_base_url.clone(),
        ));

        let stylizer = config.stylize.clone().map(|stylize| {
            let transport: Arc<dyn TaskTransport> =
                Arc::new(HttpTransport::with_client(http.clone(), stylize.api_key.clone()));
            Arc::new(StylizeClient::with_transport(stylize, transport))
        });

        let dispatcher: Arc<dyn JobDispatcher> = match &config.queue {
            Some(queue) => Arc::new(QueueDispatcher::new(
                http.clone(),
                queue.publish_url.clone(),
                queue.token.clone(),
                config.worker_url(),
            )),
            None => Arc::new(DirectDispatcher::new(
                http.clone(),
                config.worker_url(),
                videos.clone(),
            )),
        };

        let processor: Arc<dyn JobProcessor> = Arc::new(MediaPipeline::new(
            blobs.clone(),
            stylizer.clone(),
            http,
        ));

        Self {
            config: Arc::new(config),
            videos,
            blobs,
            dispatcher,
            usage: Arc::new(InMemoryUsageCounter::new()),
            processor,
            stylizer,
        }
    }
}
