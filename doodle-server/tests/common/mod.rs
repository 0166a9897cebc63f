#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, Response, StatusCode, header};
use axum::routing::post;
use doodle::stylize::client::DEFAULT_BASE_URL;
use doodle::{AspectRatio, DoodleResult, FrameMetadata, StylizeClient, StylizeConfig, TaskTransport};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use doodle_server::config::ServerConfig;
use doodle_server::dispatch::{JobDispatcher, ProcessJob};
use doodle_server::records::{InMemoryVideoRepo, VideoRecord, VideoRepo, VideoStatus};
use doodle_server::storage::{BlobStore, LocalBlobStore};
use doodle_server::usage::{InMemoryUsageCounter, UsageCounter};
use doodle_server::worker::{JobProcessor, ProcessOutcome};
use doodle_server::{AppState, build_app_router};

pub const BASE_URL: &str = "http://doodle.test";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(storage: &TempDir) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        public_base_url: BASE_URL.to_string(),
        storage_dir: storage.path().to_path_buf(),
        stylize: Some(StylizeConfig::new("test-key")),
        queue: None,
        daily_stylize_limit: 20,
        status_interval: Duration::from_millis(20),
        max_upload_bytes: 1024 * 1024,
        cors_origins: vec!["http://localhost:5173".to_string()],
    }
}

/// Provider that answers every submit and poll with fixed bodies.
pub struct FakeTransport {
    pub submit: Value,
    pub poll: Value,
    pub submitted: Mutex<Vec<Value>>,
}

impl FakeTransport {
    pub fn new(submit: Value, poll: Value) -> Self {
        Self {
            submit,
            poll,
            submitted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TaskTransport for FakeTransport {
    async fn post_json(&self, _url: &str, body: &Value) -> DoodleResult<Value> {
        self.submitted.lock().unwrap().push(body.clone());
        Ok(self.submit.clone())
    }

    async fn get_json(&self, _url: &str) -> DoodleResult<Value> {
        Ok(self.poll.clone())
    }
}

/// Dispatcher that only remembers what it was given.
#[derive(Default)]
pub struct RecordingDispatcher {
    pub jobs: Mutex<Vec<ProcessJob>>,
}

#[async_trait]
impl JobDispatcher for RecordingDispatcher {
    async fn dispatch(&self, job: ProcessJob) -> anyhow::Result<()> {
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

/// How [`FakeProcessor`] behaves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessorMode {
    Succeed,
    Fail,
    Panic,
}

pub struct FakeProcessor {
    pub mode: ProcessorMode,
}

#[async_trait]
impl JobProcessor for FakeProcessor {
    async fn process(&self, record: &VideoRecord) -> anyhow::Result<ProcessOutcome> {
        match self.mode {
            ProcessorMode::Succeed => Ok(ProcessOutcome {
                cover_url: format!("{BASE_URL}/files/videos/{}/cover.png", record.id),
                processed_url: format!("{BASE_URL}/files/videos/{}/processed.mp4", record.id),
                aspect_ratio: AspectRatio::Portrait9x16,
                metadata: FrameMetadata::new(1080, 1920, 5.0).unwrap(),
            }),
            ProcessorMode::Fail => anyhow::bail!("stylization provider exploded"),
            ProcessorMode::Panic => panic!("pipeline bug"),
        }
    }
}

/// Counter whose backend is always down.
pub struct UnreachableCounter;

#[async_trait]
impl UsageCounter for UnreachableCounter {
    async fn get(&self, _key: &str) -> anyhow::Result<u64> {
        anyhow::bail!("connection refused")
    }

    async fn incr(&self, _key: &str) -> anyhow::Result<u64> {
        anyhow::bail!("connection refused")
    }

    async fn expire_at(&self, _key: &str, _at: chrono::DateTime<chrono::Utc>) -> anyhow::Result<()> {
        anyhow::bail!("connection refused")
    }
}

/// A test application plus handles on its fakes.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub videos: Arc<InMemoryVideoRepo>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub transport: Arc<FakeTransport>,
    pub storage: TempDir,
}

impl TestApp {
    /// Swap the dispatcher used by the router.
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn JobDispatcher>) -> Self {
        self.state.dispatcher = dispatcher;
        self.router = build_app_router(self.state.clone());
        self
    }
}

pub struct TestAppBuilder {
    config_edit: Box<dyn FnOnce(&mut ServerConfig)>,
    transport: FakeTransport,
    mode: ProcessorMode,
    usage: Option<Arc<dyn UsageCounter>>,
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self {
            config_edit: Box::new(|_| {}),
            transport: FakeTransport::new(
                json!({"data": {"id": "req-1", "status": "created"}}),
                json!({"data": {"id": "req-1", "status": "processing"}}),
            ),
            mode: ProcessorMode::Succeed,
            usage: None,
        }
    }
}

impl TestAppBuilder {
    pub fn config(mut self, edit: impl FnOnce(&mut ServerConfig) + 'static) -> Self {
        self.config_edit = Box::new(edit);
        self
    }

    pub fn transport(mut self, transport: FakeTransport) -> Self {
        self.transport = transport;
        self
    }

    pub fn processor(mut self, mode: ProcessorMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn usage(mut self, usage: Arc<dyn UsageCounter>) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn build(self) -> TestApp {
        let storage = tempfile::tempdir().unwrap();
        let mut config = test_config(&storage);
        (self.config_edit)(&mut config);

        let videos = Arc::new(InMemoryVideoRepo::new());
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let transport = Arc::new(self.transport);
        let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(storage.path(), BASE_URL));
        let stylizer = config.stylize.clone().map(|stylize| {
            let shared: Arc<dyn TaskTransport> = transport.clone();
            Arc::new(StylizeClient::with_transport(
                StylizeConfig {
                    base_url: DEFAULT_BASE_URL.to_string(),
                    ..stylize
                },
                shared,
            ))
        });

        let state = AppState {
            config: Arc::new(config),
            videos: videos.clone(),
            blobs,
            dispatcher: dispatcher.clone(),
            usage: self
                .usage
                .unwrap_or_else(|| Arc::new(InMemoryUsageCounter::new())),
            processor: Arc::new(FakeProcessor { mode: self.mode }),
            stylizer,
        };

        TestApp {
            router: build_app_router(state.clone()),
            state,
            videos,
            dispatcher,
            transport,
            storage,
        }
    }
}

/// Queue endpoint on a local port that records what it was sent.
pub struct FakeQueue {
    pub addr: SocketAddr,
    published: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

impl FakeQueue {
    /// Answer every publish with `status`.
    pub async fn start(status: StatusCode) -> Self {
        let published: Arc<Mutex<Vec<(Option<String>, Value)>>> = Arc::default();
        let sink = published.clone();
        let router = Router::new().route(
            "/publish",
            post(move |headers: HeaderMap, axum::Json(body): axum::Json<Value>| {
                let sink = sink.clone();
                async move {
                    let auth = headers
                        .get(header::AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    sink.lock().unwrap().push((auth, body));
                    status
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        Self { addr, published }
    }

    pub fn publish_url(&self) -> String {
        format!("http://{}/publish", self.addr)
    }

    /// `(authorization header, body)` per publish.
    pub fn published(&self) -> Vec<(Option<String>, Value)> {
        self.published.lock().unwrap().clone()
    }
}

/// A local address with nothing listening on it.
pub async fn closed_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Poll the repository until `id` reaches `status`.
pub async fn wait_for_status(app: &TestApp, id: &str, status: VideoStatus) -> VideoRecord {
    for _ in 0..100 {
        if let Some(record) = app.videos.get(id).await.unwrap() {
            if record.status == status {
                return record;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("video {id} never reached {status}");
}

pub fn test_app() -> TestApp {
    TestAppBuilder::default().build()
}

pub async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: &TestApp, uri: &str, body: Value) -> Response<Body> {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// Send one multipart file field.
pub async fn post_file(
    app: &TestApp,
    uri: &str,
    field: &str,
    file_name: &str,
    content_type: &str,
    bytes: &[u8],
) -> Response<Body> {
    let boundary = "doodle-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; \
             filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let request = Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// The JSON payloads of every `data:` line in an event stream body.
pub fn sse_payloads(body: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(body)
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect()
}
