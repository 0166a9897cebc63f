use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::assets::asset::to_data_url;
use crate::foundation::error::{DoodleError, DoodleResult};
use crate::stylize::task::{StylizationTask, parse_task_response};

/// Provider root used when none is configured.
pub const DEFAULT_BASE_URL: &str = "https://api.wavespeed.ai/api/v3";
/// Image-editing model used when none is configured.
pub const DEFAULT_MODEL: &str = "bytedance/seededit-v3";
/// The one instruction every submission carries.
pub const DEFAULT_PROMPT: &str = "Turn this photo into a playful hand-drawn doodle: bold black \
    marker outlines, flat pastel fills, simple shapes, white paper background. Keep the \
    composition and subjects recognizable.";

/// Where and how to reach the stylization provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StylizeConfig {
    /// Provider API root, without a trailing slash.
    pub base_url: String,
    /// Bearer token.
    pub api_key: String,
    /// Model path appended to `base_url` on submit.
    pub model: String,
    /// Style instruction sent with every image.
    pub prompt: String,
}

impl StylizeConfig {
    /// Defaults for everything except the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }

    fn submit_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.model.trim_matches('/')
        )
    }

    fn result_url(&self, request_id: &str) -> String {
        format!(
            "{}/predictions/{request_id}/result",
            self.base_url.trim_end_matches('/')
        )
    }
}

/// Bounds for [`StylizeClient::await_result`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollOpts {
    /// Polls before giving up.
    pub max_attempts: u32,
    /// Sleep between two polls.
    pub interval: Duration,
}

impl Default for PollOpts {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            interval: Duration::from_millis(3000),
        }
    }
}

/// The image a task is created from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageRef {
    /// Publicly reachable URL.
    Url(String),
    /// Inline bytes, sent as a `data:` URL.
    Bytes {
        /// MIME type of `bytes`.
        mime_type: String,
        /// Encoded image.
        bytes: Vec<u8>,
    },
}

impl ImageRef {
    fn to_payload(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Bytes { mime_type, bytes } => to_data_url(mime_type, bytes),
        }
    }
}

/// One request/response exchange with the provider.
///
/// Implementations return the decoded JSON body of a 2xx response and turn everything else
/// (network failure, non-2xx status, non-JSON body) into [`DoodleError::Provider`].
#[async_trait]
pub trait TaskTransport: Send + Sync {
    /// `POST url` with a JSON body.
    async fn post_json(&self, url: &str, body: &Value) -> DoodleResult<Value>;
    /// `GET url`.
    async fn get_json(&self, url: &str) -> DoodleResult<Value>;
}

#[async_trait]
impl<T: TaskTransport + ?Sized> TaskTransport for Arc<T> {
    async fn post_json(&self, url: &str, body: &Value) -> DoodleResult<Value> {
        (**self).post_json(url, body).await
    }

    async fn get_json(&self, url: &str) -> DoodleResult<Value> {
        (**self).get_json(url).await
    }
}

/// [`TaskTransport`] over `reqwest` with bearer authentication.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    api_key: String,
}

impl HttpTransport {
    /// Transport with its own connection pool.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_key)
    }

    /// Transport sharing an existing client.
    pub fn with_client(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
        }
    }

    async fn read_json(response: reqwest::Response) -> DoodleResult<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(DoodleError::provider(format!(
                "provider responded {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| DoodleError::provider(format!("provider body is not JSON: {e}")))
    }
}

#[async_trait]
impl TaskTransport for HttpTransport {
    async fn post_json(&self, url: &str, body: &Value) -> DoodleResult<Value> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| DoodleError::provider(format!("POST {url}: {e}")))?;
        Self::read_json(response).await
    }

    async fn get_json(&self, url: &str) -> DoodleResult<Value> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| DoodleError::provider(format!("GET {url}: {e}")))?;
        Self::read_json(response).await
    }
}

/// Client for the remote stylization task API.
///
/// Submissions are never retried. [`StylizeClient::await_result`] only re-polls, at most once
/// per interval, with one request in flight.
pub struct StylizeClient<T = HttpTransport> {
    config: StylizeConfig,
    transport: T,
}

impl StylizeClient<HttpTransport> {
    /// Client talking HTTP to the configured provider.
    pub fn new(config: StylizeConfig) -> Self {
        let transport = HttpTransport::new(config.api_key.clone());
        Self { config, transport }
    }
}

impl<T: TaskTransport> StylizeClient<T> {
    /// Client over a custom transport.
    pub fn with_transport(config: StylizeConfig, transport: T) -> Self {
        Self { config, transport }
    }

    /// Provider configuration.
    pub fn config(&self) -> &StylizeConfig {
        &self.config
    }

    /// Create a task for `image`.
    ///
    /// A provider that finishes synchronously yields an already-terminal task, which callers
    /// should not poll.
    #[tracing::instrument(skip_all, fields(model = %self.config.model))]
    pub async fn submit(&self, image: &ImageRef) -> DoodleResult<StylizationTask> {
        let body = json!({
            "image": image.to_payload(),
            "prompt": self.config.prompt,
            "enable_base64_output": false,
            "enable_sync_mode": false,
        });
        let response = self
            .transport
            .post_json(&self.config.submit_url(), &body)
            .await?;
        let task = parse_task_response(&response)?;
        tracing::info!(request_id = %task.request_id, state = task.state.as_str(), "stylization submitted");
        Ok(task)
    }

    /// Check a task once.
    pub async fn poll(&self, request_id: &str) -> DoodleResult<StylizationTask> {
        if request_id.trim().is_empty() {
            return Err(DoodleError::validation("request id must not be empty"));
        }
        let response = self
            .transport
            .get_json(&self.config.result_url(request_id))
            .await?;
        let task = parse_task_response(&response)?;
        tracing::debug!(request_id, state = task.state.as_str(), progress = ?task.progress, "stylization polled");
        Ok(task)
    }

    /// Poll until the task is terminal or `opts.max_attempts` polls came back non-terminal.
    ///
    /// Total waiting never exceeds `max_attempts * interval`: there is no sleep after the last
    /// attempt. The remote task keeps running after a timeout.
    #[tracing::instrument(skip(self, opts), fields(max_attempts = opts.max_attempts))]
    pub async fn await_result(
        &self,
        request_id: &str,
        opts: PollOpts,
    ) -> DoodleResult<StylizationTask> {
        for attempt in 1..=opts.max_attempts {
            let task = self.poll(request_id).await?;
            if task.state.is_terminal() {
                tracing::info!(attempt, state = task.state.as_str(), "stylization finished");
                return Ok(task);
            }
            if attempt < opts.max_attempts {
                tokio::time::sleep(opts.interval).await;
            }
        }
        tracing::warn!("stylization still running after the last poll");
        Err(DoodleError::PollTimeoutExceeded {
            attempts: opts.max_attempts,
        })
    }

    /// Submit `image` and wait for the terminal task.
    pub async fn stylize(&self, image: &ImageRef, opts: PollOpts) -> DoodleResult<StylizationTask> {
        let task = self.submit(image).await?;
        if task.state.is_terminal() {
            return Ok(task);
        }
        self.await_result(&task.request_id, opts).await
    }
}

#[cfg(test)]
#[path = "../../tests/unit/stylize/client.rs"]
mod tests;
