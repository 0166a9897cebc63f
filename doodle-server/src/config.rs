use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use doodle::DEFAULT_MAX_UPLOAD_BYTES;
use doodle::stylize::client::{DEFAULT_BASE_URL, DEFAULT_MODEL, StylizeConfig};

/// A configuration value that could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The variable is set but does not parse.
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Credentials for the durable job queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Endpoint jobs are published to.
    pub publish_url: String,
    /// Bearer token for `publish_url`.
    pub token: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development except the stylization key; without
/// it the stylize endpoints and the processing worker report the service as unavailable.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Address this server is reachable at; used for blob URLs and local worker dispatch.
    pub public_base_url: String,
    /// Root of the local blob store, served under `/files`.
    pub storage_dir: PathBuf,
    /// Provider settings, present when `STYLIZE_API_KEY` is set.
    pub stylize: Option<StylizeConfig>,
    /// Queue credentials; `None` switches `generate` to direct dispatch.
    pub queue: Option<QueueConfig>,
    /// Stylizations allowed per UTC day.
    pub daily_stylize_limit: u64,
    /// How often the status stream samples a record.
    pub status_interval: Duration,
    /// Largest accepted upload.
    pub max_upload_bytes: u64,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var               | Default                           |
    /// |-----------------------|-----------------------------------|
    /// | `HOST`                | `0.0.0.0`                         |
    /// | `PORT`                | `3000`                            |
    /// | `PUBLIC_BASE_URL`     | `http://localhost:3000`           |
    /// | `STORAGE_DIR`         | `./storage`                       |
    /// | `STYLIZE_API_KEY`     | unset                             |
    /// | `STYLIZE_BASE_URL`    | `https://api.wavespeed.ai/api/v3` |
    /// | `STYLIZE_MODEL`       | `bytedance/seededit-v3`           |
    /// | `QUEUE_PUBLISH_URL`   | unset                             |
    /// | `QUEUE_TOKEN`         | unset                             |
    /// | `DAILY_STYLIZE_LIMIT` | `20`                              |
    /// | `STATUS_INTERVAL_MS`  | `2000`                            |
    /// | `MAX_UPLOAD_BYTES`    | `524288000`                       |
    /// | `CORS_ORIGINS`        | `http://localhost:5173`           |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(&get, "PORT", 3000u16)?;
        let public_base_url = get("PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:3000".into())
            .trim_end_matches('/')
            .to_string();
        let storage_dir = PathBuf::from(get("STORAGE_DIR").unwrap_or_else(|| "./storage".into()));

        let stylize = get("STYLIZE_API_KEY").map(|api_key| StylizeConfig {
            base_url: get("STYLIZE_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            model: get("STYLIZE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            ..StylizeConfig::new(api_key)
        });

        let queue = match (get("QUEUE_PUBLISH_URL"), get("QUEUE_TOKEN")) {
            (Some(publish_url), Some(token)) => Some(QueueConfig { publish_url, token }),
            _ => None,
        };

        let daily_stylize_limit = parse_or(&get, "DAILY_STYLIZE_LIMIT", 20u64)?;
        let status_interval_ms = parse_or(&get, "STATUS_INTERVAL_MS", 2000u64)?;
        if status_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "STATUS_INTERVAL_MS",
                value: "0".into(),
                reason: "must be greater than zero".into(),
            });
        }
        let max_upload_bytes = parse_or(&get, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;

        let cors_origins = get("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host,
            port,
            public_base_url,
            storage_dir,
            stylize,
            queue,
            daily_stylize_limit,
            status_interval: Duration::from_millis(status_interval_ms),
            max_upload_bytes,
            cors_origins,
        })
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            key: "HOST",
            value: raw.clone(),
            reason: e.to_string(),
        })
    }

    /// Endpoint the dispatchers deliver jobs to.
    pub fn worker_url(&self) -> String {
        format!("{}/worker/process", self.public_base_url)
    }
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}
