//! HTTP service around the `doodle` media pipeline.
//!
//! Uploads are stored as blobs and tracked as [`records::VideoRecord`]s. `POST /generate`
//! dispatches a job to `POST /worker/process`, which extracts the first frame, stylizes it,
//! composes the cover with the footage and stores the result. Clients follow a job through
//! the server-sent event stream at `GET /status/{id}`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Environment-driven server configuration.
pub mod config;
/// Job dispatch to the processing worker.
pub mod dispatch;
/// HTTP error mapping.
pub mod error;
/// Periodic status sampling for the event stream.
pub mod notifier;
/// Video records and their repository.
pub mod records;
/// Router and middleware stack.
pub mod router;
/// Route handlers.
pub mod routes;
/// Shared handler state.
pub mod state;
/// Blob storage.
pub mod storage;
/// Daily usage counting.
pub mod usage;
/// The processing pipeline run by the worker endpoint.
pub mod worker;

pub use config::{ConfigError, ServerConfig};
pub use error::{AppError, AppResult};
pub use router::build_app_router;
pub use state::AppState;
