//! `ffprobe`/`ffmpeg` process plumbing and video decode sessions.

/// Error type shared by the process helpers.
pub mod error;
/// Container metadata through `ffprobe`.
pub mod probe;
pub(crate) mod process;
/// Decode sessions the compositor draws from.
pub mod source;

pub use error::MediaError;
pub use process::{is_ffmpeg_on_path, is_ffprobe_on_path};
