//! Doodle turns a short video into a stylized "doodle" cover and a cover-to-footage clip.
//!
//! # Pipeline overview
//!
//! 1. **Extract**: [`FrameExtractor`] captures the frame at time zero as a JPEG plus
//!    [`FrameMetadata`] (size, duration, canonical aspect ratio).
//! 2. **Stylize**: [`StylizeClient`] submits that still to a remote image-editing provider and
//!    polls the task until it completes, normalizing the provider's response shapes into one
//!    [`StylizationTask`].
//! 3. **Compose**: [`compose`] holds the stylized cover, cross-fades into the footage, then
//!    captures the rest of the video into a streaming `ffmpeg` encoder, reporting monotonic
//!    progress from 0 to 100.
//!
//! Media work shells out to the system `ffmpeg`/`ffprobe` binaries. Extraction and composition
//! are blocking; stylization is async.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod effects;
mod foundation;

/// Source assets and still-image codecs.
pub mod assets;
/// Composition phases, pacing and progress.
pub mod compose;
/// Encoder sinks.
pub mod encode;
/// First-frame extraction.
pub mod extract;
/// `ffmpeg`/`ffprobe` plumbing and decode sessions.
pub mod media;
/// Remote stylization tasks.
pub mod stylize;

pub use crate::foundation::core::{Canvas, Fps, FrameIndex};
pub use crate::foundation::error::{DoodleError, DoodleResult};

pub use crate::assets::asset::{
    DEFAULT_MAX_UPLOAD_BYTES, MediaFormat, VideoAsset, parse_data_url, to_data_url,
    validate_upload,
};
pub use crate::compose::pipeline::{CompositionSettings, CompositionStats, Compositor};
pub use crate::compose::scheduler::{Tick, TickScheduler, UnpacedTicker, WallClockTicker};
pub use crate::compose::surface::FrameRGBA;
pub use crate::compose::{ComposeOpts, Pacing, compose, fetch_cover};
pub use crate::encode::ffmpeg::{Container, EncoderProfile, FfmpegSink, FfmpegSinkOpts};
pub use crate::encode::sink::{ComposedVideo, FrameSink, InMemorySink, SinkConfig};
pub use crate::extract::metadata::{AspectRatio, ExtractedFrame, FrameMetadata};
pub use crate::extract::{
    ExtractState, ExtractorOpts, FfmpegFrameDecoder, FrameDecoder, FrameExtractor,
};
pub use crate::media::source::{FfmpegSource, MemorySource, PlaybackState, VideoSource};
pub use crate::media::{is_ffmpeg_on_path, is_ffprobe_on_path};
pub use crate::stylize::client::{
    HttpTransport, ImageRef, PollOpts, StylizeClient, StylizeConfig, TaskTransport,
};
pub use crate::stylize::task::{StylizationTask, TaskState, parse_task_response};
