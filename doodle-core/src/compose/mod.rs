//! Cover-to-footage composition.
//!
//! A composition runs four phases over one [`surface::Surface`] and one encoder session:
//! cover hold (with fade-in), cross-fade into the first video frame, live playback capture,
//! and finalize. Every phase captures exactly one frame per tick of a
//! [`scheduler::TickScheduler`].

/// Phase state machine.
pub mod pipeline;
/// Monotonic progress reporting and the per-phase bands.
pub mod progress;
/// Tick pacing.
pub mod scheduler;
/// The drawing surface and captured frames.
pub mod surface;

use tokio_util::sync::CancellationToken;

use crate::assets::asset::{VideoAsset, parse_data_url};
use crate::compose::pipeline::{CompositionSettings, Compositor};
use crate::compose::scheduler::{TickScheduler, UnpacedTicker, WallClockTicker};
use crate::encode::ffmpeg::{EncoderProfile, FfmpegSink, FfmpegSinkOpts};
use crate::encode::sink::ComposedVideo;
use crate::foundation::error::{DoodleError, DoodleResult};
use crate::media::source::FfmpegSource;

/// How composition ticks are paced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Pacing {
    /// One tick per frame interval of wall-clock time.
    #[default]
    Realtime,
    /// As fast as the encoder accepts frames.
    Unpaced,
}

/// Options for [`compose`].
#[derive(Clone, Debug, Default)]
pub struct ComposeOpts {
    /// Phase timing and output frame rate.
    pub settings: CompositionSettings,
    /// Tick pacing.
    pub pacing: Pacing,
    /// Cancels the composition between ticks.
    pub cancel: CancellationToken,
    /// Encoder to use; detected from the local `ffmpeg` when `None`.
    pub encoder: Option<EncoderProfile>,
}

/// Compose `source` and an encoded cover image into one video with the system `ffmpeg`.
///
/// Blocking: run it on a dedicated thread (or `spawn_blocking`) from async code.
#[tracing::instrument(skip_all, fields(file = source.file_name(), bytes = source.bytes().len()))]
pub fn compose(
    source: &VideoAsset,
    cover_bytes: &[u8],
    opts: &ComposeOpts,
    on_progress: &mut dyn FnMut(f64),
) -> DoodleResult<ComposedVideo> {
    let fps = opts.settings.validate()?;
    let format = source.format();
    if format.requires_transcoding() {
        return Err(DoodleError::unsupported_format(format!(
            "{} sources must be transcoded before composition",
            format.mime_type()
        )));
    }

    let profile = match opts.encoder {
        Some(profile) => profile,
        None => EncoderProfile::detect()?,
    };

    let staged = source.stage()?;
    let mut video = FfmpegSource::open(staged.path(), fps, None)
        .map_err(|e| DoodleError::source_load(e.to_string()))?;
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(profile));

    let mut wall_clock;
    let mut unpaced;
    let scheduler: &mut dyn TickScheduler = match opts.pacing {
        Pacing::Realtime => {
            wall_clock = WallClockTicker::new(fps.tick_interval(), opts.cancel.clone());
            &mut wall_clock
        }
        Pacing::Unpaced => {
            unpaced = UnpacedTicker::new(opts.cancel.clone());
            &mut unpaced
        }
    };

    Compositor::new(opts.settings, scheduler).run(cover_bytes, &mut video, &mut sink, on_progress)?;
    sink.take_output()
        .ok_or_else(|| DoodleError::encoding("encoder finished without producing output"))
}

/// Fetch the encoded bytes of a cover image from an `http(s)` or `data:` URL.
pub async fn fetch_cover(client: &reqwest::Client, url: &str) -> DoodleResult<Vec<u8>> {
    if url.starts_with("data:") {
        return parse_data_url(url)
            .map(|(_, bytes)| bytes)
            .map_err(|e| DoodleError::cover_load(e.to_string()));
    }
    let response = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| DoodleError::cover_load(format!("fetch cover '{url}': {e}")))?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| DoodleError::cover_load(format!("read cover '{url}': {e}")))?;
    if bytes.is_empty() {
        return Err(DoodleError::cover_load(format!("cover '{url}' is empty")));
    }
    Ok(bytes.to_vec())
}
