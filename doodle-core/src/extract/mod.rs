//! First-frame extraction.
//!
//! `Idle -> Loading -> Seeking -> Captured`, or `Failed` from any state. One deadline covers
//! probing and decoding the first frame.

/// Aspect ratio classification and extraction results.
pub mod metadata;

use std::fmt;
use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};

use crate::assets::asset::VideoAsset;
use crate::assets::decode::encode_jpeg;
use crate::extract::metadata::{ExtractedFrame, FrameMetadata};
use crate::foundation::core::Canvas;
use crate::foundation::error::{DoodleError, DoodleResult};
use crate::media::error::MediaError;
use crate::media::probe::{VideoInfo, probe_video};
use crate::media::process::output_with_deadline;

/// Options for [`FrameExtractor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtractorOpts {
    /// Upper bound on probing plus first-frame decode.
    pub load_timeout: Duration,
    /// JPEG quality of the captured still, `1..=100`.
    pub jpeg_quality: u8,
}

impl Default for ExtractorOpts {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_secs(10),
            jpeg_quality: 90,
        }
    }
}

/// Steps of one extraction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtractState {
    /// Nothing started yet.
    Idle,
    /// Waiting for dimensions and duration.
    Loading,
    /// Seeking to time zero and rendering that frame.
    Seeking,
    /// The still image is ready.
    Captured,
    /// Terminal failure.
    Failed,
}

impl fmt::Display for ExtractState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Seeking => "seeking",
            Self::Captured => "captured",
            Self::Failed => "failed",
        })
    }
}

/// Decoder backend used by [`FrameExtractor`].
pub trait FrameDecoder {
    /// Read intrinsic metadata of the staged video.
    fn probe(&mut self, path: &Path, deadline: Instant) -> Result<VideoInfo, MediaError>;

    /// Render the frame at time zero as straight RGBA8 at `info`'s native size.
    fn first_frame(
        &mut self,
        path: &Path,
        info: &VideoInfo,
        deadline: Instant,
    ) -> Result<Vec<u8>, MediaError>;
}

/// Decodes through the system `ffprobe`/`ffmpeg`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegFrameDecoder;

impl FrameDecoder for FfmpegFrameDecoder {
    fn probe(&mut self, path: &Path, deadline: Instant) -> Result<VideoInfo, MediaError> {
        probe_video(path, Some(deadline))
    }

    fn first_frame(
        &mut self,
        path: &Path,
        _info: &VideoInfo,
        deadline: Instant,
    ) -> Result<Vec<u8>, MediaError> {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-v", "error", "-nostdin", "-ss", "0", "-i"])
            .arg(path)
            .args([
                "-an", "-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1",
            ]);
        let out = output_with_deadline("ffmpeg", &mut cmd, Some(deadline))?.success_or("ffmpeg")?;
        Ok(out.stdout)
    }
}

/// Captures the first frame of a video as a JPEG plus its metadata.
#[derive(Debug)]
pub struct FrameExtractor<D = FfmpegFrameDecoder> {
    opts: ExtractorOpts,
    decoder: D,
}

impl FrameExtractor<FfmpegFrameDecoder> {
    /// Extractor backed by the system `ffmpeg`.
    pub fn new(opts: ExtractorOpts) -> Self {
        Self::with_decoder(opts, FfmpegFrameDecoder)
    }
}

impl<D: FrameDecoder> FrameExtractor<D> {
    /// Extractor backed by a custom decoder.
    pub fn with_decoder(opts: ExtractorOpts, decoder: D) -> Self {
        Self { opts, decoder }
    }

    /// Extract the first frame of `asset`.
    pub fn extract(&mut self, asset: &VideoAsset) -> DoodleResult<ExtractedFrame> {
        self.extract_observed(asset, &mut |_| {})
    }

    /// Like [`FrameExtractor::extract`], reporting every state transition to `observer`.
    ///
    /// Formats that need transcoding are rejected from their declared type, name and magic
    /// bytes without starting a decoder. The staged copy of the asset is deleted on every
    /// exit path.
    #[tracing::instrument(skip_all, fields(file = asset.file_name(), mime = asset.mime_type()))]
    pub fn extract_observed(
        &mut self,
        asset: &VideoAsset,
        observer: &mut dyn FnMut(ExtractState),
    ) -> DoodleResult<ExtractedFrame> {
        let mut state = ExtractState::Idle;
        let mut enter = |next: ExtractState| {
            tracing::debug!(from = %state, to = %next, "extractor transition");
            state = next;
            observer(next);
        };

        let result = self.run(asset, &mut enter);
        match &result {
            Ok(frame) => {
                enter(ExtractState::Captured);
                tracing::debug!(
                    width = frame.metadata.width,
                    height = frame.metadata.height,
                    aspect = %frame.metadata.aspect_ratio,
                    "first frame captured"
                );
            }
            Err(e) => {
                enter(ExtractState::Failed);
                tracing::warn!(error = %e, "frame extraction failed");
            }
        }
        result
    }

    fn run(
        &mut self,
        asset: &VideoAsset,
        enter: &mut dyn FnMut(ExtractState),
    ) -> DoodleResult<ExtractedFrame> {
        let format = asset.format();
        if format.requires_transcoding() {
            return Err(DoodleError::unsupported_format(format!(
                "'{}' is {}, which must be converted to MP4 before it can be read",
                asset.file_name(),
                format.mime_type()
            )));
        }

        let deadline = Instant::now() + self.opts.load_timeout;
        enter(ExtractState::Loading);
        let staged = asset.stage()?;
        let info = self
            .decoder
            .probe(staged.path(), deadline)
            .map_err(|e| load_error("probe", e))?;
        let metadata = FrameMetadata::new(info.width, info.height, info.duration_secs)
            .map_err(|e| DoodleError::decode(e.to_string()))?;

        enter(ExtractState::Seeking);
        let rgba = self
            .decoder
            .first_frame(staged.path(), &info, deadline)
            .map_err(|e| load_error("first frame", e))?;
        let expected = Canvas {
            width: info.width,
            height: info.height,
        }
        .rgba_len();
        if rgba.len() < expected {
            return Err(DoodleError::decode(format!(
                "first frame has {} bytes, expected {expected}",
                rgba.len()
            )));
        }

        let image = encode_jpeg(
            &rgba[..expected],
            info.width,
            info.height,
            self.opts.jpeg_quality,
        )
        .map_err(|e| DoodleError::decode(e.to_string()))?;
        Ok(ExtractedFrame {
            image,
            mime_type: "image/jpeg",
            metadata,
        })
    }
}

fn load_error(step: &str, e: MediaError) -> DoodleError {
    if e.is_timeout() {
        DoodleError::load_timeout(format!("{step} did not finish in time"))
    } else {
        DoodleError::decode(format!("{step}: {e}"))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/extract/extractor.rs"]
mod tests;
