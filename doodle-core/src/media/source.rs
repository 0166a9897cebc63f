use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::time::Instant;

use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{DoodleError, DoodleResult};
use crate::media::error::MediaError;
use crate::media::probe::{VideoInfo, probe_video};
use crate::media::process::{Drain, drain, join_drain, kill_and_reap};

/// Playback state of a decode session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    /// Opened (and possibly seeked); not playing.
    Ready,
    /// Frames are being delivered by [`VideoSource::next_frame`].
    Playing,
    /// Playback stopped before the end (decoder failure mid-stream).
    Paused,
    /// The last frame has been delivered.
    Ended,
}

/// A decode session over one source video.
///
/// Frames are tightly packed RGBA8 at the source's native resolution, resampled to the
/// session's frame rate. Playback is pull-based: each call to [`VideoSource::next_frame`]
/// corresponds to one animation tick.
pub trait VideoSource {
    /// Intrinsic metadata.
    fn info(&self) -> &VideoInfo;

    /// Seek to time zero and return the frame presented there.
    ///
    /// `None` means the stream has no frames at all; the session is then `Ended`.
    fn seek_to_start(&mut self) -> DoodleResult<Option<&[u8]>>;

    /// Start playback from the current position.
    fn play(&mut self) -> DoodleResult<()>;

    /// The next frame while playing; `None` once the session is ended or paused.
    fn next_frame(&mut self) -> Option<&[u8]>;

    /// Presentation time of the current frame in seconds.
    fn current_time(&self) -> f64;

    /// Current playback state.
    fn state(&self) -> PlaybackState;

    /// Release the decoder. Called once the compositor is done with the source.
    fn close(&mut self) {}

    /// Native size of the decoded frames.
    fn canvas(&self) -> Canvas {
        let info = self.info();
        Canvas {
            width: info.width,
            height: info.height,
        }
    }
}

/// Pre-decoded frames held in memory.
#[derive(Debug)]
pub struct MemorySource {
    info: VideoInfo,
    fps: Fps,
    frames: Vec<Vec<u8>>,
    position: Option<usize>,
    pending_first: bool,
    state: PlaybackState,
}

impl MemorySource {
    /// Build a source from frames of `width*height*4` bytes each, presented at `fps`.
    pub fn new(width: u32, height: u32, fps: Fps, frames: Vec<Vec<u8>>) -> DoodleResult<Self> {
        let expected = Canvas { width, height }.rgba_len();
        if expected == 0 {
            return Err(DoodleError::source_load("source dimensions must be non-zero"));
        }
        if let Some(bad) = frames.iter().position(|f| f.len() != expected) {
            return Err(DoodleError::source_load(format!(
                "frame {bad} has {} bytes, expected {expected}",
                frames[bad].len()
            )));
        }
        Ok(Self {
            info: VideoInfo {
                width,
                height,
                duration_secs: fps.frames_to_secs(frames.len() as u64),
                frame_rate: Some(fps.as_f64()),
            },
            fps,
            frames,
            position: None,
            pending_first: false,
            state: PlaybackState::Ready,
        })
    }
}

impl VideoSource for MemorySource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn seek_to_start(&mut self) -> DoodleResult<Option<&[u8]>> {
        if self.frames.is_empty() {
            self.position = None;
            self.state = PlaybackState::Ended;
            return Ok(None);
        }
        self.position = Some(0);
        self.pending_first = true;
        self.state = PlaybackState::Ready;
        Ok(self.frames.first().map(Vec::as_slice))
    }

    fn play(&mut self) -> DoodleResult<()> {
        if self.position.is_none() && self.state != PlaybackState::Ended {
            self.seek_to_start()?;
        }
        if self.state == PlaybackState::Ready {
            self.state = PlaybackState::Playing;
        }
        Ok(())
    }

    fn next_frame(&mut self) -> Option<&[u8]> {
        if self.state != PlaybackState::Playing {
            return None;
        }
        let pos = self.position?;
        let next = if self.pending_first {
            self.pending_first = false;
            pos
        } else {
            pos + 1
        };
        if next >= self.frames.len() {
            self.state = PlaybackState::Ended;
            return None;
        }
        self.position = Some(next);
        self.frames.get(next).map(Vec::as_slice)
    }

    fn current_time(&self) -> f64 {
        self.position
            .map(|p| self.fps.frames_to_secs(p as u64))
            .unwrap_or(0.0)
    }

    fn state(&self) -> PlaybackState {
        self.state
    }
}

struct Decoder {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_drain: Drain,
}

enum ReadOutcome {
    Frame,
    Eof,
    Failed(String),
}

/// Streaming decode session backed by a system `ffmpeg` process.
///
/// Seeking to the start respawns the decoder; the process is killed on [`VideoSource::close`]
/// and on drop, so no decoder outlives its session.
pub struct FfmpegSource {
    path: PathBuf,
    info: VideoInfo,
    fps: Fps,
    decoder: Option<Decoder>,
    frame: Vec<u8>,
    position: Option<u64>,
    pending_first: bool,
    state: PlaybackState,
}

impl FfmpegSource {
    /// Probe `path` and prepare a session that decodes at `fps`.
    ///
    /// No decoder is running until [`VideoSource::seek_to_start`] or [`VideoSource::play`].
    pub fn open(path: &Path, fps: Fps, deadline: Option<Instant>) -> Result<Self, MediaError> {
        let info = probe_video(path, deadline)?;
        let frame = vec![0u8; Canvas { width: info.width, height: info.height }.rgba_len()];
        tracing::debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            duration = info.duration_secs,
            "opened ffmpeg decode session"
        );
        Ok(Self {
            path: path.to_path_buf(),
            info,
            fps,
            decoder: None,
            frame,
            position: None,
            pending_first: false,
            state: PlaybackState::Ready,
        })
    }

    fn spawn_decoder(&self) -> Result<Decoder, MediaError> {
        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(&self.path)
            .args([
                "-an",
                "-vf",
                &format!("fps={}/{}", self.fps.num, self.fps.den),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| MediaError::NotFound {
                program: "ffmpeg",
                source,
            })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("failed to open ffmpeg stdout"))?;
        let stderr_drain = drain(child.stderr.take());
        Ok(Decoder {
            child,
            stdout: BufReader::new(stdout),
            stderr_drain,
        })
    }

    fn read_next(&mut self) -> ReadOutcome {
        let Some(decoder) = self.decoder.as_mut() else {
            return ReadOutcome::Eof;
        };
        match decoder.stdout.read_exact(&mut self.frame) {
            Ok(()) => ReadOutcome::Frame,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.finish_decoder()
            }
            Err(e) => {
                self.stop_decoder();
                ReadOutcome::Failed(e.to_string())
            }
        }
    }

    /// Reap a decoder that reached end of stream, surfacing a failing exit status.
    fn finish_decoder(&mut self) -> ReadOutcome {
        let Some(mut decoder) = self.decoder.take() else {
            return ReadOutcome::Eof;
        };
        let status = decoder.child.wait();
        let stderr = join_drain(decoder.stderr_drain.take()).unwrap_or_default();
        match status {
            Ok(status) if status.success() => ReadOutcome::Eof,
            Ok(status) => ReadOutcome::Failed(format!(
                "ffmpeg exited with {status}: {}",
                String::from_utf8_lossy(&stderr).trim()
            )),
            Err(e) => ReadOutcome::Failed(e.to_string()),
        }
    }

    fn stop_decoder(&mut self) {
        if let Some(mut decoder) = self.decoder.take() {
            kill_and_reap(&mut decoder.child);
            let _ = join_drain(decoder.stderr_drain.take());
        }
    }
}

impl VideoSource for FfmpegSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn seek_to_start(&mut self) -> DoodleResult<Option<&[u8]>> {
        self.stop_decoder();
        self.decoder = Some(
            self.spawn_decoder()
                .map_err(|e| DoodleError::source_load(e.to_string()))?,
        );
        match self.read_next() {
            ReadOutcome::Frame => {
                self.position = Some(0);
                self.pending_first = true;
                self.state = PlaybackState::Ready;
                Ok(Some(&self.frame))
            }
            ReadOutcome::Eof => {
                self.position = None;
                self.state = PlaybackState::Ended;
                Ok(None)
            }
            ReadOutcome::Failed(msg) => Err(DoodleError::decode(msg)),
        }
    }

    fn play(&mut self) -> DoodleResult<()> {
        if self.position.is_none() && self.state != PlaybackState::Ended {
            self.seek_to_start()?;
        }
        if self.state == PlaybackState::Ready {
            self.state = PlaybackState::Playing;
        }
        Ok(())
    }

    fn next_frame(&mut self) -> Option<&[u8]> {
        if self.state != PlaybackState::Playing {
            return None;
        }
        let pos = self.position?;
        if self.pending_first {
            self.pending_first = false;
            return Some(&self.frame);
        }
        match self.read_next() {
            ReadOutcome::Frame => {
                self.position = Some(pos + 1);
                Some(&self.frame)
            }
            ReadOutcome::Eof => {
                self.state = PlaybackState::Ended;
                None
            }
            ReadOutcome::Failed(msg) => {
                tracing::warn!(error = %msg, path = %self.path.display(), "decoder stopped mid-stream");
                self.state = PlaybackState::Paused;
                None
            }
        }
    }

    fn current_time(&self) -> f64 {
        self.position
            .map(|p| self.fps.frames_to_secs(p))
            .unwrap_or(0.0)
    }

    fn state(&self) -> PlaybackState {
        self.state
    }

    fn close(&mut self) {
        self.stop_decoder();
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.stop_decoder();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/source.rs"]
mod tests;
