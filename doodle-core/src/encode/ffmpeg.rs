use std::io::{Read, Write as _};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use crate::compose::surface::FrameRGBA;
use crate::encode::sink::{ComposedVideo, FrameSink, SinkConfig};
use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{DoodleError, DoodleResult};
use crate::foundation::math::mul_div255_u16;
use crate::media::process::{Drain, drain, join_drain, kill_and_reap, output_with_deadline};

const STDOUT_CHUNK: usize = 64 * 1024;

/// Container produced by an [`EncoderProfile`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Container {
    /// Fragmented MP4, writable to a non-seekable pipe.
    Mp4,
    /// WebM.
    WebM,
}

impl Container {
    /// File extension (no dot).
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::WebM => "webm",
        }
    }

    /// MIME type.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::WebM => "video/webm",
        }
    }

    fn muxer_args(self) -> &'static [&'static str] {
        match self {
            Self::Mp4 => &[
                "-movflags",
                "frag_keyframe+empty_moov+default_base_moof",
                "-f",
                "mp4",
            ],
            Self::WebM => &["-f", "webm"],
        }
    }
}

/// A codec/container pairing the local `ffmpeg` can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncoderProfile {
    /// `ffmpeg` encoder name.
    pub encoder: &'static str,
    /// Output container.
    pub container: Container,
    codec_args: &'static [&'static str],
}

/// Candidates in order of playback compatibility.
const PROFILES: &[EncoderProfile] = &[
    EncoderProfile {
        encoder: "libx264",
        container: Container::Mp4,
        codec_args: &["-preset", "veryfast", "-crf", "20", "-pix_fmt", "yuv420p"],
    },
    EncoderProfile {
        encoder: "libopenh264",
        container: Container::Mp4,
        codec_args: &["-b:v", "6M", "-pix_fmt", "yuv420p"],
    },
    EncoderProfile {
        encoder: "libvpx",
        container: Container::WebM,
        codec_args: &["-b:v", "6M", "-deadline", "realtime", "-pix_fmt", "yuv420p"],
    },
    EncoderProfile {
        encoder: "libvpx-vp9",
        container: Container::WebM,
        codec_args: &["-b:v", "0", "-crf", "32", "-deadline", "realtime", "-pix_fmt", "yuv420p"],
    },
    EncoderProfile {
        encoder: "mpeg4",
        container: Container::Mp4,
        codec_args: &["-q:v", "3", "-pix_fmt", "yuv420p"],
    },
];

impl EncoderProfile {
    /// Ask the local `ffmpeg` which encoders it has and pick the most compatible one.
    pub fn detect() -> DoodleResult<Self> {
        let out = output_with_deadline(
            "ffmpeg",
            Command::new("ffmpeg").args(["-hide_banner", "-encoders"]),
            None,
        )
        .and_then(|out| out.success_or("ffmpeg"))
        .map_err(|e| DoodleError::encoding(format!("encoder capability query failed: {e}")))?;
        let available = parse_encoder_list(&String::from_utf8_lossy(&out.stdout));
        let profile = Self::choose(&available).ok_or_else(|| {
            DoodleError::encoding("ffmpeg offers none of the supported video encoders")
        })?;
        tracing::debug!(encoder = profile.encoder, container = profile.container.extension(), "selected encoder profile");
        Ok(profile)
    }

    /// First candidate whose encoder appears in `available`.
    pub fn choose<S: AsRef<str>>(available: &[S]) -> Option<Self> {
        PROFILES
            .iter()
            .find(|p| available.iter().any(|a| a.as_ref() == p.encoder))
            .copied()
    }
}

/// Extract video encoder names from `ffmpeg -encoders` output.
pub(crate) fn parse_encoder_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip_while(|l| !l.trim_start().starts_with("---"))
        .skip(1)
        .filter_map(|l| {
            let mut parts = l.split_whitespace();
            let flags = parts.next()?;
            let name = parts.next()?;
            flags.starts_with('V').then(|| name.to_string())
        })
        .collect()
}

/// Options for [`FfmpegSink`].
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// Codec/container to produce.
    pub profile: EncoderProfile,
    /// Background color used to flatten alpha (RGBA8, straight alpha).
    pub bg_rgba: [u8; 4],
}

impl FfmpegSinkOpts {
    /// Create options for the given profile with a black background.
    pub fn new(profile: EncoderProfile) -> Self {
        Self {
            profile,
            bg_rgba: [0, 0, 0, 255],
        }
    }
}

/// Sink that spawns the system `ffmpeg`, streams raw frames to its stdin, and accumulates the
/// encoded container from its stdout.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout_drain: Option<JoinHandle<std::io::Result<Vec<Vec<u8>>>>>,
    stderr_drain: Drain,

    scratch: Vec<u8>,
    cfg: Option<SinkConfig>,
    last_idx: Option<FrameIndex>,
    output: Option<ComposedVideo>,
}

impl FfmpegSink {
    /// Create a new sink that streams into `ffmpeg`.
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stdout_drain: None,
            stderr_drain: None,
            scratch: Vec::new(),
            cfg: None,
            last_idx: None,
            output: None,
        }
    }

    /// Take the finished video produced by a successful `end`.
    pub fn take_output(&mut self) -> Option<ComposedVideo> {
        self.output.take()
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> DoodleResult<()> {
        if cfg.fps.num == 0 || cfg.fps.den == 0 {
            return Err(DoodleError::validation("fps must be non-zero"));
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(DoodleError::validation(
                "ffmpeg sink width/height must be non-zero",
            ));
        }
        if self.child.is_some() {
            return Err(DoodleError::encoding("ffmpeg sink already started"));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Input: raw RGBA8 frames, flattened to opaque in push_frame.
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
        ]);
        push_input_fps(&mut cmd, cfg.fps);
        cmd.args(["-i", "pipe:0", "-an"]);
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            // 4:2:0 chroma needs even dimensions; pad instead of scaling so pixels stay put.
            cmd.args(["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2"]);
        }
        cmd.args(["-c:v", self.opts.profile.encoder]);
        cmd.args(self.opts.profile.codec_args);
        cmd.args(self.opts.profile.container.muxer_args());
        cmd.arg("pipe:1");

        let mut child = cmd.spawn().map_err(|e| {
            DoodleError::encoding(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DoodleError::encoding("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| DoodleError::encoding("failed to open ffmpeg stdout (unexpected)"))?;
        let stdout_drain = std::thread::spawn(move || {
            let mut chunks = Vec::new();
            loop {
                let mut chunk = vec![0u8; STDOUT_CHUNK];
                let n = stdout.read(&mut chunk)?;
                if n == 0 {
                    break;
                }
                chunk.truncate(n);
                chunks.push(chunk);
            }
            Ok(chunks)
        });

        self.scratch = vec![0u8; (cfg.width * cfg.height * 4) as usize];
        self.stderr_drain = drain(child.stderr.take());
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stdout_drain = Some(stdout_drain);
        self.cfg = Some(cfg);
        self.last_idx = None;
        self.output = None;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> DoodleResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| DoodleError::encoding("ffmpeg sink not started"))?;
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(DoodleError::encoding(
                "ffmpeg sink received out-of-order frame index",
            ));
        }
        self.last_idx = Some(idx);

        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(DoodleError::encoding(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        if frame.data.len() != self.scratch.len() {
            return Err(DoodleError::encoding(
                "frame.data size mismatch with width*height*4",
            ));
        }

        flatten_premul_over_bg_to_opaque_rgba8(&mut self.scratch, &frame.data, self.opts.bg_rgba)?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(DoodleError::encoding("ffmpeg sink is already finalized"));
        };
        stdin.write_all(&self.scratch).map_err(|e| {
            DoodleError::encoding(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        Ok(())
    }

    fn end(&mut self) -> DoodleResult<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| DoodleError::encoding("ffmpeg sink not started"))?;

        let status = child.wait().map_err(|e| {
            DoodleError::encoding(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let chunks = match self.stdout_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| DoodleError::encoding("ffmpeg stdout drain thread panicked"))?
                .map_err(|e| DoodleError::encoding(format!("ffmpeg stdout read failed: {e}")))?,
            None => Vec::new(),
        };
        let stderr_bytes = join_drain(self.stderr_drain.take())
            .map_err(|e| DoodleError::encoding(format!("ffmpeg stderr read failed: {e}")))?;
        let cfg = self.cfg.take();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(DoodleError::encoding(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }

        let bytes = chunks.concat();
        if bytes.is_empty() {
            return Err(DoodleError::encoding("ffmpeg produced no output"));
        }
        tracing::debug!(
            bytes = bytes.len(),
            frames = self.last_idx.map(|i| i.0 + 1).unwrap_or(0),
            width = cfg.as_ref().map(|c| c.width),
            height = cfg.as_ref().map(|c| c.height),
            "encoder session finalized"
        );
        let container = self.opts.profile.container;
        self.output = Some(ComposedVideo {
            bytes,
            container_extension: container.extension().to_string(),
            mime_type: container.mime_type().to_string(),
        });
        Ok(())
    }

    fn abort(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            kill_and_reap(&mut child);
        }
        if let Some(handle) = self.stdout_drain.take() {
            let _ = handle.join();
        }
        let _ = join_drain(self.stderr_drain.take());
        self.cfg = None;
        self.output = None;
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.abort();
        }
    }
}

fn push_input_fps(cmd: &mut Command, fps: Fps) {
    // For rawvideo input, `-r` before `-i` sets the input framerate.
    cmd.args(["-r", &format!("{}/{}", fps.num, fps.den)]);
}

fn flatten_premul_over_bg_to_opaque_rgba8(
    dst: &mut [u8],
    src_premul: &[u8],
    bg_rgba: [u8; 4],
) -> DoodleResult<()> {
    if dst.len() != src_premul.len() || !dst.len().is_multiple_of(4) {
        return Err(DoodleError::encoding(
            "flatten_premul_over_bg_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    let bg_r = bg_rgba[0] as u16;
    let bg_g = bg_rgba[1] as u16;
    let bg_b = bg_rgba[2] as u16;

    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let a = s[3] as u16;
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }

        let inv = 255u16 - a;
        d[0] = (s[0] as u16 + mul_div255_u16(bg_r, inv)).min(255) as u8;
        d[1] = (s[1] as u16 + mul_div255_u16(bg_g, inv)).min(255) as u8;
        d[2] = (s[2] as u16 + mul_div255_u16(bg_b, inv)).min(255) as u8;
        d[3] = 255;
    }

    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
