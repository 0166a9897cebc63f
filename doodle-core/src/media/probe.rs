use std::path::Path;
use std::process::Command;
use std::time::Instant;

use serde::Deserialize;

use crate::media::error::MediaError;
use crate::media::process::output_with_deadline;

/// Intrinsic metadata of a source video.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoInfo {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Duration in seconds; `0.0` when the container does not report one.
    pub duration_secs: f64,
    /// Average frame rate of the video stream, when known.
    pub frame_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    /// e.g. "30/1" or "24000/1001"
    avg_frame_rate: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
    #[serde(default)]
    tags: ProbeTags,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Probe source video metadata through `ffprobe`, giving up at `deadline`.
pub fn probe_video(path: &Path, deadline: Option<Instant>) -> Result<VideoInfo, MediaError> {
    let mut cmd = Command::new("ffprobe");
    cmd.args([
        "-v",
        "error",
        "-print_format",
        "json",
        "-show_streams",
        "-show_format",
    ])
    .arg(path);

    let out = output_with_deadline("ffprobe", &mut cmd, deadline)?.success_or("ffprobe")?;
    parse_probe_json(&out.stdout)
}

pub(crate) fn parse_probe_json(stdout: &[u8]) -> Result<VideoInfo, MediaError> {
    let parsed: ProbeOut = serde_json::from_slice(stdout).map_err(|e| MediaError::Parse {
        program: "ffprobe",
        msg: e.to_string(),
    })?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| MediaError::Parse {
            program: "ffprobe",
            msg: "no video stream found".into(),
        })?;

    let (width, height) = match (video.width, video.height) {
        // ffmpeg autorotates decoded frames, so report the displayed size.
        (Some(w), Some(h)) if w > 0 && h > 0 && is_quarter_turn(rotation_degrees(video)) => {
            (h, w)
        }
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(MediaError::Parse {
                program: "ffprobe",
                msg: "video stream has no usable dimensions".into(),
            });
        }
    };

    let duration_secs = video
        .duration
        .as_deref()
        .and_then(parse_seconds)
        .or_else(|| {
            parsed
                .format
                .as_ref()
                .and_then(|f| f.duration.as_deref())
                .and_then(parse_seconds)
        })
        .unwrap_or(0.0);

    Ok(VideoInfo {
        width,
        height,
        duration_secs,
        frame_rate: video.avg_frame_rate.as_deref().and_then(parse_rational),
    })
}

/// Display rotation from the display matrix side data, falling back to the legacy `rotate` tag.
fn rotation_degrees(stream: &ProbeStream) -> f64 {
    stream
        .side_data_list
        .iter()
        .find_map(|d| d.rotation)
        .or_else(|| stream.tags.rotate.as_deref().and_then(|r| r.trim().parse().ok()))
        .unwrap_or(0.0)
}

fn is_quarter_turn(degrees: f64) -> bool {
    let normalized = degrees.rem_euclid(360.0).round() as i64;
    normalized == 90 || normalized == 270
}

/// Parse ffprobe's decimal seconds; "N/A" and negatives are treated as unknown.
fn parse_seconds(s: &str) -> Option<f64> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Parse "30000/1001"-style rationals. `0/0` is ffprobe's "unknown".
fn parse_rational(s: &str) -> Option<f64> {
    let (num, den) = s.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 || num <= 0.0 {
        return None;
    }
    Some(num / den)
}

#[cfg(test)]
#[path = "../../tests/unit/media/probe.rs"]
mod tests;
