use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::assets::asset::to_data_url;
use crate::foundation::error::{DoodleError, DoodleResult};
use crate::foundation::math::gcd;

/// Display aspect ratio, snapped to a canonical ratio when close enough.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AspectRatio {
    /// `16:9` landscape.
    Landscape16x9,
    /// `9:16` portrait.
    Portrait9x16,
    /// `4:3`.
    Standard4x3,
    /// `1:1`.
    Square,
    /// Any other ratio, already reduced by the GCD.
    Other {
        /// Reduced width term.
        width: u32,
        /// Reduced height term.
        height: u32,
    },
}

/// Candidate ratios in the order they are checked, with their tolerance.
const CANONICAL: [(AspectRatio, f64, f64); 4] = [
    (AspectRatio::Landscape16x9, 16.0 / 9.0, 0.1),
    (AspectRatio::Portrait9x16, 9.0 / 16.0, 0.1),
    (AspectRatio::Standard4x3, 4.0 / 3.0, 0.1),
    (AspectRatio::Square, 1.0, 0.01),
];

impl AspectRatio {
    /// Classify `width x height`. Both must be non-zero.
    ///
    /// The pair is reduced by its GCD; the first canonical ratio within tolerance wins,
    /// otherwise the reduced pair is kept verbatim.
    pub fn from_dimensions(width: u32, height: u32) -> DoodleResult<Self> {
        if width == 0 || height == 0 {
            return Err(DoodleError::validation(format!(
                "aspect ratio needs non-zero dimensions, got {width}x{height}"
            )));
        }
        let d = gcd(width, height);
        let (rw, rh) = (width / d, height / d);
        let ratio = f64::from(rw) / f64::from(rh);

        Ok(CANONICAL
            .iter()
            .find(|(_, target, tolerance)| (ratio - target).abs() <= *tolerance)
            .map(|(ar, _, _)| *ar)
            .unwrap_or(Self::Other {
                width: rw,
                height: rh,
            }))
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Landscape16x9 => f.write_str("16:9"),
            Self::Portrait9x16 => f.write_str("9:16"),
            Self::Standard4x3 => f.write_str("4:3"),
            Self::Square => f.write_str("1:1"),
            Self::Other { width, height } => write!(f, "{width}:{height}"),
        }
    }
}

impl FromStr for AspectRatio {
    type Err = DoodleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| DoodleError::validation(format!("aspect ratio '{s}' is not W:H")))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| DoodleError::validation(format!("aspect ratio '{s}' is not W:H")))
        };
        // Same reduction and snapping as measured dimensions.
        Self::from_dimensions(parse(w)?, parse(h)?)
    }
}

impl Serialize for AspectRatio {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AspectRatio {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Intrinsic metadata of a source video.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMetadata {
    /// Display width in pixels.
    pub width: u32,
    /// Display height in pixels.
    pub height: u32,
    /// Duration in seconds, `0.0` when unknown.
    pub duration_seconds: f64,
    /// Classified aspect ratio.
    pub aspect_ratio: AspectRatio,
}

impl FrameMetadata {
    /// Build metadata, enforcing non-zero dimensions and a non-negative duration.
    pub fn new(width: u32, height: u32, duration_seconds: f64) -> DoodleResult<Self> {
        let aspect_ratio = AspectRatio::from_dimensions(width, height)?;
        let duration_seconds = if duration_seconds.is_finite() {
            duration_seconds.max(0.0)
        } else {
            0.0
        };
        Ok(Self {
            width,
            height,
            duration_seconds,
            aspect_ratio,
        })
    }
}

/// First frame of a video as an encoded still image.
#[derive(Clone, Debug)]
pub struct ExtractedFrame {
    /// Encoded still image.
    pub image: Vec<u8>,
    /// MIME type of `image`.
    pub mime_type: &'static str,
    /// Metadata of the source video.
    pub metadata: FrameMetadata,
}

impl ExtractedFrame {
    /// `data:` URL of the still image, as accepted by the stylize endpoint.
    pub fn to_data_url(&self) -> String {
        to_data_url(self.mime_type, &self.image)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/extract/metadata.rs"]
mod tests;
