use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;
use base64::Engine as _;

use crate::foundation::error::{DoodleError, DoodleResult};

/// Largest upload accepted by default (500 MB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 500 * 1024 * 1024;

/// Immutable source video: bytes plus the declared MIME type and file name.
#[derive(Clone, Debug)]
pub struct VideoAsset {
    bytes: Vec<u8>,
    mime_type: String,
    file_name: String,
}

impl VideoAsset {
    /// Wrap caller-provided bytes.
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            file_name: file_name.into(),
        }
    }

    /// Read a file from disk, declaring its MIME type from the extension.
    pub fn from_path(path: &Path) -> DoodleResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read video '{}'", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime = MediaFormat::from_extension(&file_name).mime_type();
        Ok(Self::new(bytes, mime, file_name))
    }

    /// Raw encoded bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// MIME type declared by whoever produced the asset.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Original file name.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Best-effort container format, combining declared type, extension and magic bytes.
    pub fn format(&self) -> MediaFormat {
        MediaFormat::sniff(&self.mime_type, &self.file_name, &self.bytes)
    }

    /// Write the bytes to a temporary file so decoders can seek in them.
    ///
    /// The returned handle deletes the file when dropped.
    pub fn stage(&self) -> DoodleResult<StagedAsset> {
        let suffix = format!(".{}", self.format().extension());
        let mut file = tempfile::Builder::new()
            .prefix("doodle-src-")
            .suffix(&suffix)
            .tempfile()
            .context("create temporary file for video")?;
        file.write_all(&self.bytes)
            .context("write video to temporary file")?;
        file.flush().context("flush temporary video file")?;
        tracing::debug!(path = %file.path().display(), bytes = self.bytes.len(), "staged video asset");
        Ok(StagedAsset { file })
    }
}

/// A [`VideoAsset`] bound to a temporary file for the duration of a decode session.
#[derive(Debug)]
pub struct StagedAsset {
    file: tempfile::NamedTempFile,
}

impl StagedAsset {
    /// Filesystem path of the staged bytes.
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl Drop for StagedAsset {
    fn drop(&mut self) {
        tracing::debug!(path = %self.file.path().display(), "releasing staged video asset");
    }
}

/// Container formats the pipeline knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaFormat {
    /// MPEG-4 Part 14.
    Mp4,
    /// Apple QuickTime (`.mov`).
    QuickTime,
    /// WebM / Matroska.
    WebM,
    /// HEIF/HEIC container; needs server-side transcoding before frames can be read.
    Heif,
    /// Nothing recognizable.
    Unknown,
}

impl MediaFormat {
    /// Map a declared MIME type.
    pub fn from_mime(mime: &str) -> Self {
        match mime.trim().to_ascii_lowercase().as_str() {
            "video/mp4" | "video/x-m4v" => Self::Mp4,
            "video/quicktime" => Self::QuickTime,
            "video/webm" => Self::WebM,
            "image/heic" | "image/heif" | "image/heic-sequence" | "image/heif-sequence"
            | "video/heic" | "video/heif" => Self::Heif,
            _ => Self::Unknown,
        }
    }

    /// Map a file name's extension.
    pub fn from_extension(file_name: &str) -> Self {
        let ext = Path::new(file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "mp4" | "m4v" => Self::Mp4,
            "mov" | "qt" => Self::QuickTime,
            "webm" => Self::WebM,
            "heic" | "heif" => Self::Heif,
            _ => Self::Unknown,
        }
    }

    /// Map container magic bytes.
    pub fn from_magic(bytes: &[u8]) -> Self {
        match infer::get(bytes).map(|k| k.mime_type()) {
            Some("image/heif") | Some("image/heic") => Self::Heif,
            Some(mime) => Self::from_mime(mime),
            None => Self::Unknown,
        }
    }

    /// Combine all signals.
    ///
    /// Any HEIF signal wins so the transcoding check never depends on a decode attempt.
    /// Otherwise the declared type is preferred, then the extension, then the magic bytes.
    pub fn sniff(mime: &str, file_name: &str, bytes: &[u8]) -> Self {
        let declared = Self::from_mime(mime);
        let by_ext = Self::from_extension(file_name);
        let by_magic = Self::from_magic(bytes);
        if [declared, by_ext, by_magic].contains(&Self::Heif) {
            return Self::Heif;
        }
        [declared, by_ext, by_magic]
            .into_iter()
            .find(|f| *f != Self::Unknown)
            .unwrap_or(Self::Unknown)
    }

    /// `true` when the local media stack cannot open this container directly.
    pub fn requires_transcoding(self) -> bool {
        matches!(self, Self::Heif)
    }

    /// Canonical MIME type.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::QuickTime => "video/quicktime",
            Self::WebM => "video/webm",
            Self::Heif => "image/heif",
            Self::Unknown => "application/octet-stream",
        }
    }

    /// Canonical file extension (no dot).
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::QuickTime => "mov",
            Self::WebM => "webm",
            Self::Heif => "heic",
            Self::Unknown => "bin",
        }
    }
}

/// Check an incoming upload's declared type, name and size.
///
/// Accepted: mp4, quicktime, webm, heic/heif, or `application/octet-stream` when the
/// file name ends in `.heic`/`.heif` (some browsers do not know the HEIF MIME types).
pub fn validate_upload(
    mime: &str,
    file_name: &str,
    size: u64,
    max_bytes: u64,
) -> DoodleResult<MediaFormat> {
    if size == 0 {
        return Err(DoodleError::validation("no video file provided"));
    }
    if size > max_bytes {
        return Err(DoodleError::validation(format!(
            "file is {size} bytes, the limit is {max_bytes} bytes"
        )));
    }

    let declared = MediaFormat::from_mime(mime);
    if declared != MediaFormat::Unknown {
        return Ok(declared);
    }
    let is_octet_stream = mime.trim().eq_ignore_ascii_case("application/octet-stream");
    if is_octet_stream && MediaFormat::from_extension(file_name) == MediaFormat::Heif {
        return Ok(MediaFormat::Heif);
    }
    Err(DoodleError::validation(format!(
        "unsupported file type '{mime}' for '{file_name}'"
    )))
}

/// Decode a `data:<mime>;base64,<payload>` URL into its MIME type and bytes.
pub fn parse_data_url(url: &str) -> DoodleResult<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| DoodleError::validation("data URL must start with 'data:'"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| DoodleError::validation("data URL has no payload separator"))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| DoodleError::validation("data URL must be base64 encoded"))?;
    if mime.is_empty() {
        return Err(DoodleError::validation("data URL has no media type"));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| DoodleError::validation(format!("data URL payload is not base64: {e}")))?;
    if bytes.is_empty() {
        return Err(DoodleError::validation("data URL payload is empty"));
    }
    Ok((mime.to_string(), bytes))
}

/// Encode bytes as a base64 data URL.
pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{mime};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

#[cfg(test)]
#[path = "../../tests/unit/assets/asset.rs"]
mod tests;
