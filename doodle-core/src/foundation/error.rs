/// Convenience result type used across the crate.
pub type DoodleResult<T> = Result<T, DoodleError>;

/// Top-level error taxonomy shared by the extractor, the stylization client and the compositor.
#[derive(thiserror::Error, Debug)]
pub enum DoodleError {
    /// The input needs container-level decoding the local media stack does not offer.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The decode session did not produce data before the load deadline.
    #[error("load timeout: {0}")]
    LoadTimeout(String),

    /// The decoder ran but could not produce a usable frame.
    #[error("decode error: {0}")]
    Decode(String),

    /// The stylization provider returned a non-2xx status, a malformed body, or an unknown shape.
    #[error("provider error: {0}")]
    Provider(String),

    /// A stylization task stayed non-terminal for every allowed poll.
    #[error("poll timeout exceeded after {attempts} attempts")]
    PollTimeoutExceeded {
        /// Number of polls issued before giving up.
        attempts: u32,
    },

    /// The cover image could not be fetched or decoded.
    #[error("cover load error: {0}")]
    CoverLoad(String),

    /// The encoder session failed; any partial output has been discarded.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The source video decode session could not be opened.
    #[error("source load error: {0}")]
    SourceLoad(String),

    /// Bad request shape, size or type.
    #[error("validation error: {0}")]
    Validation(String),

    /// The operation was cancelled by its owner.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DoodleError {
    /// Build a [`DoodleError::UnsupportedFormat`] value.
    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    /// Build a [`DoodleError::LoadTimeout`] value.
    pub fn load_timeout(msg: impl Into<String>) -> Self {
        Self::LoadTimeout(msg.into())
    }

    /// Build a [`DoodleError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`DoodleError::Provider`] value.
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Build a [`DoodleError::CoverLoad`] value.
    pub fn cover_load(msg: impl Into<String>) -> Self {
        Self::CoverLoad(msg.into())
    }

    /// Build a [`DoodleError::Encoding`] value.
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    /// Build a [`DoodleError::SourceLoad`] value.
    pub fn source_load(msg: impl Into<String>) -> Self {
        Self::SourceLoad(msg.into())
    }

    /// Build a [`DoodleError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`DoodleError::Cancelled`] value.
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Stable machine-readable code for this error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            Self::LoadTimeout(_) => "LOAD_TIMEOUT",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Provider(_) => "PROVIDER_ERROR",
            Self::PollTimeoutExceeded { .. } => "POLL_TIMEOUT_EXCEEDED",
            Self::CoverLoad(_) => "COVER_LOAD_ERROR",
            Self::Encoding(_) => "ENCODING_ERROR",
            Self::SourceLoad(_) => "SOURCE_LOAD_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Cancelled(_) => "CANCELLED",
            Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// `true` for errors caused by waiting too long rather than by an outright failure.
    ///
    /// Retrying a timed-out operation is often worthwhile; retrying an outright failure
    /// with the same input usually is not.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::LoadTimeout(_) | Self::PollTimeoutExceeded { .. })
    }

    /// Human-readable message suitable for showing to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => {
                "This video format can't be processed here. Please convert it to MP4 and try again."
            }
            Self::LoadTimeout(_) => {
                "Loading the video took too long. Please try again, or try a shorter clip."
            }
            Self::Decode(_) => "We couldn't read a frame from this video. The file may be damaged.",
            Self::Provider(_) => "The stylization service returned an unexpected response.",
            Self::PollTimeoutExceeded { .. } => {
                "The stylization is taking longer than expected. Please try again in a moment."
            }
            Self::CoverLoad(_) => "The generated cover image couldn't be loaded.",
            Self::Encoding(_) => "Encoding the final video failed.",
            Self::SourceLoad(_) => "The original video couldn't be opened for composition.",
            Self::Validation(_) => "The request was invalid. Please check the file and try again.",
            Self::Cancelled(_) => "The operation was cancelled.",
            Self::Other(_) => "Something went wrong. Please try again.",
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
