//! Encoding sinks.
//!
//! Sinks consume composited frames in timeline order, one push per captured tick.

/// `ffmpeg`-based sink (streams raw frames in, accumulates encoded chunks out).
pub mod ffmpeg;
/// Generic frame sink trait and built-in sinks.
pub mod sink;
