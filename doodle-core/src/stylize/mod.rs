//! Client for the remote image stylization service.

/// Transport, submission and bounded polling.
pub mod client;
/// Canonical task model and provider response normalization.
pub mod task;
