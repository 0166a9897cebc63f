//! Source assets: the uploaded video and decoded still images.

/// Video bytes, format sniffing, upload validation and temporary staging.
pub mod asset;
/// Still-image decode/encode helpers.
pub mod decode;
