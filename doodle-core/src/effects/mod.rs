/// Premultiplied RGBA8 blending.
pub mod composite;
