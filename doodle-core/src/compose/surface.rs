use crate::assets::decode::PreparedImage;
use crate::effects::composite::over_in_place;
use crate::foundation::core::Canvas;
use crate::foundation::error::{DoodleError, DoodleResult};

/// A composited frame as RGBA8 pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether the `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Transparent black frame.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; Canvas { width, height }.rgba_len()],
            premultiplied: true,
        }
    }
}

/// The single drawing surface shared by every composition phase.
///
/// Drawing is always full-frame source-over; the surface is never cleared between ticks.
#[derive(Debug)]
pub struct Surface {
    frame: FrameRGBA,
}

impl Surface {
    /// Create a transparent surface of `canvas` size.
    pub fn new(canvas: Canvas) -> DoodleResult<Self> {
        if canvas.width == 0 || canvas.height == 0 {
            return Err(DoodleError::validation("surface width/height must be non-zero"));
        }
        Ok(Self {
            frame: FrameRGBA::new(canvas.width, canvas.height),
        })
    }

    /// Surface dimensions.
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.frame.width,
            height: self.frame.height,
        }
    }

    /// Draw an image that has already been fitted to the surface.
    pub fn draw_image(&mut self, image: &PreparedImage, opacity: f32) -> DoodleResult<()> {
        if image.width != self.frame.width || image.height != self.frame.height {
            return Err(DoodleError::validation(format!(
                "image is {}x{}, surface is {}x{}",
                image.width, image.height, self.frame.width, self.frame.height
            )));
        }
        over_in_place(&mut self.frame.data, &image.rgba8_premul, opacity)
    }

    /// Draw a decoded video frame (opaque RGBA8 at surface size).
    pub fn draw_rgba(&mut self, rgba: &[u8], opacity: f32) -> DoodleResult<()> {
        over_in_place(&mut self.frame.data, rgba, opacity)
    }

    /// Current contents.
    pub fn frame(&self) -> &FrameRGBA {
        &self.frame
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compose/surface.rs"]
mod tests;
