use std::sync::Arc;

use anyhow::Context;

use crate::foundation::core::Canvas;
use crate::foundation::error::DoodleResult;

/// A decoded still image, premultiplied RGBA8.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Tightly packed premultiplied RGBA8 bytes.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl PreparedImage {
    /// Stretch to exactly `canvas`, returning `self` unchanged when sizes already match.
    pub fn fit_to(&self, canvas: Canvas) -> DoodleResult<PreparedImage> {
        if self.width == canvas.width && self.height == canvas.height {
            return Ok(self.clone());
        }
        let src = image::RgbaImage::from_raw(self.width, self.height, (*self.rgba8_premul).clone())
            .context("prepared image buffer does not match its dimensions")?;
        let scaled = image::imageops::resize(
            &src,
            canvas.width,
            canvas.height,
            image::imageops::FilterType::Triangle,
        );
        Ok(PreparedImage {
            width: canvas.width,
            height: canvas.height,
            rgba8_premul: Arc::new(scaled.into_raw()),
        })
    }
}

/// Decode encoded image bytes and convert to premultiplied RGBA8.
pub fn decode_image(bytes: &[u8]) -> DoodleResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

/// Encode straight RGBA8 pixels as a JPEG at `quality` (1..=100), dropping alpha.
pub fn encode_jpeg(rgba: &[u8], width: u32, height: u32, quality: u8) -> DoodleResult<Vec<u8>> {
    let rgb: Vec<u8> = rgba
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();
    let mut out = Vec::new();
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    encoder
        .encode(&rgb, width, height, image::ExtendedColorType::Rgb8)
        .context("encode jpeg")?;
    Ok(out)
}

pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 255 {
            continue;
        }
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
