use crate::foundation::error::{DoodleError, DoodleResult};
use crate::foundation::math::{mul_div255_u8, opacity_to_u8};

/// One premultiplied RGBA8 pixel.
pub type PremulRgba8 = [u8; 4];

/// Source-over of one premultiplied pixel at `opacity`.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    over_with_coverage(dst, src, opacity_to_u8(opacity))
}

fn over_with_coverage(dst: PremulRgba8, src: PremulRgba8, coverage: u16) -> PremulRgba8 {
    if coverage == 0 || src[3] == 0 {
        return dst;
    }
    if coverage == 255 && src[3] == 255 {
        return src;
    }
    let src_alpha = mul_div255_u8(u16::from(src[3]), coverage);
    if src_alpha == 0 {
        return dst;
    }
    let keep = 255 - u16::from(src_alpha);
    let mut out = [0u8; 4];
    for (c, o) in out.iter_mut().enumerate() {
        // Alpha scales by coverage like the colour channels do.
        let s = mul_div255_u8(u16::from(src[c]), coverage);
        let d = mul_div255_u8(u16::from(dst[c]), keep);
        *o = s.saturating_add(d);
    }
    out
}

/// Source-over of a whole frame onto `dst` at a uniform `opacity`.
///
/// Both buffers are tightly packed premultiplied RGBA8 of the same size.
pub fn over_in_place(dst: &mut [u8], src: &[u8], opacity: f32) -> DoodleResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(DoodleError::validation(format!(
            "cannot blend {} bytes onto a {} byte frame",
            src.len(),
            dst.len()
        )));
    }
    let coverage = opacity_to_u8(opacity);
    if coverage == 0 {
        return Ok(());
    }
    // Decoded video frames are opaque; a full-strength draw is then a copy.
    if coverage == 255 && src.chunks_exact(4).all(|px| px[3] == 255) {
        dst.copy_from_slice(src);
        return Ok(());
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let out = over_with_coverage([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], coverage);
        d.copy_from_slice(&out);
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/effects/composite.rs"]
mod tests;
