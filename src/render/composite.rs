use crate::foundation::error::{StoryError, StoryResult};
use crate::foundation::math::mul_div255;

/// Premultiplied RGBA8 pixel.
pub type PremulRgba8 = [u8; 4];

/// Source-over of premultiplied pixels with an extra opacity multiplier.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }
    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = sa.saturating_add(mul_div255(u16::from(dst[3]), inv));
    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = sc.saturating_add(dc);
    }
    out
}

/// Source-over `src` onto `dst` pixel by pixel; both are premultiplied RGBA8 of equal length.
pub fn over_in_place(dst: &mut [u8], src: &[u8], opacity: f32) -> StoryResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(StoryError::validation(
            "over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        if s[3] == 255 && opacity >= 1.0 {
            d.copy_from_slice(s);
            continue;
        }
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], opacity);
        d.copy_from_slice(&out);
    }
    Ok(())
}

/// Composite one flat premultiplied color over every pixel.
pub fn tint_over_in_place(dst: &mut [u8], color: PremulRgba8, opacity: f32) {
    for d in dst.chunks_exact_mut(4) {
        let out = over([d[0], d[1], d[2], d[3]], color, opacity);
        d.copy_from_slice(&out);
    }
}

/// Scale every channel by the mask's alpha.
pub fn mask_apply_in_place(dst: &mut [u8], mask: &[u8]) -> StoryResult<()> {
    if dst.len() != mask.len() {
        return Err(StoryError::validation(
            "mask_apply_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, m) in dst.chunks_exact_mut(4).zip(mask.chunks_exact(4)) {
        let w = u16::from(m[3]);
        if w == 255 {
            continue;
        }
        for c in d.iter_mut() {
            *c = mul_div255(u16::from(*c), w);
        }
    }
    Ok(())
}

/// Overwrite every pixel with `color`.
pub fn fill(dst: &mut [u8], color: PremulRgba8) {
    for px in dst.chunks_exact_mut(4) {
        px.copy_from_slice(&color);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
