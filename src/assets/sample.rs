use crate::assets::decode::SourceImage;
use crate::foundation::core::Rgb8;
use crate::foundation::error::{StoryError, StoryResult};

/// Color under a point of the image as displayed in a `display_w` x `display_h` box.
///
/// The point is mapped back to source pixels and clamped to the image; the result is
/// un-premultiplied.
pub fn pick_color(
    image: &SourceImage,
    x: f64,
    y: f64,
    display_w: f64,
    display_h: f64,
) -> StoryResult<Rgb8> {
    if !(display_w.is_finite() && display_h.is_finite() && display_w > 0.0 && display_h > 0.0) {
        return Err(StoryError::validation("display size must be > 0"));
    }
    if !(x.is_finite() && y.is_finite()) {
        return Err(StoryError::validation("sample point must be finite"));
    }
    let dims = image.dimensions();
    let sx = (x * f64::from(dims.width) / display_w).floor();
    let sy = (y * f64::from(dims.height) / display_h).floor();
    let px = sx.clamp(0.0, f64::from(dims.width - 1)) as usize;
    let py = sy.clamp(0.0, f64::from(dims.height - 1)) as usize;

    let i = (py * dims.width as usize + px) * 4;
    let p = &image.pixels()[i..i + 4];
    let a = u32::from(p[3]);
    if a == 0 {
        return Ok(Rgb8::BLACK);
    }
    let un = |c: u8| ((u32::from(c) * 255 + a / 2) / a).min(255) as u8;
    Ok(Rgb8::new(un(p[0]), un(p[1]), un(p[2])))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/sample.rs"]
mod tests;
