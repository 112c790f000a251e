//! Pure layout math: canvas size, blur and radius in pixels, and draw rectangles.

use crate::foundation::core::{Dimensions, PixelRect, Rgb8};
use crate::foundation::error::StoryResult;
use crate::foundation::math::round_px;
use crate::params::{BackgroundKind, CompositingParameters, CornerRadius};

/// Target canvas aspect ratio, width / height.
pub const TARGET_ASPECT_RATIO: f64 = 9.0 / 21.0;

/// Pad the source to the target aspect ratio without shrinking either side.
///
/// Wider-than-target sources keep their width and gain height; taller ones keep their height
/// and gain width.
pub fn canvas_dimensions(src: Dimensions) -> StoryResult<Dimensions> {
    let src = src.ensure_non_empty()?;
    let w = f64::from(src.width);
    let h = f64::from(src.height);
    if w / h > TARGET_ASPECT_RATIO {
        let height = round_px(w / TARGET_ASPECT_RATIO).max(src.height);
        Ok(Dimensions::new(src.width, height))
    } else {
        let width = round_px(h * TARGET_ASPECT_RATIO).max(src.width);
        Ok(Dimensions::new(width, src.height))
    }
}

/// `round(percent / 100 * min(w, h))`.
pub fn blur_pixels(blur_percent: f64, image: Dimensions) -> u32 {
    round_px(blur_percent / 100.0 * f64::from(image.shorter_side()))
}

/// Radius for a tier, against the shorter side of the scaled foreground. Tier `None` is 0.
pub fn border_radius_pixels(tier: CornerRadius, foreground: Dimensions) -> u32 {
    if tier == CornerRadius::None {
        return 0;
    }
    round_px(f64::from(foreground.shorter_side()) * tier.percent() / 100.0)
}

/// Downscale so the longer side fits `max_dimension`. Never upscales; sides stay >= 1.
pub fn capped_dimensions(image: Dimensions, max_dimension: Option<u32>) -> Dimensions {
    let Some(cap) = max_dimension else {
        return image;
    };
    let longer = image.longer_side();
    if cap == 0 || longer <= cap {
        return image;
    }
    let s = f64::from(cap) / f64::from(longer);
    Dimensions::new(
        round_px(f64::from(image.width) * s).max(1),
        round_px(f64::from(image.height) * s).max(1),
    )
}

/// Centered rectangle of `image * scale` inside `canvas`.
pub fn foreground_rect(canvas: Dimensions, image: Dimensions, scale: f64) -> PixelRect {
    let w = round_px(f64::from(image.width) * scale).max(1);
    let h = round_px(f64::from(image.height) * scale).max(1);
    centered(canvas, w, h)
}

/// Cover-fit rectangle: the image scaled to fill `canvas`, centered, overflow allowed.
pub fn cover_rect(canvas: Dimensions, image: Dimensions) -> PixelRect {
    let s = (f64::from(canvas.width) / f64::from(image.width.max(1)))
        .max(f64::from(canvas.height) / f64::from(image.height.max(1)));
    let w = round_px(f64::from(image.width) * s).max(canvas.width);
    let h = round_px(f64::from(image.height) * s).max(canvas.height);
    centered(canvas, w, h)
}

fn centered(canvas: Dimensions, w: u32, h: u32) -> PixelRect {
    let x = ((f64::from(canvas.width) - f64::from(w)) / 2.0).round() as i32;
    let y = ((f64::from(canvas.height) - f64::from(h)) / 2.0).round() as i32;
    PixelRect::new(x, y, w, h)
}

/// Resolved background for one render.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BackgroundPlan {
    /// Blurred cover-fit image plus the dark overlay.
    CoverBlur {
        /// Cover rectangle on the canvas.
        rect: PixelRect,
        /// Blur in pixels.
        blur_px: u32,
    },
    /// Flat fill.
    Solid(Rgb8),
    /// Base fill plus blurred duplicate at the foreground rectangle.
    Ambient {
        /// Base fill.
        base: Rgb8,
        /// Glow rectangle; always the foreground rectangle.
        rect: PixelRect,
        /// Blur in pixels.
        blur_px: u32,
    },
}

/// Every number the drawing step needs, computed up front.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompositeLayout {
    /// Image size after the quality cap.
    pub image: Dimensions,
    /// Output canvas.
    pub canvas: Dimensions,
    /// Sharp foreground rectangle.
    pub foreground: PixelRect,
    /// Foreground corner radius in pixels.
    pub radius_px: u32,
    /// Background treatment.
    pub background: BackgroundPlan,
}

impl CompositeLayout {
    /// Rectangle the glow layer is drawn at, when the background is ambient.
    pub fn glow_rect(&self) -> Option<PixelRect> {
        match self.background {
            BackgroundPlan::Ambient { rect, .. } => Some(rect),
            _ => None,
        }
    }
}

/// Lay out one render from the image's natural size and the parameters.
pub fn plan_layout(
    natural: Dimensions,
    params: &CompositingParameters,
) -> StoryResult<CompositeLayout> {
    let natural = natural.ensure_non_empty()?;
    params.validate()?;

    let image = capped_dimensions(natural, params.max_dimension);
    let canvas = canvas_dimensions(image)?;
    let foreground = foreground_rect(canvas, image, params.scale);
    let blur_px = blur_pixels(params.blur_percent, image);
    let radius_px = border_radius_pixels(params.corner_radius, foreground.dimensions());

    let background = match params.background {
        BackgroundKind::CoverBlur => BackgroundPlan::CoverBlur {
            rect: cover_rect(canvas, image),
            blur_px,
        },
        BackgroundKind::AmbientGlow => BackgroundPlan::Ambient {
            base: params.ambient_color(),
            rect: foreground,
            blur_px,
        },
        BackgroundKind::FlatBlack | BackgroundKind::FlatWhite | BackgroundKind::CustomColor => {
            BackgroundPlan::Solid(params.solid_color().unwrap_or(Rgb8::BLACK))
        }
    };

    Ok(CompositeLayout {
        image,
        canvas,
        foreground,
        radius_px,
        background,
    })
}

#[cfg(test)]
#[path = "../tests/unit/geometry/geometry.rs"]
mod tests;
