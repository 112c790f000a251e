//! Drawing primitives over a [`PixelCanvas`].
//!
//! Every vector draw goes through a fresh `vello_cpu` layer that is then composited with the
//! premultiplied helpers, so the canvas itself is only ever touched by plain pixel code.

use vello_cpu::kurbo::{Affine, BezPath, Point};

use crate::assets::decode::SourceImage;
use crate::foundation::core::{PixelRect, Rgb8};
use crate::foundation::error::StoryResult;
use crate::render::blur::blur_rgba8_premul;
use crate::render::composite::{fill, mask_apply_in_place, over_in_place, tint_over_in_place};
use crate::render::surface::{PixelCanvas, render_layer};

/// Alpha of the dark overlay laid over the blurred cover background.
pub const COVER_OVERLAY_ALPHA: f32 = 0.15;

/// Flat fill.
pub fn draw_solid(canvas: &mut PixelCanvas, color: Rgb8) {
    fill(canvas.data_mut(), color.to_premul_rgba8());
}

/// Paint `image` stretched into `rect`.
pub fn draw_image(ctx: &mut vello_cpu::RenderContext, image: &SourceImage, rect: PixelRect) {
    let dims = image.dimensions();
    let sx = f64::from(rect.width) / f64::from(dims.width);
    let sy = f64::from(rect.height) / f64::from(dims.height);
    let origin = Affine::translate((f64::from(rect.x), f64::from(rect.y)));
    ctx.set_transform(origin * Affine::scale_non_uniform(sx, sy));
    ctx.set_paint_transform(Affine::IDENTITY);
    ctx.set_paint(image.paint());
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
        0.0,
        0.0,
        f64::from(dims.width),
        f64::from(dims.height),
    ));
}

fn blurred_image_layer(
    canvas: &PixelCanvas,
    image: &SourceImage,
    rect: PixelRect,
    blur_px: u32,
) -> StoryResult<Vec<u8>> {
    let dims = canvas.dimensions();
    let layer = render_layer(dims, |ctx| draw_image(ctx, image, rect))?;
    blur_rgba8_premul(&layer, dims.width, dims.height, blur_px as f32)
}

/// Cover-fit `image` at `cover`, blur it, then darken with the fixed overlay.
pub fn draw_cover_blur(
    canvas: &mut PixelCanvas,
    image: &SourceImage,
    cover: PixelRect,
    blur_px: u32,
) -> StoryResult<()> {
    let layer = blurred_image_layer(canvas, image, cover, blur_px)?;
    over_in_place(canvas.data_mut(), &layer, 1.0)?;
    tint_over_in_place(
        canvas.data_mut(),
        Rgb8::BLACK.to_premul_rgba8(),
        COVER_OVERLAY_ALPHA,
    );
    Ok(())
}

/// Fill with `base`, then a blurred copy of `image` at the foreground rectangle.
pub fn draw_ambient(
    canvas: &mut PixelCanvas,
    image: &SourceImage,
    base: Rgb8,
    foreground: PixelRect,
    blur_px: u32,
) -> StoryResult<()> {
    draw_solid(canvas, base);
    let layer = blurred_image_layer(canvas, image, foreground, blur_px)?;
    over_in_place(canvas.data_mut(), &layer, 1.0)
}

/// Rounded rectangle with quadratic corners. The radius is clamped to half the shorter side.
pub fn rounded_rect_path(rect: PixelRect, radius: f64) -> BezPath {
    let r = rect.to_kurbo();
    let radius = radius.clamp(0.0, r.width().min(r.height()) / 2.0);
    let (x0, y0, x1, y1) = (r.x0, r.y0, r.x1, r.y1);

    let mut p = BezPath::new();
    p.move_to(Point::new(x0 + radius, y0));
    p.line_to(Point::new(x1 - radius, y0));
    p.quad_to(Point::new(x1, y0), Point::new(x1, y0 + radius));
    p.line_to(Point::new(x1, y1 - radius));
    p.quad_to(Point::new(x1, y1), Point::new(x1 - radius, y1));
    p.line_to(Point::new(x0 + radius, y1));
    p.quad_to(Point::new(x0, y1), Point::new(x0, y1 - radius));
    p.line_to(Point::new(x0, y0 + radius));
    p.quad_to(Point::new(x0, y0), Point::new(x0 + radius, y0));
    p.close_path();
    p
}

/// Run `draw` clipped to a rounded `rect`. A zero radius draws unclipped.
pub fn clip_rounded_foreground(
    canvas: &mut PixelCanvas,
    rect: PixelRect,
    radius_px: u32,
    draw: impl FnOnce(&mut vello_cpu::RenderContext),
) -> StoryResult<()> {
    let dims = canvas.dimensions();
    let mut layer = render_layer(dims, draw)?;
    if radius_px > 0 {
        let path = rounded_rect_path(rect, f64::from(radius_px));
        let mask = render_layer(dims, |ctx| {
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(255, 255, 255, 255));
            ctx.fill_path(&path);
        })?;
        mask_apply_in_place(&mut layer, &mask)?;
    }
    over_in_place(canvas.data_mut(), &layer, 1.0)
}

#[cfg(test)]
#[path = "../../tests/unit/render/draw.rs"]
mod tests;
