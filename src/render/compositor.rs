use crate::assets::decode::SourceImage;
use crate::encode::{EncodedImage, OutputFormat, encode_canvas};
use crate::foundation::error::StoryResult;
use crate::geometry::{BackgroundPlan, CompositeLayout, plan_layout};
use crate::params::CompositingParameters;
use crate::render::draw::{
    clip_rounded_foreground, draw_ambient, draw_cover_blur, draw_image, draw_solid,
};
use crate::render::surface::PixelCanvas;

/// Render one story canvas from a decoded image.
///
/// Pure in its inputs: the same image and parameters always give the same pixels.
#[tracing::instrument(
    skip(image, params),
    fields(width = image.dimensions().width, height = image.dimensions().height)
)]
pub fn render_canvas(
    image: &SourceImage,
    params: &CompositingParameters,
) -> StoryResult<(CompositeLayout, PixelCanvas)> {
    let layout = plan_layout(image.dimensions(), params)?;
    let mut canvas = PixelCanvas::new(layout.canvas)?;

    match layout.background {
        BackgroundPlan::CoverBlur { rect, blur_px } => {
            draw_cover_blur(&mut canvas, image, rect, blur_px)?;
        }
        BackgroundPlan::Ambient {
            base,
            rect,
            blur_px,
        } => {
            draw_ambient(&mut canvas, image, base, rect, blur_px)?;
        }
        BackgroundPlan::Solid(color) => draw_solid(&mut canvas, color),
    }

    let fg = layout.foreground;
    clip_rounded_foreground(&mut canvas, fg, layout.radius_px, |ctx| {
        draw_image(ctx, image, fg)
    })?;

    tracing::debug!(canvas = ?layout.canvas, radius_px = layout.radius_px, "composited canvas");
    Ok((layout, canvas))
}

/// Render and encode. Preview and export both come through here; they differ only in
/// `params.max_dimension` and `format`.
pub fn composite(
    image: &SourceImage,
    params: &CompositingParameters,
    format: OutputFormat,
) -> StoryResult<EncodedImage> {
    let (_, canvas) = render_canvas(image, params)?;
    encode_canvas(&canvas, format)
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
