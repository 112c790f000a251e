use vello_cpu::peniko::color::PremulRgba8;

use crate::foundation::core::Dimensions;
use crate::foundation::error::{StoryError, StoryResult};
use crate::foundation::math::unpremultiply_rgba8_in_place;

/// Premultiplied RGBA8 raster, row-major, no padding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelCanvas {
    dims: Dimensions,
    data: Vec<u8>,
}

impl PixelCanvas {
    /// Transparent canvas. Sides must fit the rasterizer's 16-bit limit.
    pub fn new(dims: Dimensions) -> StoryResult<Self> {
        let dims = dims.ensure_non_empty()?;
        pixmap_size(dims)?;
        let len = (dims.width as usize)
            .checked_mul(dims.height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| StoryError::validation("canvas buffer size overflow"))?;
        Ok(Self {
            dims,
            data: vec![0u8; len],
        })
    }

    /// Canvas size.
    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    /// Premultiplied pixels.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Premultiplied pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.dims.width || y >= self.dims.height {
            return None;
        }
        let i = (y as usize * self.dims.width as usize + x as usize) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// Straight-alpha RGBA8, as the image codecs expect.
    pub fn to_straight_rgba8(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        unpremultiply_rgba8_in_place(&mut out);
        out
    }
}

pub(crate) fn pixmap_size(dims: Dimensions) -> StoryResult<(u16, u16)> {
    let w: u16 = dims
        .width
        .try_into()
        .map_err(|_| StoryError::validation("pixmap width exceeds u16"))?;
    let h: u16 = dims
        .height
        .try_into()
        .map_err(|_| StoryError::validation("pixmap height exceeds u16"))?;
    Ok((w, h))
}

/// Rasterize with `vello_cpu` into a fresh transparent layer the size of `dims`.
pub(crate) fn render_layer(
    dims: Dimensions,
    draw: impl FnOnce(&mut vello_cpu::RenderContext),
) -> StoryResult<Vec<u8>> {
    let (w, h) = pixmap_size(dims)?;
    let mut ctx = vello_cpu::RenderContext::new(w, h);
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
    draw(&mut ctx);
    ctx.flush();
    let mut pixmap = vello_cpu::Pixmap::new(w, h);
    ctx.render_to_pixmap(&mut pixmap);
    Ok(pixmap.data_as_u8_slice().to_vec())
}

pub(crate) fn pixmap_from_premul_bytes(
    bytes: &[u8],
    dims: Dimensions,
) -> StoryResult<vello_cpu::Pixmap> {
    let (w, h) = pixmap_size(dims)?;
    if bytes.len() != (dims.width as usize) * (dims.height as usize) * 4 {
        return Err(StoryError::validation("pixmap byte len mismatch"));
    }
    let pixels: Vec<PremulRgba8> = bytes
        .chunks_exact(4)
        .map(|px| PremulRgba8::from_u8_array([px[0], px[1], px[2], px[3]]))
        .collect();
    let may_have_opacities = bytes.chunks_exact(4).any(|px| px[3] != 255);
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface.rs"]
mod tests;
