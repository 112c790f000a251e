//! Canvas encoding for preview transport and archival export.

use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::foundation::error::{StoryError, StoryResult};
use crate::render::surface::PixelCanvas;

/// Quality used for archival JPEG export.
pub const EXPORT_JPEG_QUALITY: u8 = 95;

/// Output encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossless PNG; used for previews.
    Png,
    /// Baseline JPEG at `quality` (1..=100); alpha is dropped.
    Jpeg {
        /// Encoder quality.
        quality: u8,
    },
}

impl OutputFormat {
    /// Archival default: JPEG at quality 95.
    pub const fn export_default() -> Self {
        Self::Jpeg {
            quality: EXPORT_JPEG_QUALITY,
        }
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg { .. } => "jpg",
        }
    }

    /// MIME type.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg { .. } => "image/jpeg",
        }
    }
}

/// Encoded raster buffer: what crosses the worker boundary and what export writes.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Encoding of `bytes`.
    pub format: OutputFormat,
    /// Canvas width.
    pub width: u32,
    /// Canvas height.
    pub height: u32,
    /// Encoded bytes.
    pub bytes: Arc<[u8]>,
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Encode a premultiplied canvas.
pub fn encode_canvas(canvas: &PixelCanvas, format: OutputFormat) -> StoryResult<EncodedImage> {
    let dims = canvas.dimensions();
    let rgba = image::RgbaImage::from_raw(dims.width, dims.height, canvas.to_straight_rgba8())
        .ok_or_else(|| StoryError::encode("canvas buffer does not match its dimensions"))?;
    let img = image::DynamicImage::ImageRgba8(rgba);

    let mut bytes = Vec::new();
    let written = match format {
        OutputFormat::Png => img
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .context("encode png"),
        OutputFormat::Jpeg { quality } => {
            let quality = quality.clamp(1, 100);
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, quality);
            image::DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(encoder)
                .context("encode jpeg")
        }
    };
    written.map_err(|e| StoryError::encode(format!("{e:#}")))?;

    Ok(EncodedImage {
        format,
        width: dims.width,
        height: dims.height,
        bytes: bytes.into(),
    })
}

#[cfg(test)]
#[path = "../tests/unit/encode/encode.rs"]
mod tests;
