use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use base64::{Engine as _, engine::general_purpose};

use crate::foundation::core::Dimensions;
use crate::foundation::error::{StoryError, StoryResult};
use crate::foundation::math::premultiply_rgba8_in_place;
use crate::geometry::capped_dimensions;
use crate::render::surface::pixmap_from_premul_bytes;

/// Default cap on the longer side of a decoded original.
pub const MAX_SOURCE_DIMENSION: u32 = 4096;

/// Where the encoded bytes of a source image come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageSource {
    /// Encoded image bytes (PNG, JPEG, ...).
    Encoded(Arc<[u8]>),
    /// `data:<mime>;base64,<payload>` URI.
    DataUri(Arc<str>),
    /// Path to an encoded image on disk.
    File(PathBuf),
}

impl ImageSource {
    /// Wrap encoded bytes.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::Encoded(bytes.into())
    }

    /// Wrap a data URI.
    pub fn data_uri(uri: impl Into<Arc<str>>) -> Self {
        Self::DataUri(uri.into())
    }

    /// Wrap a file path.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Encoded bytes, reading or base64-decoding as needed.
    pub fn read_bytes(&self) -> StoryResult<Cow<'_, [u8]>> {
        match self {
            Self::Encoded(bytes) => Ok(Cow::Borrowed(&bytes[..])),
            Self::DataUri(uri) => parse_data_uri(uri).map(Cow::Owned),
            Self::File(path) => std::fs::read(path)
                .with_context(|| format!("read image file '{}'", path.display()))
                .map(Cow::Owned)
                .map_err(|e| StoryError::decode(format!("{e:#}"))),
        }
    }
}

/// Decode-time options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Downscale originals whose longer side exceeds this.
    pub max_source_dimension: Option<u32>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_source_dimension: Some(MAX_SOURCE_DIMENSION),
        }
    }
}

/// Decoded bitmap, premultiplied RGBA8, ready to paint. Cloning shares the pixels.
#[derive(Clone)]
pub struct SourceImage {
    dims: Dimensions,
    pixmap: Arc<vello_cpu::Pixmap>,
}

impl fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceImage")
            .field("width", &self.dims.width)
            .field("height", &self.dims.height)
            .finish_non_exhaustive()
    }
}

impl SourceImage {
    /// Wrap already-premultiplied RGBA8 pixels.
    pub fn from_premul_rgba8(dims: Dimensions, bytes: &[u8]) -> StoryResult<Self> {
        let dims = dims.ensure_non_empty()?;
        let pixmap = pixmap_from_premul_bytes(bytes, dims)?;
        Ok(Self {
            dims,
            pixmap: Arc::new(pixmap),
        })
    }

    /// Natural size after any decode-time downscale.
    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    /// Premultiplied pixels.
    pub fn pixels(&self) -> &[u8] {
        self.pixmap.data_as_u8_slice()
    }

    /// Bytes held by the decoded bitmap.
    pub fn byte_size(&self) -> usize {
        self.pixels().len()
    }

    pub(crate) fn paint(&self) -> vello_cpu::Image {
        vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::clone(&self.pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        }
    }
}

/// Decode encoded image bytes to a premultiplied [`SourceImage`], downscaling large originals.
pub fn decode_image(bytes: &[u8], opts: &DecodeOptions) -> StoryResult<SourceImage> {
    let mut dyn_img = image::load_from_memory(bytes)
        .context("decode image from memory")
        .map_err(|e| StoryError::decode(format!("{e:#}")))?;

    let natural = Dimensions::new(dyn_img.width(), dyn_img.height()).ensure_non_empty()?;
    let target = capped_dimensions(natural, opts.max_source_dimension);
    if target != natural {
        tracing::debug!(
            from = ?natural,
            to = ?target,
            "downscaling oversized source image"
        );
        dyn_img = dyn_img.resize_exact(
            target.width,
            target.height,
            image::imageops::FilterType::Triangle,
        );
    }

    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    SourceImage::from_premul_rgba8(Dimensions::new(width, height), &rgba8_premul).map_err(|e| {
        match e {
            StoryError::Validation(msg) => StoryError::decode(format!("image too large: {msg}")),
            other => other,
        }
    })
}

/// Read and decode any [`ImageSource`].
pub fn decode_source(source: &ImageSource, opts: &DecodeOptions) -> StoryResult<SourceImage> {
    let bytes = source.read_bytes()?;
    decode_image(&bytes, opts)
}

/// Payload of a base64 `data:` URI.
pub fn parse_data_uri(uri: &str) -> StoryResult<Vec<u8>> {
    let rest = uri
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| StoryError::decode("not a data URI"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| StoryError::decode("data URI has no payload"))?;
    if !meta.ends_with(";base64") {
        return Err(StoryError::decode("only base64 data URIs are supported"));
    }
    general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| StoryError::decode(format!("invalid base64 payload: {e}")))
}

/// Build a `data:` URI for encoded bytes.
pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    let b64 = general_purpose::STANDARD.encode(bytes);
    format!("data:{mime};base64,{b64}")
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
