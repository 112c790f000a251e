use std::fmt;

use serde::{Deserialize, Serialize};

use crate::foundation::error::{StoryError, StoryResult};

/// Width and height of an image or canvas in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Build a size from width and height.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Shorter of the two sides.
    pub fn shorter_side(self) -> u32 {
        self.width.min(self.height)
    }

    /// Longer of the two sides.
    pub fn longer_side(self) -> u32 {
        self.width.max(self.height)
    }

    /// Pixel count.
    pub fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Fail with [`StoryError::InvalidImageDimensions`] when either side is zero.
    pub fn ensure_non_empty(self) -> StoryResult<Self> {
        if self.width == 0 || self.height == 0 {
            return Err(StoryError::InvalidImageDimensions {
                width: self.width,
                height: self.height,
            });
        }
        Ok(self)
    }
}

/// Integer rectangle on the canvas. `x`/`y` may be negative for cover-fit draws that overflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelRect {
    /// Build a rectangle from its origin and size.
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Size of the rectangle.
    pub fn dimensions(self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    pub(crate) fn to_kurbo(self) -> vello_cpu::kurbo::Rect {
        let x0 = f64::from(self.x);
        let y0 = f64::from(self.y);
        vello_cpu::kurbo::Rect::new(
            x0,
            y0,
            x0 + f64::from(self.width),
            y0 + f64::from(self.height),
        )
    }
}

/// Opaque sRGB color, written as `#rrggbb`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb8 {
    /// Pure black.
    pub const BLACK: Self = Self::new(0, 0, 0);
    /// Pure white.
    pub const WHITE: Self = Self::new(255, 255, 255);

    /// Build a color from channels.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rgb` or `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(s: &str) -> StoryResult<Self> {
        let hex = s.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let nibble = |c: u8| -> StoryResult<u8> {
            (c as char)
                .to_digit(16)
                .map(|d| d as u8)
                .ok_or_else(|| StoryError::validation(format!("invalid hex color '{s}'")))
        };
        let bytes = hex.as_bytes();
        match bytes.len() {
            3 => {
                let r = nibble(bytes[0])?;
                let g = nibble(bytes[1])?;
                let b = nibble(bytes[2])?;
                Ok(Self::new(r * 17, g * 17, b * 17))
            }
            6 => {
                let byte = |i: usize| -> StoryResult<u8> {
                    Ok(nibble(bytes[i])? * 16 + nibble(bytes[i + 1])?)
                };
                Ok(Self::new(byte(0)?, byte(2)?, byte(4)?))
            }
            _ => Err(StoryError::validation(format!(
                "hex color must have 3 or 6 digits, got '{s}'"
            ))),
        }
    }

    /// Format as lowercase `#rrggbb`.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Fully opaque premultiplied RGBA8.
    pub fn to_premul_rgba8(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }
}

impl fmt::Display for Rgb8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for Rgb8 {
    type Error = StoryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Rgb8> for String {
    fn from(value: Rgb8) -> Self {
        value.to_hex()
    }
}

/// Caller-supplied identifier of a source image; the decode cache is keyed by it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    /// Wrap an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
