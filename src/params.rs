//! Compositing parameters: the immutable value passed with every render request.

use serde::{Deserialize, Serialize};

use crate::foundation::core::Rgb8;
use crate::foundation::error::{StoryError, StoryResult};

/// Smallest allowed foreground scale.
pub const MIN_SCALE: f64 = 0.5;
/// Largest allowed foreground scale.
pub const MAX_SCALE: f64 = 1.0;

/// Background treatment behind the foreground image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackgroundKind {
    /// Blurred, darkened cover-fit copy of the image.
    #[default]
    CoverBlur,
    /// Flat black.
    FlatBlack,
    /// Flat white.
    FlatWhite,
    /// Flat custom color (black when none is set).
    CustomColor,
    /// Base color plus a blurred duplicate of the foreground at the same rectangle.
    AmbientGlow,
}

/// Base fill under the ambient glow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmbientBase {
    /// Black base.
    #[default]
    Black,
    /// White base.
    White,
    /// Custom base color (black when none is set).
    Custom,
}

/// Corner radius tier, as a percentage of the scaled foreground's shorter side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CornerRadius {
    /// Square corners.
    #[default]
    None,
    /// 2.5%.
    Small,
    /// 5%.
    Medium,
    /// 10%.
    Large,
}

impl CornerRadius {
    /// All tiers in increasing order.
    pub const ALL: [Self; 4] = [Self::None, Self::Small, Self::Medium, Self::Large];

    /// Percentage of the shorter foreground side.
    pub fn percent(self) -> f64 {
        match self {
            Self::None => 0.0,
            Self::Small => 2.5,
            Self::Medium => 5.0,
            Self::Large => 10.0,
        }
    }

    /// Tier index, 0..=3.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Tier for an index, if in range.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Everything the compositor needs besides the image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositingParameters {
    /// Background treatment.
    pub background: BackgroundKind,
    /// Color for [`BackgroundKind::CustomColor`].
    pub custom_color: Option<Rgb8>,
    /// Base under the ambient glow.
    pub ambient_base: AmbientBase,
    /// Color for [`AmbientBase::Custom`].
    pub ambient_custom_color: Option<Rgb8>,
    /// Foreground scale, 0.5..=1.0.
    pub scale: f64,
    /// Blur strength as a percentage of the shorter image side.
    pub blur_percent: f64,
    /// Corner radius tier.
    pub corner_radius: CornerRadius,
    /// Optional cap on the longer image side, used for quality tiers.
    pub max_dimension: Option<u32>,
}

impl Default for CompositingParameters {
    fn default() -> Self {
        Self {
            background: BackgroundKind::CoverBlur,
            custom_color: None,
            ambient_base: AmbientBase::Black,
            ambient_custom_color: None,
            scale: 0.9,
            blur_percent: 5.0,
            corner_radius: CornerRadius::None,
            max_dimension: None,
        }
    }
}

impl CompositingParameters {
    /// Check ranges. Called by the compositor before any work.
    pub fn validate(&self) -> StoryResult<()> {
        if !self.scale.is_finite() || !(MIN_SCALE..=MAX_SCALE).contains(&self.scale) {
            return Err(StoryError::validation(format!(
                "scale must be within {MIN_SCALE}..={MAX_SCALE}, got {}",
                self.scale
            )));
        }
        if !self.blur_percent.is_finite() || !(0.0..=100.0).contains(&self.blur_percent) {
            return Err(StoryError::validation(format!(
                "blur_percent must be within 0..=100, got {}",
                self.blur_percent
            )));
        }
        if self.max_dimension == Some(0) {
            return Err(StoryError::validation("max_dimension must be > 0"));
        }
        Ok(())
    }

    /// Same parameters with a different quality cap.
    pub fn with_max_dimension(&self, max_dimension: Option<u32>) -> Self {
        Self {
            max_dimension,
            ..self.clone()
        }
    }

    /// Resolved flat fill for the flat background kinds, `None` for cover-blur and ambient.
    pub fn solid_color(&self) -> Option<Rgb8> {
        match self.background {
            BackgroundKind::FlatBlack => Some(Rgb8::BLACK),
            BackgroundKind::FlatWhite => Some(Rgb8::WHITE),
            BackgroundKind::CustomColor => Some(self.custom_color.unwrap_or(Rgb8::BLACK)),
            BackgroundKind::CoverBlur | BackgroundKind::AmbientGlow => None,
        }
    }

    /// Resolved base fill under the ambient glow.
    pub fn ambient_color(&self) -> Rgb8 {
        match self.ambient_base {
            AmbientBase::Black => Rgb8::BLACK,
            AmbientBase::White => Rgb8::WHITE,
            AmbientBase::Custom => self.ambient_custom_color.unwrap_or(Rgb8::BLACK),
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/params/params.rs"]
mod tests;
