//! Engine configuration: JSON file, then environment overrides.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::assets::decode::{DecodeOptions, MAX_SOURCE_DIMENSION};
use crate::assets::originals::OriginalsStore;
use crate::encode::OutputFormat;
use crate::foundation::error::{StoryError, StoryResult};
use crate::params::{BackgroundKind, CompositingParameters};
use crate::scheduler::shared::SchedulerOptions;
use crate::scheduler::tiers::{QualityTier, default_tiers, validate_tiers};
use crate::worker::context::ContextOptions;

/// Overrides the maximum source dimension; `0` disables downscaling.
pub const ENV_MAX_SOURCE_DIMENSION: &str = "STORYFRAME_MAX_SOURCE_DIMENSION";
/// Overrides the export JPEG quality (1..=100).
pub const ENV_JPEG_QUALITY: &str = "STORYFRAME_JPEG_QUALITY";
/// Any of `1`, `true`, `yes` disables the off-thread context.
pub const ENV_DISABLE_WORKER: &str = "STORYFRAME_DISABLE_WORKER";

/// Engine-wide settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Progressive preview tiers.
    pub tiers: Vec<QualityTier>,
    /// Encoding of preview results.
    pub preview_format: OutputFormat,
    /// Encoding of exported stories.
    pub export_format: OutputFormat,
    /// Sources larger than this are downscaled at decode time.
    pub max_source_dimension: Option<u32>,
    /// Name of the execution context thread.
    pub worker_thread_name: String,
    /// When false, previews report themselves unsupported.
    pub offthread_enabled: bool,
    /// Initial blur percent for the cover-blur background.
    pub default_blur_percent: f64,
    /// Initial blur percent for the ambient background.
    pub default_ambient_blur_percent: f64,
    /// Pause between exported items.
    pub export_pause_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            preview_format: OutputFormat::Png,
            export_format: OutputFormat::export_default(),
            max_source_dimension: Some(MAX_SOURCE_DIMENSION),
            worker_thread_name: "storyframe-worker".to_string(),
            offthread_enabled: true,
            default_blur_percent: 5.0,
            default_ambient_blur_percent: 20.0,
            export_pause_ms: 0,
        }
    }
}

impl EngineConfig {
    /// Read and validate a JSON config file. Missing fields take their defaults.
    pub fn from_json_path(path: &Path) -> StoryResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&text)
            .map_err(|e| StoryError::validation(format!("{}: {e}", path.display())))
    }

    /// Parse and validate JSON text.
    pub fn from_json_str(text: &str) -> StoryResult<Self> {
        let cfg: Self = serde_json::from_str(text).context("parse engine config json")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `STORYFRAME_*` environment overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`; unparsable values are ignored.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(max) =
            lookup(ENV_MAX_SOURCE_DIMENSION).and_then(|v| v.trim().parse::<u32>().ok())
        {
            self.max_source_dimension = (max > 0).then_some(max);
        }
        if let Some(quality) = lookup(ENV_JPEG_QUALITY)
            .and_then(|v| v.trim().parse::<u8>().ok())
            .filter(|q| (1..=100).contains(q))
        {
            self.export_format = OutputFormat::Jpeg { quality };
        }
        if lookup(ENV_DISABLE_WORKER)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false)
        {
            self.offthread_enabled = false;
        }
        self
    }

    /// Check tiers, qualities and default percentages.
    pub fn validate(&self) -> StoryResult<()> {
        validate_tiers(&self.tiers)?;
        for format in [self.preview_format, self.export_format] {
            if let OutputFormat::Jpeg { quality } = format
                && !(1..=100).contains(&quality)
            {
                return Err(StoryError::validation(format!(
                    "jpeg quality must be within 1..=100, got {quality}"
                )));
            }
        }
        if self.max_source_dimension == Some(0) {
            return Err(StoryError::validation("max_source_dimension must be > 0"));
        }
        for pct in [self.default_blur_percent, self.default_ambient_blur_percent] {
            if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
                return Err(StoryError::validation(format!(
                    "default blur percent must be within 0..=100, got {pct}"
                )));
            }
        }
        Ok(())
    }

    /// Decode options for this config.
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            max_source_dimension: self.max_source_dimension,
        }
    }

    /// Options for the shared execution context.
    pub fn context_options(&self, originals: Option<Arc<dyn OriginalsStore>>) -> ContextOptions {
        ContextOptions {
            thread_name: self.worker_thread_name.clone(),
            decode: self.decode_options(),
            originals,
            offthread_enabled: self.offthread_enabled,
        }
    }

    /// Options for a [`crate::PreviewScheduler`].
    pub fn scheduler_options(
        &self,
        originals: Option<Arc<dyn OriginalsStore>>,
    ) -> SchedulerOptions {
        SchedulerOptions {
            tiers: self.tiers.clone(),
            preview_format: self.preview_format,
            context: self.context_options(originals),
        }
    }

    /// Starting parameters for a background mode, with that mode's default blur.
    pub fn default_params(&self, background: BackgroundKind) -> CompositingParameters {
        let blur_percent = match background {
            BackgroundKind::AmbientGlow => self.default_ambient_blur_percent,
            _ => self.default_blur_percent,
        };
        CompositingParameters {
            background,
            blur_percent,
            ..CompositingParameters::default()
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/config/config.rs"]
mod tests;
