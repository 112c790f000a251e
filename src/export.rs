//! Full-resolution export: composite each image in turn and hand the bytes to a sink.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;

use crate::assets::decode::{ImageSource, decode_source};
use crate::config::EngineConfig;
use crate::encode::{EncodedImage, OutputFormat};
use crate::foundation::error::{StoryError, StoryResult};
use crate::params::CompositingParameters;
use crate::render::compositor::composite;

/// One image to export.
#[derive(Clone, Debug)]
pub struct ExportItem {
    /// Original file name; its stem names the output.
    pub name: String,
    /// Image data.
    pub source: ImageSource,
}

impl ExportItem {
    /// Item read from `path`, named after it.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            source: ImageSource::file(path),
        }
    }
}

/// Destination for exported stories.
pub trait ExportSink {
    /// Store one encoded story under `filename`.
    fn write(&mut self, filename: &str, image: &EncodedImage) -> StoryResult<()>;
}

/// Writes stories into a directory, creating it if needed.
#[derive(Clone, Debug)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    /// Sink rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Output directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ExportSink for DirectorySink {
    fn write(&mut self, filename: &str, image: &EncodedImage) -> StoryResult<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("create output dir {}", self.root.display()))?;
        let path = self.root.join(filename);
        std::fs::write(&path, &image.bytes[..])
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}

/// Keeps stories in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemorySink {
    files: Vec<(String, EncodedImage)>,
}

impl InMemorySink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored `(filename, image)` pairs in export order.
    pub fn files(&self) -> &[(String, EncodedImage)] {
        &self.files
    }
}

impl ExportSink for InMemorySink {
    fn write(&mut self, filename: &str, image: &EncodedImage) -> StoryResult<()> {
        self.files.push((filename.to_string(), image.clone()));
        Ok(())
    }
}

/// Result for one item.
#[derive(Debug)]
pub enum ExportOutcome {
    /// Written to the sink.
    Written {
        /// Input name.
        name: String,
        /// Output file name.
        filename: String,
        /// Canvas width.
        width: u32,
        /// Canvas height.
        height: u32,
    },
    /// This item failed; others may still have succeeded.
    Failed {
        /// Input name.
        name: String,
        /// Cause.
        error: StoryError,
    },
}

impl ExportOutcome {
    /// Whether the item was written.
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

/// Per-item results of a batch, in input order.
#[derive(Debug, Default)]
pub struct ExportReport {
    /// One outcome per input item.
    pub outcomes: Vec<ExportOutcome>,
}

impl ExportReport {
    /// Number of items written.
    pub fn written(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_written()).count()
    }

    /// Number of items that failed.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.written()
    }

    /// True when there was at least one item and none was written.
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.written() == 0
    }
}

/// `story_<stem>.<ext>`, with the stem reduced to `[A-Za-z0-9_-]`. Names with nothing usable
/// become `story_<index + 1>`.
pub fn story_filename(name: &str, index: usize, format: OutputFormat) -> String {
    format!("{}.{}", story_stem(name, index), format.extension())
}

fn story_stem(name: &str, index: usize) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    let clean: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if clean.chars().any(|c| c.is_ascii_alphanumeric()) {
        format!("story_{clean}")
    } else {
        format!("story_{}", index + 1)
    }
}

/// Render every item at full resolution, one after another, and write it to `sink`.
///
/// Fails as a whole only for invalid parameters; per-item failures land in the report.
#[tracing::instrument(skip_all, fields(items = items.len()))]
pub fn export_batch(
    items: &[ExportItem],
    params: &CompositingParameters,
    config: &EngineConfig,
    sink: &mut dyn ExportSink,
) -> StoryResult<ExportReport> {
    params.validate()?;
    let params = params.with_max_dimension(None);
    let decode = config.decode_options();
    let pause = Duration::from_millis(config.export_pause_ms);

    let mut used = HashSet::new();
    let mut report = ExportReport::default();
    for (index, item) in items.iter().enumerate() {
        if index > 0 && !pause.is_zero() {
            std::thread::sleep(pause);
        }
        let ext = config.export_format.extension();
        let stem = story_stem(&item.name, index);
        let mut filename = format!("{stem}.{ext}");
        let mut suffix = index + 1;
        while !used.insert(filename.clone()) {
            filename = format!("{stem}_{suffix}.{ext}");
            suffix += 1;
        }

        let written = decode_source(&item.source, &decode)
            .and_then(|image| composite(&image, &params, config.export_format))
            .and_then(|encoded| {
                sink.write(&filename, &encoded)?;
                Ok(encoded)
            });
        let outcome = match written {
            Ok(encoded) => {
                tracing::debug!(name = %item.name, %filename, "exported story");
                ExportOutcome::Written {
                    name: item.name.clone(),
                    filename,
                    width: encoded.width,
                    height: encoded.height,
                }
            }
            Err(error) => {
                tracing::warn!(name = %item.name, %error, "export failed");
                ExportOutcome::Failed {
                    name: item.name.clone(),
                    error,
                }
            }
        };
        report.outcomes.push(outcome);
    }
    tracing::info!(written = report.written(), failed = report.failed(), "export finished");
    Ok(report)
}

#[cfg(test)]
#[path = "../tests/unit/export/export.rs"]
mod tests;
