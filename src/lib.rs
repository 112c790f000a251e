//! Storyframe turns an arbitrary photo into a 9:21 story image.
//!
//! The photo is placed, scaled and optionally rounded over a generated background (a blurred
//! cover of itself, a flat colour, or an ambient glow). Two paths share one compositor:
//!
//! - Interactive preview: a [`PreviewScheduler`] owns a single background
//!   [`ExecutionContext`] that caches decoded images, and each [`PreviewInstance`] requests
//!   progressively sharper renders, never letting an older or lower-quality result replace a
//!   better one.
//! - Export: [`export_batch`] renders each image at full resolution, one at a time, and hands
//!   the encoded bytes to an [`ExportSink`].
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod assets;
mod config;
mod encode;
mod export;
mod foundation;
mod geometry;
mod params;
mod render;
mod scheduler;
mod worker;

pub use crate::foundation::core::{Dimensions, ImageId, PixelRect, Rgb8};
pub use crate::foundation::error::{ErrorKind, StoryError, StoryResult};

pub use crate::assets::decode::{
    DecodeOptions, ImageSource, MAX_SOURCE_DIMENSION, SourceImage, decode_image, decode_source,
    parse_data_uri, to_data_uri,
};
pub use crate::assets::originals::{DirectoryOriginals, InMemoryOriginals, OriginalsStore};
pub use crate::assets::sample::pick_color;
pub use crate::config::{
    ENV_DISABLE_WORKER, ENV_JPEG_QUALITY, ENV_MAX_SOURCE_DIMENSION, EngineConfig,
};
pub use crate::encode::{EXPORT_JPEG_QUALITY, EncodedImage, OutputFormat, encode_canvas};
pub use crate::export::{
    DirectorySink, ExportItem, ExportOutcome, ExportReport, ExportSink, InMemorySink,
    export_batch, story_filename,
};
pub use crate::geometry::{
    BackgroundPlan, CompositeLayout, TARGET_ASPECT_RATIO, blur_pixels, border_radius_pixels,
    canvas_dimensions, capped_dimensions, cover_rect, foreground_rect, plan_layout,
};
pub use crate::params::{
    AmbientBase, BackgroundKind, CompositingParameters, CornerRadius, MAX_SCALE, MIN_SCALE,
};
pub use crate::render::compositor::{composite, render_canvas};
pub use crate::render::surface::PixelCanvas;
pub use crate::scheduler::handles::{DisplayHandle, HandleRegistry};
pub use crate::scheduler::preview::{PreviewEvent, PreviewInstance};
pub use crate::scheduler::quality::{PreviewPhase, QualityGate, Verdict};
pub use crate::scheduler::shared::{ContextLease, PreviewScheduler, SchedulerOptions};
pub use crate::scheduler::tiers::{QualityTier, default_tiers, validate_tiers};
pub use crate::worker::cache::ContextStats;
pub use crate::worker::context::{ContextOptions, ExecutionContext};
pub use crate::worker::protocol::{
    ClearCacheRequest, ProcessError, ProcessRequest, ProcessResponse, RequestId, WorkerRequest,
    WorkerResponse,
};
