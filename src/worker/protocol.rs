//! Messages between the scheduler and the execution context.
//!
//! Every [`ProcessRequest`] is answered by exactly one [`WorkerResponse`] with the same id.

use crate::assets::decode::ImageSource;
use crate::encode::{EncodedImage, OutputFormat};
use crate::foundation::core::ImageId;
use crate::foundation::error::{ErrorKind, StoryError};
use crate::params::CompositingParameters;

/// Unique id of one process request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

/// Render one image.
#[derive(Clone, Debug)]
pub struct ProcessRequest {
    /// Echoed back in the response.
    pub id: RequestId,
    /// Cache key. Without it the decoded bitmap is released right after the render.
    pub image_id: Option<ImageId>,
    /// Encoded image. May be omitted when `image_id` is already cached or in the originals store.
    pub source: Option<ImageSource>,
    /// Parameters, including the quality cap.
    pub params: CompositingParameters,
    /// Output encoding.
    pub format: OutputFormat,
}

/// Free the decoded bitmap cached under `image_id`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClearCacheRequest {
    /// Entry to evict.
    pub image_id: ImageId,
}

/// Inbound message.
#[derive(Clone, Debug)]
pub enum WorkerRequest {
    /// See [`ProcessRequest`].
    Process(ProcessRequest),
    /// See [`ClearCacheRequest`].
    ClearCache(ClearCacheRequest),
}

/// Successful render.
#[derive(Clone, Debug)]
pub struct ProcessResponse {
    /// Id of the answered request.
    pub id: RequestId,
    /// Encoded canvas.
    pub image: EncodedImage,
}

/// Failed render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessError {
    /// Id of the answered request.
    pub id: RequestId,
    /// Error tag.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub error: String,
}

impl ProcessError {
    pub(crate) fn from_error(id: RequestId, err: &StoryError) -> Self {
        Self {
            id,
            kind: err.kind(),
            error: err.to_string(),
        }
    }

    /// Rebuild the error on the receiving side.
    pub fn to_error(&self) -> StoryError {
        StoryError::from_kind(self.kind, self.error.clone())
    }
}

/// Outbound message.
#[derive(Clone, Debug)]
pub enum WorkerResponse {
    /// See [`ProcessResponse`].
    Processed(ProcessResponse),
    /// See [`ProcessError`].
    Failed(ProcessError),
}

impl WorkerResponse {
    /// Id of the answered request.
    pub fn id(&self) -> RequestId {
        match self {
            Self::Processed(r) => r.id,
            Self::Failed(e) => e.id,
        }
    }
}
