use serde::{Deserialize, Serialize};

/// Convenience result type used across storyframe.
pub type StoryResult<T> = Result<T, StoryError>;

/// Top-level error taxonomy used by compositing, worker and scheduler APIs.
#[derive(thiserror::Error, Debug)]
pub enum StoryError {
    /// Zero-sized source image or canvas. Fatal to a single render only.
    #[error("invalid image dimensions: {width}x{height}")]
    InvalidImageDimensions {
        /// Offending width.
        width: u32,
        /// Offending height.
        height: u32,
    },

    /// Malformed or unsupported image bytes.
    #[error("decode failure: {0}")]
    DecodeFailure(String),

    /// A render was requested without image data and nothing was cached for its id.
    #[error("missing image data: {0}")]
    MissingImageData(String),

    /// The off-thread execution context cannot run in this environment.
    #[error("compositing context unavailable: {0}")]
    ContextUnavailable(String),

    /// Invalid user-provided parameters or configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors while encoding a finished canvas.
    #[error("encode error: {0}")]
    Encode(String),

    /// Anything else, stringified.
    #[error("unknown error: {0}")]
    Unknown(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Copyable tag for a [`StoryError`] variant, carried across the worker boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// See [`StoryError::InvalidImageDimensions`].
    InvalidImageDimensions,
    /// See [`StoryError::DecodeFailure`].
    DecodeFailure,
    /// See [`StoryError::MissingImageData`].
    MissingImageData,
    /// See [`StoryError::ContextUnavailable`].
    ContextUnavailable,
    /// See [`StoryError::Validation`].
    Validation,
    /// See [`StoryError::Encode`].
    Encode,
    /// See [`StoryError::Unknown`] and [`StoryError::Other`].
    Unknown,
}

impl StoryError {
    /// Build a [`StoryError::DecodeFailure`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::DecodeFailure(msg.into())
    }

    /// Build a [`StoryError::MissingImageData`] value.
    pub fn missing_data(msg: impl Into<String>) -> Self {
        Self::MissingImageData(msg.into())
    }

    /// Build a [`StoryError::ContextUnavailable`] value.
    pub fn context_unavailable(msg: impl Into<String>) -> Self {
        Self::ContextUnavailable(msg.into())
    }

    /// Build a [`StoryError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`StoryError::Encode`] value.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build a [`StoryError::Unknown`] value.
    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }

    /// Tag of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidImageDimensions { .. } => ErrorKind::InvalidImageDimensions,
            Self::DecodeFailure(_) => ErrorKind::DecodeFailure,
            Self::MissingImageData(_) => ErrorKind::MissingImageData,
            Self::ContextUnavailable(_) => ErrorKind::ContextUnavailable,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Encode(_) => ErrorKind::Encode,
            Self::Unknown(_) | Self::Other(_) => ErrorKind::Unknown,
        }
    }

    /// Rebuild an error from its tag and message, as received in a `ProcessError`.
    ///
    /// Dimensions are not carried over the wire; a rebuilt `InvalidImageDimensions` reports 0x0.
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::InvalidImageDimensions => Self::InvalidImageDimensions {
                width: 0,
                height: 0,
            },
            ErrorKind::DecodeFailure => Self::DecodeFailure(message),
            ErrorKind::MissingImageData => Self::MissingImageData(message),
            ErrorKind::ContextUnavailable => Self::ContextUnavailable(message),
            ErrorKind::Validation => Self::Validation(message),
            ErrorKind::Encode => Self::Encode(message),
            ErrorKind::Unknown => Self::Unknown(message),
        }
    }
}

pub(crate) fn lock_poisoned(what: &str) -> StoryError {
    StoryError::unknown(format!("{what} lock poisoned"))
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
