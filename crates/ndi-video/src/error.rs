//! Error types for the video side of ingest

use thiserror::Error;

use crate::format::ColorFormat;

/// Errors raised by renderers and uploaders
#[derive(Error, Debug)]
pub enum VideoError {
    /// The renderer cannot stage this format
    #[error("Unsupported staging format: {0}")]
    UnsupportedFormat(ColorFormat),

    /// The renderer failed to create an uploader
    #[error("Uploader creation failed: {0}")]
    UploaderCreation(String),

    /// No staged frame could be acquired
    #[error("Staged frame acquisition failed: {0}")]
    Acquire(String),
}

/// Result type for video operations
pub type Result<T> = std::result::Result<T, VideoError>;

impl VideoError {
    pub(crate) fn uploader_creation(msg: impl Into<String>) -> Self {
        Self::UploaderCreation(msg.into())
    }

    pub(crate) fn acquire(msg: impl Into<String>) -> Self {
        Self::Acquire(msg.into())
    }
}
