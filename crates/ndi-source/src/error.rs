//! Error types for the source lifecycle

use thiserror::Error;

/// Errors that can occur while driving an NDI source
#[derive(Error, Debug)]
pub enum SourceError {
    /// A lifecycle method was called in a state that does not allow it
    #[error("Invalid source state: {0}")]
    InvalidState(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Network side failure (runtime, receiver or frame-sync)
    #[error("NDI error: {0}")]
    Ndi(#[from] ndi_recv::NdiError),

    /// Renderer side failure (uploader or staged frame)
    #[error("Video error: {0}")]
    Video(#[from] ndi_video::VideoError),

    /// The driver thread could not be started or stopped
    #[error("Driver thread failed: {0}")]
    Driver(String),
}

/// Result type for source operations
pub type Result<T> = std::result::Result<T, SourceError>;

impl SourceError {
    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub(crate) fn driver(msg: impl Into<String>) -> Self {
        Self::Driver(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndi_recv::NdiError;
    use ndi_video::{ColorFormat, VideoError};

    #[test]
    fn test_error_display() {
        let err = SourceError::invalid_state("source is not open");
        assert_eq!(err.to_string(), "Invalid source state: source is not open");
    }

    #[test]
    fn test_layer_conversions() {
        let err: SourceError = NdiError::InvalidConfig("empty".into()).into();
        assert!(matches!(err, SourceError::Ndi(_)));

        let err: SourceError = VideoError::UnsupportedFormat(ColorFormat::R8G8B8A8).into();
        assert!(matches!(err, SourceError::Video(_)));
        assert_eq!(
            err.to_string(),
            "Video error: Unsupported staging format: R8G8B8A8"
        );
    }
}
