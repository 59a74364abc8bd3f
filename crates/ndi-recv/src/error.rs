//! Error types for NDI receive operations
//!
//! Provides typed errors that library users can match and handle specifically.

use thiserror::Error;

/// Errors that can occur while loading the NDI runtime or creating
/// receive-side objects
///
/// # Examples
///
/// ```no_run
/// # use ndi_recv::{LibraryConfig, NdiError, NdiLibrary};
/// match NdiLibrary::load(&LibraryConfig::default()) {
///     Ok(lib) => println!("NDI runtime {}", lib.version()),
///     Err(NdiError::LibraryLoad(e)) => eprintln!("NDI runtime not installed: {}", e),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum NdiError {
    /// The shared library could not be opened or a symbol was missing
    #[error("NDI binaries could not be loaded: {0}")]
    LibraryLoad(#[from] libloading::Error),

    /// The runtime refused to initialize (usually an unsupported CPU)
    #[error("NDI runtime initialization failed: {0}")]
    InitializationFailed(String),

    /// The runtime returned a null finder instance
    #[error("Finder creation failed: {0}")]
    FinderCreation(String),

    /// The runtime returned a null receiver instance
    #[error("Receiver creation failed: {0}")]
    ReceiverCreation(String),

    /// The runtime returned a null frame-sync instance
    #[error("Frame-sync creation failed: {0}")]
    FrameSyncCreation(String),

    /// A string handed to the runtime contained an interior NUL byte
    #[error("Invalid string for NDI: {0}")]
    InvalidString(#[from] std::ffi::NulError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for NDI receive operations
pub type Result<T> = std::result::Result<T, NdiError>;

impl NdiError {
    pub(crate) fn receiver_creation(msg: impl Into<String>) -> Self {
        Self::ReceiverCreation(msg.into())
    }

    pub(crate) fn frame_sync_creation(msg: impl Into<String>) -> Self {
        Self::FrameSyncCreation(msg.into())
    }

    pub(crate) fn finder_creation(msg: impl Into<String>) -> Self {
        Self::FinderCreation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn test_error_display() {
        let err = NdiError::receiver_creation("null instance");
        assert_eq!(err.to_string(), "Receiver creation failed: null instance");

        let err = NdiError::InvalidConfig("capture_timeout_ms must be at least 1".into());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: capture_timeout_ms must be at least 1"
        );
    }

    #[test]
    fn test_nul_conversion() {
        let nul = CString::new("bad\0name").expect_err("interior nul");
        let err: NdiError = nul.into();
        assert!(matches!(err, NdiError::InvalidString(_)));
    }
}
