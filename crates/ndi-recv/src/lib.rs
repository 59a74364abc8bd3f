//! # ndi-recv
//!
//! Receive-side building blocks for NDI video-over-IP: ABI-exact frame and
//! source layouts, the plane layout of every NDI pixel format, and safe
//! wrappers around the dynamically loaded NDI runtime (discovery, receivers,
//! frame-sync).
//!
//! This crate is part of the `ndi-ingest` workspace. The ingest lifecycle in
//! `ndi-source` only depends on the [`NetworkBackend`], [`Receiver`] and
//! [`FrameSync`] traits, so it runs unchanged against the real runtime
//! ([`NdiBackend`]) or the in-memory backend of the `synthetic` feature.
//!
//! # Requirements
//!
//! - The **NDI runtime** (`libndi.so.6`, `libndi.dylib` or
//!   `Processing.NDI.Lib.x64.dll`), located through `NDI_RUNTIME_DIR_V6` and
//!   friends or the system loader path. It is loaded at run time, so building
//!   needs no SDK.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use ndi_recv::{
//!     FinderConfig, LibraryConfig, NdiBackend, NdiFinder, NdiLibrary, NetworkBackend,
//!     ReceiverConfig, ScanFormat, SourceFrame,
//! };
//!
//! # fn main() -> ndi_recv::Result<()> {
//! let lib = NdiLibrary::load(&LibraryConfig::default())?;
//!
//! let finder = NdiFinder::new(lib.clone(), &FinderConfig::default())?;
//! finder.wait_for_sources(Duration::from_secs(2));
//! let Some(source) = finder.current_sources().into_iter().next() else {
//!     return Ok(());
//! };
//!
//! let backend = NdiBackend::new(lib);
//! let mut conn = backend.connect(&source, &ReceiverConfig::default(), "viewer")?;
//!
//! if let Some(frame_sync) = conn.frame_sync.as_mut() {
//!     let mut frame = SourceFrame::default();
//!     frame_sync.capture(&mut frame, ScanFormat::Progressive);
//!     if frame.is_held() {
//!         println!("{} {:?}", frame.resolution(), frame.fourcc());
//!     }
//!     frame_sync.free(&mut frame);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Cargo Features
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `synthetic` | No | In-memory network backend for tests and demos |
//! | `full` | No | All features enabled |

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod config;
pub mod error;
pub mod ffi;
pub mod finder;
pub mod frame;
pub mod layout;
pub mod library;
pub mod receiver;
pub mod source;

// =============================================================================
// FEATURE MODULES
// =============================================================================

/// In-memory network backend
///
/// Requires the `synthetic` feature.
#[cfg(feature = "synthetic")]
pub mod synthetic;

// =============================================================================
// RE-EXPORTS - PRIMARY API
// =============================================================================

// Runtime and discovery
pub use finder::NdiFinder;
pub use library::NdiLibrary;

// Configuration
pub use config::{
    Bandwidth, CaptureMode, FinderConfig, LibraryConfig, ReceiverConfig, ReceiverConfigBuilder,
    RecvColorFormat,
};

// Errors
pub use error::{NdiError, Result};

// Frames and sources
pub use frame::{
    FourCC, FrameGeometry, Rational, Resolution, ScanFormat, SourceFrame, SYNTHESIZE_TIMECODE,
};
pub use layout::{PlaneDivisor, PlaneExtent, PlaneLayout};
pub use source::Source;

// Collaborator traits and runtime implementations
pub use receiver::{
    CaptureStatus, Connection, FrameSync, NdiBackend, NdiFrameSync, NdiReceiver, NetworkBackend,
    Receiver, Tally,
};

// =============================================================================
// FEATURE RE-EXPORTS
// =============================================================================

#[cfg(feature = "synthetic")]
pub use synthetic::{FeedStats, SyntheticBackend, SyntheticFeed};

// =============================================================================
// CRATE-LEVEL ITEMS
// =============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
