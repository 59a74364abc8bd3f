//! # ndi-ingest
//!
//! Live NDI video ingest for GPU renderers.
//!
//! This crate provides a unified interface to the ndi-ingest libraries:
//!
//! - **[`recv`]** - NDI runtime loading, discovery, receivers and frame layouts
//! - **[`video`]** - Video mode negotiation and staging-buffer pixel conversion
//! - **[`source`]** - Source lifecycle, host scheduling seam and threaded driver
//!
//! # Features
//!
//! All features except `synthetic` are enabled by default. You can
//! selectively enable only what you need:
//!
//! ```toml
//! # Use everything (default)
//! ndi-ingest = "0.1"
//!
//! # Format negotiation and conversion only
//! ndi-ingest = { version = "0.1", default-features = false, features = ["video"] }
//!
//! # All features including the in-memory network backend
//! ndi-ingest = { version = "0.1", features = ["full"] }
//! ```
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `recv` | Yes | NDI receive primitives |
//! | `video` | Yes | Negotiation and conversion |
//! | `source` | Yes | Source lifecycle (implies `recv` and `video`) |
//! | `synthetic` | No | In-memory network backend for tests and demos |
//! | `full` | No | All features from all sub-crates |
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ndi_ingest::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let lib = NdiLibrary::load(&LibraryConfig::default())?;
//!     let instance = Instance::new();
//!
//!     let source = NdiSource::new(
//!         &instance,
//!         "Program",
//!         Source::new("STUDIO (Camera 1)")?,
//!         Arc::new(NdiBackend::new(lib)),
//!         Arc::new(MemoryRenderer::default()),
//!         SourceConfig::default(),
//!     )?;
//!
//!     let (driver, mut frames) = SourceDriver::spawn(instance, source, Box::new(FirstCompatible))?;
//!     while let Some(frame) = frames.recv().await {
//!         println!("{}", frame.descriptor().resolution);
//!     }
//!     driver.shutdown()?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           ndi-ingest                             │
//! ├──────────────────────┬─────────────────────┬─────────────────────┤
//! │      ndi-recv        │      ndi-video      │     ndi-source      │
//! │                      │                     │                     │
//! │  NdiLibrary          │  derive_mode        │  NdiSource          │
//! │  NdiFinder           │  Conversion         │  Instance/Schedule  │
//! │  NdiBackend          │  Renderer/Uploader  │  SourceDriver       │
//! │  SourceFrame/FourCC  │  MemoryRenderer     │  ModeSelector       │
//! └──────────┬───────────┴──────────┬──────────┴──────────┬──────────┘
//!            │                      │                     │
//!            ▼                      ▼                     ▼
//!      NDI runtime            GPU staging buffers    Host scheduler
//! ```
//!
//! # Related Crates
//!
//! You can also use the individual crates directly:
//!
//! - `ndi-recv` - Receive primitives only
//! - `ndi-video` - Negotiation and conversion only
//! - `ndi-source` - Lifecycle (pulls in the other two)

#![cfg_attr(docsrs, feature(doc_cfg))]

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// RE-EXPORTS
// =============================================================================

/// NDI receive primitives.
///
/// This module provides:
/// - Runtime loading without a global singleton
/// - Source discovery
/// - Receivers and frame-sync helpers behind collaborator traits
/// - ABI-exact frame layouts and the plane layout table
///
/// See [`ndi_recv`] documentation for details.
#[cfg(feature = "recv")]
#[cfg_attr(docsrs, doc(cfg(feature = "recv")))]
pub use ndi_recv as recv;

/// Video mode negotiation and pixel conversion.
///
/// This module provides:
/// - Renderer-side format vocabulary
/// - Mode derivation from frame parameters
/// - Conversion into staging-buffer layouts
/// - Renderer and uploader interfaces
///
/// See [`ndi_video`] documentation for details.
#[cfg(feature = "video")]
#[cfg_attr(docsrs, doc(cfg(feature = "video")))]
pub use ndi_video as video;

/// Source lifecycle.
///
/// See [`ndi_source`] documentation for details.
#[cfg(feature = "source")]
#[cfg_attr(docsrs, doc(cfg(feature = "source")))]
pub use ndi_source as source;

// =============================================================================
// PRELUDE - Common types for convenience
// =============================================================================

/// Prelude module with commonly used types.
///
/// ```rust
/// use ndi_ingest::prelude::*;
/// ```
pub mod prelude {
    #[cfg(feature = "recv")]
    pub use ndi_recv::{
        FinderConfig, FourCC, LibraryConfig, NdiBackend, NdiError, NdiFinder, NdiLibrary,
        ReceiverConfig, Source, SourceFrame, Tally,
    };

    #[cfg(feature = "synthetic")]
    pub use ndi_recv::{SyntheticBackend, SyntheticFeed};

    #[cfg(feature = "video")]
    pub use ndi_video::{
        ColorFormat, FormatSet, MemoryRenderer, Renderer, StagedFrame, VideoError, VideoMode,
    };

    #[cfg(feature = "source")]
    pub use ndi_source::{
        FirstCompatible, Instance, NdiSource, SourceConfig, SourceDriver, SourceError,
        SourceState,
    };
}
