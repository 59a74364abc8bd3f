//! # ndi-source
//!
//! The lifecycle of an NDI video source inside a host that owns a global
//! instance lock: open and close with the lock released around blocking
//! network work, recurring updates whose cadence is discovered from the
//! first frame, renegotiation when the incoming geometry changes, and
//! pull-driven output that converts each captured frame at most once.
//!
//! # Overview
//!
//! - [`NdiSource`] is the state machine (`open`, `close`, `on_tick`,
//!   `on_mode_proposal`, `pull`, source and tally setters)
//! - [`Instance`], [`Registry`] and [`Schedule`] model the host: the lock,
//!   and per-component cadence plus published video modes
//! - [`ModeSelector`] is the downstream side of mode negotiation
//! - [`SourceDriver`] runs the whole loop on a thread and hands staged
//!   frames to async code
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use ndi_recv::synthetic::SyntheticFeed;
//! use ndi_recv::{FourCC, Rational, Resolution, ScanFormat, Source, SourceFrame};
//! use ndi_source::{Instance, NdiSource, SourceConfig};
//! use ndi_video::MemoryRenderer;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let feed = SyntheticFeed::new();
//! let template = SourceFrame::new(
//!     Resolution::new(4, 2),
//!     FourCC::BGRA,
//!     Rational::new(25, 1),
//!     0.0,
//!     ScanFormat::Progressive,
//! );
//! feed.push_frame(template, 16, vec![0u8; 32]);
//!
//! let instance = Instance::new();
//! let mut source = NdiSource::new(
//!     &instance,
//!     "Preview",
//!     Source::new("STUDIO (Cam)")?,
//!     Arc::new(feed.backend()),
//!     Arc::new(MemoryRenderer::default()),
//!     SourceConfig::default(),
//! )?;
//!
//! let mut lock = instance.lock();
//! source.open(&mut lock)?;
//! source.on_tick(&mut lock)?;
//! let published = lock.schedule(source.id()).take_published().unwrap_or_default();
//! source.on_mode_proposal(&mut lock, published.first())?;
//! drop(lock);
//!
//! let frame = source.pull()?.expect("streaming");
//! assert_eq!(frame.descriptor().resolution, Resolution::new(4, 2));
//!
//! source.close(&mut instance.lock())?;
//! # Ok(())
//! # }
//! ```
//!
//! # Cargo Features
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `synthetic` | No | Enables the in-memory backend of `ndi-recv` |
//! | `full` | No | All features enabled |

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod config;
pub mod driver;
pub mod error;
pub mod instance;
pub mod source;

mod session;

// =============================================================================
// RE-EXPORTS - PRIMARY API
// =============================================================================

// Lifecycle
pub use source::{NdiSource, SourceState};

// Host seam
pub use instance::{
    Cadence, ComponentId, FirstCompatible, Instance, InstanceLock, ModeSelector, Priority,
    Registry, Schedule, Scheduler,
};

// Threaded host
pub use driver::{DriverCommand, DriverStats, SourceDriver};

// Configuration
pub use config::{SourceConfig, SourceConfigBuilder};

// Errors
pub use error::{Result, SourceError};

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
