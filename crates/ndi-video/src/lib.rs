//! # ndi-video
//!
//! Video-side half of NDI ingest: turns the parameters of a received NDI
//! frame into a renderer-facing [`VideoMode`], and copies frame data into
//! GPU staging buffers in the layout the renderer agreed to.
//!
//! # Overview
//!
//! - [`derive_mode`] maps a frame's FourCC, resolution, rate and aspect ratio
//!   to a [`VideoMode`], keeping only the staging formats the renderer lists
//!   in its [`FormatSet`]
//! - [`Conversion`] is the copy routine for one (FourCC, staging format)
//!   pair, built from [`copy_plane`] and [`copy_plane_interleaved`]
//! - [`Renderer`], [`Uploader`] and [`StagedFrame`] are the interfaces a GPU
//!   backend implements; [`MemoryRenderer`] implements them on the heap
//!
//! # Supported Conversions
//!
//! | NDI FourCC | Staging format | Sub-sampling |
//! |------------|----------------|--------------|
//! | RGBA, RGBX | `R8G8B8A8` | 4:4:4 |
//! | BGRA, BGRX | `B8G8R8A8` | 4:4:4 |
//! | UYVY | `B8G8R8G8` or `G8B8R8TwoPlane` | 4:2:2 |
//! | UYVA | `G8B8R8A8ThreePlane` | 4:2:2 |
//! | P216 | `G16B16R16TwoPlane` | 4:2:2 |
//! | PA16 | `G16B16R16A16ThreePlane` | 4:2:2 |
//! | I420, YV12 | `G8B8R8ThreePlane` | 4:2:0 |
//! | NV12 | `G8B8R8TwoPlane` | 4:2:0 |
//!
//! # Quick Start
//!
//! ```rust
//! use ndi_recv::{FourCC, Rational, Resolution, ScanFormat, SourceFrame};
//! use ndi_video::{derive_mode, ColorFormat, Conversion, MemoryRenderer, Renderer};
//!
//! let renderer = MemoryRenderer::new(ColorFormat::G8B8R8TwoPlane.into());
//! let frame = SourceFrame::new(
//!     Resolution::new(1920, 1080),
//!     FourCC::UYVY,
//!     Rational::new(30000, 1001),
//!     0.0,
//!     ScanFormat::Progressive,
//! );
//!
//! let mode = derive_mode(&frame, renderer.supported_formats()).expect("convertible");
//! let descriptor = mode.frame_descriptor();
//! assert_eq!(descriptor.color_format, ColorFormat::G8B8R8TwoPlane);
//! assert_eq!(
//!     Conversion::select(FourCC::UYVY, descriptor.color_format),
//!     Some(Conversion::UyvyToNv16)
//! );
//! ```

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod convert;
pub mod error;
pub mod format;
pub mod memory;
pub mod mode;
pub mod negotiate;
pub mod uploader;

// =============================================================================
// RE-EXPORTS - PRIMARY API
// =============================================================================

// Negotiation
pub use mode::{FrameDescriptor, VideoMode};
pub use negotiate::{colorimetry, derive_mode, pixel_aspect_ratio, FormatFamily};

// Formats
pub use format::{
    AspectRatio, ColorFormat, ColorModel, ColorPrimaries, ColorRange, ColorSubsampling,
    ColorTransferFunction, FormatSet, PlaneGeometry,
};

// Conversion
pub use convert::{copy_plane, copy_plane_interleaved, Conversion};

// Renderer interfaces
pub use memory::{MemoryRenderer, MemoryStagedFrame, MemoryUploader, RendererStats};
pub use uploader::{Renderer, StagedFrame, Uploader};

// Errors
pub use error::{Result, VideoError};

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
