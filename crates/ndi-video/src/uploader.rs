//! Renderer collaborator interfaces
//!
//! A [`Renderer`] lists the staging formats it can upload and creates an
//! [`Uploader`] for one frame layout. The uploader hands out writable
//! [`StagedFrame`]s; once filled and flushed, a staged frame is shared
//! read-only with consumers.

use std::fmt;

use crate::error::Result;
use crate::format::FormatSet;
use crate::mode::FrameDescriptor;

/// Host-writable staging buffer with one to four planes
pub trait StagedFrame: Send + Sync {
    fn descriptor(&self) -> &FrameDescriptor;

    fn planes(&self) -> Vec<&[u8]>;

    /// Writable plane views, in the plane order of the descriptor's format
    fn planes_mut(&mut self) -> Vec<&mut [u8]>;

    /// Make the written contents visible to the GPU
    fn flush(&mut self);
}

impl fmt::Debug for dyn StagedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedFrame")
            .field("descriptor", self.descriptor())
            .finish_non_exhaustive()
    }
}

/// Produces staged frames of one layout
pub trait Uploader: Send {
    fn descriptor(&self) -> &FrameDescriptor;

    /// Acquire a writable staged frame, possibly blocking briefly
    fn acquire(&mut self) -> Result<Box<dyn StagedFrame>>;
}

/// GPU-backed consumer of staged frames
pub trait Renderer: Send + Sync {
    /// Staging formats this renderer can upload
    fn supported_formats(&self) -> FormatSet;

    fn create_uploader(&self, descriptor: &FrameDescriptor) -> Result<Box<dyn Uploader>>;
}
