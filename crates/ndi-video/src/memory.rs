//! Host-memory renderer
//!
//! A [`Renderer`] whose staged frames are plain heap buffers. Used for
//! headless capture (e.g. dumping frames to disk) and in tests, where its
//! [`RendererStats`] show how many uploaders and frames the pipeline asked
//! for.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Result, VideoError};
use crate::format::FormatSet;
use crate::mode::FrameDescriptor;
use crate::uploader::{Renderer, StagedFrame, Uploader};

/// Counters shared by a renderer and everything it created
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RendererStats {
    /// Uploaders created
    pub uploaders_created: u64,

    /// Staged frames handed out
    pub frames_acquired: u64,

    /// Staged frames flushed
    pub frames_flushed: u64,
}

/// Renderer backed by host memory
#[derive(Debug, Clone)]
pub struct MemoryRenderer {
    supported: FormatSet,
    stats: Arc<Mutex<RendererStats>>,
    refuse_uploaders: Arc<AtomicBool>,
    refuse_frames: Arc<AtomicBool>,
}

impl MemoryRenderer {
    pub fn new(supported: FormatSet) -> Self {
        Self {
            supported,
            stats: Arc::default(),
            refuse_uploaders: Arc::default(),
            refuse_frames: Arc::default(),
        }
    }

    /// Make subsequent [`create_uploader`](Renderer::create_uploader) calls fail
    pub fn refuse_uploaders(&self, refuse: bool) {
        self.refuse_uploaders.store(refuse, Ordering::Relaxed);
    }

    /// Make [`acquire`](Uploader::acquire) fail on every uploader of this
    /// renderer, including existing ones
    pub fn refuse_frames(&self, refuse: bool) {
        self.refuse_frames.store(refuse, Ordering::Relaxed);
    }

    pub fn stats(&self) -> RendererStats {
        self.stats.lock().clone()
    }
}

impl Default for MemoryRenderer {
    fn default() -> Self {
        Self::new(FormatSet::all())
    }
}

impl Renderer for MemoryRenderer {
    fn supported_formats(&self) -> FormatSet {
        self.supported
    }

    fn create_uploader(&self, descriptor: &FrameDescriptor) -> Result<Box<dyn Uploader>> {
        if self.refuse_uploaders.load(Ordering::Relaxed) {
            return Err(VideoError::uploader_creation("renderer refused the uploader"));
        }
        if !self.supported.contains(descriptor.color_format) {
            return Err(VideoError::UnsupportedFormat(descriptor.color_format));
        }

        self.stats.lock().uploaders_created += 1;
        debug!(
            "Created memory uploader for {} {} ({} bytes)",
            descriptor.resolution,
            descriptor.color_format,
            descriptor.size()
        );

        Ok(Box::new(MemoryUploader {
            descriptor: *descriptor,
            stats: Arc::clone(&self.stats),
            refuse_frames: Arc::clone(&self.refuse_frames),
        }))
    }
}

/// Uploader handing out freshly allocated [`MemoryStagedFrame`]s
#[derive(Debug)]
pub struct MemoryUploader {
    descriptor: FrameDescriptor,
    stats: Arc<Mutex<RendererStats>>,
    refuse_frames: Arc<AtomicBool>,
}

impl Uploader for MemoryUploader {
    fn descriptor(&self) -> &FrameDescriptor {
        &self.descriptor
    }

    fn acquire(&mut self) -> Result<Box<dyn StagedFrame>> {
        if self.refuse_frames.load(Ordering::Relaxed) {
            return Err(VideoError::acquire("renderer refused the staged frame"));
        }
        self.stats.lock().frames_acquired += 1;
        Ok(Box::new(MemoryStagedFrame::new(
            self.descriptor,
            Arc::clone(&self.stats),
        )))
    }
}

/// Staged frame with one heap buffer per plane
#[derive(Debug)]
pub struct MemoryStagedFrame {
    descriptor: FrameDescriptor,
    planes: Vec<Vec<u8>>,
    flushed: bool,
    stats: Arc<Mutex<RendererStats>>,
}

impl MemoryStagedFrame {
    fn new(descriptor: FrameDescriptor, stats: Arc<Mutex<RendererStats>>) -> Self {
        let planes = descriptor
            .plane_geometry()
            .iter()
            .map(|plane| vec![0u8; plane.len()])
            .collect();
        Self {
            descriptor,
            planes,
            flushed: false,
            stats,
        }
    }

    /// True once [`flush`](StagedFrame::flush) has been called
    pub fn is_flushed(&self) -> bool {
        self.flushed
    }
}

impl StagedFrame for MemoryStagedFrame {
    fn descriptor(&self) -> &FrameDescriptor {
        &self.descriptor
    }

    fn planes(&self) -> Vec<&[u8]> {
        self.planes.iter().map(Vec::as_slice).collect()
    }

    fn planes_mut(&mut self) -> Vec<&mut [u8]> {
        self.flushed = false;
        self.planes.iter_mut().map(Vec::as_mut_slice).collect()
    }

    fn flush(&mut self) {
        self.flushed = true;
        self.stats.lock().frames_flushed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{
        AspectRatio, ColorFormat, ColorModel, ColorPrimaries, ColorRange, ColorSubsampling,
        ColorTransferFunction,
    };
    use ndi_recv::Resolution;

    fn descriptor(format: ColorFormat) -> FrameDescriptor {
        FrameDescriptor {
            resolution: Resolution::new(64, 32),
            pixel_aspect_ratio: AspectRatio::SQUARE,
            color_primaries: ColorPrimaries::Bt601_625,
            color_model: ColorModel::Bt601,
            color_transfer_function: ColorTransferFunction::Bt601,
            color_subsampling: ColorSubsampling::Rb420,
            color_range: ColorRange::Full,
            color_format: format,
        }
    }

    #[test]
    fn test_staged_frame_planes_match_descriptor() {
        let renderer = MemoryRenderer::default();
        let desc = descriptor(ColorFormat::G8B8R8ThreePlane);
        let mut uploader = renderer.create_uploader(&desc).expect("uploader");
        let frame = uploader.acquire().expect("frame");

        let sizes: Vec<usize> = frame.planes().iter().map(|p| p.len()).collect();
        assert_eq!(sizes, vec![64 * 32, 32 * 16, 32 * 16]);
        assert_eq!(frame.descriptor(), &desc);
    }

    #[test]
    fn test_stats_count_uploaders_and_frames() {
        let renderer = MemoryRenderer::default();
        let mut uploader = renderer
            .create_uploader(&descriptor(ColorFormat::G8B8R8TwoPlane))
            .expect("uploader");
        let mut frame = uploader.acquire().expect("frame");
        frame.flush();
        let _second = uploader.acquire().expect("frame");

        let stats = renderer.stats();
        assert_eq!(stats.uploaders_created, 1);
        assert_eq!(stats.frames_acquired, 2);
        assert_eq!(stats.frames_flushed, 1);
    }

    #[test]
    fn test_unsupported_format_is_refused() {
        let renderer = MemoryRenderer::new(ColorFormat::R8G8B8A8.into());
        let result = renderer.create_uploader(&descriptor(ColorFormat::B8G8R8A8));
        assert!(result.is_err());
        assert_eq!(renderer.stats().uploaders_created, 0);
    }

    #[test]
    fn test_refused_uploaders() {
        let renderer = MemoryRenderer::default();
        renderer.refuse_uploaders(true);
        assert!(renderer
            .create_uploader(&descriptor(ColorFormat::R8G8B8A8))
            .is_err());
        renderer.refuse_uploaders(false);
        assert!(renderer
            .create_uploader(&descriptor(ColorFormat::R8G8B8A8))
            .is_ok());
    }

    #[test]
    fn test_refused_frames() {
        let renderer = MemoryRenderer::default();
        let mut uploader = renderer
            .create_uploader(&descriptor(ColorFormat::R8G8B8A8))
            .expect("uploader");

        renderer.refuse_frames(true);
        assert!(matches!(uploader.acquire(), Err(VideoError::Acquire(_))));
        assert_eq!(renderer.stats().frames_acquired, 0);

        renderer.refuse_frames(false);
        assert!(uploader.acquire().is_ok());
        assert_eq!(renderer.stats().frames_acquired, 1);
    }

    #[test]
    fn test_flush_flag() {
        let mut frame = MemoryStagedFrame::new(
            descriptor(ColorFormat::R8G8B8A8),
            Arc::default(),
        );
        assert!(!frame.is_flushed());
        frame.planes_mut()[0][0] = 1;
        frame.flush();
        assert!(frame.is_flushed());
        assert_eq!(frame.planes()[0][0], 1);
    }
}
