//! Resources of an open source
//!
//! An [`IngestionSession`] exists exactly while its source is open. It owns
//! the network connection, the frame currently held from it, the uploader
//! for the accepted video mode and the staged frame produced from the held
//! frame.

use std::sync::Arc;
use std::time::Duration;

use ndi_recv::{
    CaptureMode, CaptureStatus, Connection, NetworkBackend, ReceiverConfig, ScanFormat, Source,
    SourceFrame, Tally,
};
use ndi_video::{
    derive_mode, Conversion, FrameDescriptor, Renderer, StagedFrame, Uploader, VideoMode,
};
use tracing::{debug, info, trace, warn};

use crate::error::Result;

pub(crate) struct IngestionSession {
    connection: Connection,
    renderer: Arc<dyn Renderer>,
    capture_timeout: Duration,
    /// Latest captured frame; its data is held until uploaded or replaced
    frame: SourceFrame,
    uploader: Option<Box<dyn Uploader>>,
    conversion: Option<Conversion>,
    /// Output produced from `frame`, reused until the next capture
    staged: Option<Arc<dyn StagedFrame>>,
}

impl IngestionSession {
    /// Connect to `source` and apply `tally`
    ///
    /// May block on the network.
    pub(crate) fn open(
        backend: &dyn NetworkBackend,
        renderer: Arc<dyn Renderer>,
        source: &Source,
        config: &ReceiverConfig,
        receiver_name: &str,
        tally: Tally,
    ) -> Result<Self> {
        let mut connection = backend.connect(source, config, receiver_name)?;

        if connection.frame_sync.is_none() && config.capture_mode == CaptureMode::FrameSync {
            warn!("Backend created no frame-sync, capturing directly");
        }
        if !connection.receiver.set_tally(tally) {
            warn!("Receiver {} rejected the initial tally", receiver_name);
        }

        info!("Receiver {:?} connected to {}", receiver_name, source);
        Ok(Self {
            connection,
            renderer,
            capture_timeout: config.capture_timeout(),
            frame: SourceFrame::default(),
            uploader: None,
            conversion: None,
            staged: None,
        })
    }

    pub(crate) fn frame(&self) -> &SourceFrame {
        &self.frame
    }

    pub(crate) fn has_uploader(&self) -> bool {
        self.uploader.is_some()
    }

    /// Capture the latest frame
    ///
    /// Returns `true` if its geometry differs from the previous frame's.
    pub(crate) fn pull_frame(&mut self) -> bool {
        let previous = self.frame.geometry();

        if self.connection.frame_sync.is_some() {
            self.release_frame();
            if let Some(frame_sync) = self.connection.frame_sync.as_mut() {
                frame_sync.capture(&mut self.frame, ScanFormat::Progressive);
            }
            self.staged = None;
        } else {
            let mut captured = SourceFrame::default();
            match self
                .connection
                .receiver
                .capture(&mut captured, self.capture_timeout)
            {
                CaptureStatus::Video => {
                    self.release_frame();
                    self.frame = captured;
                    self.staged = None;
                }
                status => {
                    // Anything but video leaves the previous frame in place
                    if captured.is_held() {
                        self.connection.receiver.free(&mut captured);
                    }
                    if status == CaptureStatus::Error {
                        warn!("Receiver reported a capture error");
                    } else {
                        trace!("No new frame ({:?})", status);
                    }
                    return false;
                }
            }
        }

        let changed = self.frame.geometry() != previous;
        if changed {
            debug!(
                "Frame geometry changed: {} {:?} @ {}",
                self.frame.resolution(),
                self.frame.fourcc(),
                self.frame.frame_rate()
            );
        }
        changed
    }

    /// Video mode of the current frame against the renderer's formats
    pub(crate) fn supported_video_mode(&self) -> Option<VideoMode> {
        if !self.frame.is_held() {
            return None;
        }
        derive_mode(&self.frame, self.renderer.supported_formats())
    }

    /// Replace the uploader, or drop it when `descriptor` is `None`
    pub(crate) fn recreate(&mut self, descriptor: Option<&FrameDescriptor>) -> Result<()> {
        self.uploader = None;
        self.conversion = None;
        self.staged = None;

        if let Some(descriptor) = descriptor {
            let uploader = self.renderer.create_uploader(descriptor)?;
            info!(
                "Uploader created for {} {}",
                descriptor.resolution, descriptor.color_format
            );
            self.uploader = Some(uploader);
            self.select_conversion();
        }
        Ok(())
    }

    /// Pick the conversion from the held frame's tag to the uploader's format
    pub(crate) fn select_conversion(&mut self) {
        let Some(uploader) = self.uploader.as_ref() else {
            self.conversion = None;
            return;
        };
        let format = uploader.descriptor().color_format;
        let conversion = self
            .frame
            .fourcc()
            .and_then(|fourcc| Conversion::select(fourcc, format));
        assert!(
            conversion.is_some() || !self.frame.is_held(),
            "no conversion from {:?} to {}",
            self.frame.fourcc(),
            format
        );

        if conversion != self.conversion {
            debug!("Conversion {:?} -> {:?}", self.conversion, conversion);
        }
        self.conversion = conversion;
    }

    /// Staged frame for the current capture
    ///
    /// Converts at most once per captured frame. The source frame is handed
    /// back to the network as soon as it has been copied.
    pub(crate) fn upload_frame(&mut self) -> Result<Option<Arc<dyn StagedFrame>>> {
        if let Some(staged) = &self.staged {
            return Ok(Some(Arc::clone(staged)));
        }

        let (Some(uploader), Some(conversion)) = (self.uploader.as_mut(), self.conversion) else {
            return Ok(None);
        };
        if !self.frame.is_held() {
            return Ok(None);
        }
        if !conversion.accepts(&self.frame)
            || self.frame.resolution() != uploader.descriptor().resolution
        {
            warn!(
                "Held {} {:?} frame does not match the accepted mode, skipping",
                self.frame.resolution(),
                self.frame.fourcc()
            );
            return Ok(None);
        }

        let mut staged = uploader.acquire()?;
        conversion.convert(&self.frame, staged.as_mut());
        staged.flush();
        self.release_frame();

        let staged: Arc<dyn StagedFrame> = Arc::from(staged);
        self.staged = Some(Arc::clone(&staged));
        Ok(Some(staged))
    }

    /// Reconnect the existing receiver to another source
    pub(crate) fn set_source(&mut self, source: &Source) {
        info!("Reconnecting receiver to {}", source);
        self.connection.receiver.connect(source);
    }

    pub(crate) fn set_tally(&mut self, tally: Tally) {
        if !self.connection.receiver.set_tally(tally) {
            warn!("Receiver rejected tally {:?}", tally);
        }
    }

    /// Hand the held frame back to whichever handle produced it
    fn release_frame(&mut self) {
        if !self.frame.is_held() {
            return;
        }
        match self.connection.frame_sync.as_mut() {
            Some(frame_sync) => frame_sync.free(&mut self.frame),
            None => self.connection.receiver.free(&mut self.frame),
        }
    }
}

impl Drop for IngestionSession {
    fn drop(&mut self) {
        self.staged = None;
        self.uploader = None;
        self.release_frame();
        debug!("Ingestion session destroyed");
    }
}
