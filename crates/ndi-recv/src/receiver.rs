//! Receivers and frame-sync helpers
//!
//! The ingest lifecycle talks to the network only through the [`Receiver`],
//! [`FrameSync`] and [`NetworkBackend`] traits. [`NdiBackend`] implements them
//! on top of the NDI runtime; the `synthetic` feature provides an in-memory
//! implementation for tests.
//!
//! # Frame ownership
//!
//! A frame filled by `capture` points at memory owned by the handle that
//! produced it. It must be handed back through `free` on the same handle
//! before the next capture into it and before the handle is dropped. `free`
//! clears the frame's data pointer, so releasing twice is impossible.

use std::ffi::{c_int, CString};
use std::fmt;
use std::ptr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{CaptureMode, ReceiverConfig};
use crate::error::{NdiError, Result};
use crate::ffi::{
    NDIlib_framesync_instance_t, NDIlib_recv_create_v3_t, NDIlib_recv_instance_t, NDIlib_tally_t,
    NDILIB_FRAME_TYPE_ERROR, NDILIB_FRAME_TYPE_NONE, NDILIB_FRAME_TYPE_STATUS_CHANGE,
    NDILIB_FRAME_TYPE_VIDEO,
};
use crate::frame::{ScanFormat, SourceFrame};
use crate::library::NdiLibrary;
use crate::source::Source;

/// Program/preview state signalled back to the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Tally {
    pub program: bool,
    pub preview: bool,
}

impl Tally {
    pub const fn new(program: bool, preview: bool) -> Self {
        Self { program, preview }
    }
}

/// Outcome of a direct capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    /// A video frame was written and must be freed
    Video,
    /// Nothing arrived within the timeout
    Timeout,
    /// Sender settings changed, no frame written
    StatusChange,
    /// The connection was lost
    Error,
    /// A frame type that was not requested (audio or metadata)
    Other(i32),
}

impl CaptureStatus {
    pub(crate) const fn from_raw(raw: c_int) -> Self {
        match raw {
            NDILIB_FRAME_TYPE_VIDEO => CaptureStatus::Video,
            NDILIB_FRAME_TYPE_NONE => CaptureStatus::Timeout,
            NDILIB_FRAME_TYPE_STATUS_CHANGE => CaptureStatus::StatusChange,
            NDILIB_FRAME_TYPE_ERROR => CaptureStatus::Error,
            other => CaptureStatus::Other(other),
        }
    }
}

/// A connected network receiver
pub trait Receiver: Send {
    /// Switch to another source without recreating the receiver
    fn connect(&mut self, source: &Source);

    /// Wait up to `timeout` for the next video frame
    fn capture(&mut self, frame: &mut SourceFrame, timeout: Duration) -> CaptureStatus;

    /// Hand a captured frame back; a frame that is not held is left alone
    fn free(&mut self, frame: &mut SourceFrame);

    /// Returns `false` if the sender could not be told
    fn set_tally(&mut self, tally: Tally) -> bool;
}

/// Frame-sync helper wrapped around a receiver
///
/// Capture never blocks: it always yields the most recent frame, or an empty
/// frame (null data) while nothing has been received yet.
pub trait FrameSync: Send {
    fn capture(&mut self, frame: &mut SourceFrame, scan: ScanFormat);

    fn free(&mut self, frame: &mut SourceFrame);
}

/// Receiver plus the optional frame-sync wrapped around it
///
/// Fields are declared so the frame-sync is dropped before the receiver.
pub struct Connection {
    /// Present in [`CaptureMode::FrameSync`]
    pub frame_sync: Option<Box<dyn FrameSync>>,
    pub receiver: Box<dyn Receiver>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("frame_sync", &self.frame_sync.is_some())
            .finish_non_exhaustive()
    }
}

/// Creates connections to sources
pub trait NetworkBackend: Send + Sync {
    /// Connect a receiver named `name` to `source`
    fn connect(&self, source: &Source, config: &ReceiverConfig, name: &str)
        -> Result<Connection>;
}

/// Owns one runtime receiver instance
struct RecvHandle {
    lib: Arc<NdiLibrary>,
    instance: NDIlib_recv_instance_t,
}

// SAFETY: receiver instances are not tied to the creating thread; every use
// goes through `&mut` on the owning wrapper or happens in `drop`.
unsafe impl Send for RecvHandle {}
unsafe impl Sync for RecvHandle {}

impl Drop for RecvHandle {
    fn drop(&mut self) {
        // SAFETY: created by `recv_create`, destroyed exactly once, after any
        // frame-sync holding a clone of this handle
        unsafe { (self.lib.recv_destroy)(self.instance) };
    }
}

/// [`Receiver`] backed by an NDI runtime receiver
pub struct NdiReceiver {
    handle: Arc<RecvHandle>,
}

impl NdiReceiver {
    pub fn new(
        lib: Arc<NdiLibrary>,
        source: &Source,
        config: &ReceiverConfig,
        name: &str,
    ) -> Result<Self> {
        let name = CString::new(name)?;
        let create = NDIlib_recv_create_v3_t {
            source_to_connect_to: source.as_raw(),
            color_format: config.color_format.to_raw(),
            bandwidth: config.bandwidth.to_raw(),
            allow_video_fields: config.allow_video_fields,
            p_ndi_recv_name: name.as_ptr(),
        };

        // SAFETY: `create` and every string it points at outlive the call
        let instance = unsafe { (lib.recv_create)(&create) };
        if instance.is_null() {
            return Err(NdiError::receiver_creation(format!(
                "NDIlib_recv_create_v3 returned null for {}",
                source
            )));
        }

        info!("Created NDI receiver {:?} for {}", name, source);
        Ok(Self {
            handle: Arc::new(RecvHandle { lib, instance }),
        })
    }

    fn lib(&self) -> &NdiLibrary {
        &self.handle.lib
    }
}

impl Receiver for NdiReceiver {
    fn connect(&mut self, source: &Source) {
        let raw = source.as_raw();
        // SAFETY: a null descriptor disconnects; otherwise the strings live in
        // `source` for the duration of the call and the runtime copies them
        unsafe {
            let ptr = if source.is_empty() { ptr::null() } else { &raw as *const _ };
            (self.lib().recv_connect)(self.handle.instance, ptr);
        }
        debug!("NDI receiver connected to {}", source);
    }

    fn capture(&mut self, frame: &mut SourceFrame, timeout: Duration) -> CaptureStatus {
        debug_assert!(!frame.is_held(), "capture into a frame that was not freed");
        let timeout_ms = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);

        // SAFETY: `frame` is a valid video frame struct; audio and metadata are
        // not requested
        let raw = unsafe {
            (self.lib().recv_capture)(
                self.handle.instance,
                frame.as_raw_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                timeout_ms,
            )
        };
        CaptureStatus::from_raw(raw)
    }

    fn free(&mut self, frame: &mut SourceFrame) {
        if !frame.is_held() {
            return;
        }
        // SAFETY: the frame was produced by this receiver and not yet freed
        unsafe { (self.lib().recv_free_video)(self.handle.instance, frame.as_raw()) };
        frame.clear_data();
    }

    fn set_tally(&mut self, tally: Tally) -> bool {
        let raw = NDIlib_tally_t {
            on_program: tally.program,
            on_preview: tally.preview,
        };
        // SAFETY: `raw` lives for the duration of the call
        unsafe { (self.lib().recv_set_tally)(self.handle.instance, &raw) }
    }
}

/// [`FrameSync`] backed by an NDI runtime frame-sync
pub struct NdiFrameSync {
    instance: NDIlib_framesync_instance_t,
    /// Keeps the wrapped receiver alive until this frame-sync is destroyed
    receiver: Arc<RecvHandle>,
}

// SAFETY: see `RecvHandle`; the frame-sync instance is only used via `&mut`
unsafe impl Send for NdiFrameSync {}

impl NdiFrameSync {
    pub fn new(receiver: &NdiReceiver) -> Result<Self> {
        let handle = Arc::clone(&receiver.handle);
        // SAFETY: the receiver instance is valid and outlives the frame-sync
        let instance = unsafe { (handle.lib.framesync_create)(handle.instance) };
        if instance.is_null() {
            return Err(NdiError::frame_sync_creation(
                "NDIlib_framesync_create returned null",
            ));
        }
        Ok(Self {
            instance,
            receiver: handle,
        })
    }
}

impl FrameSync for NdiFrameSync {
    fn capture(&mut self, frame: &mut SourceFrame, scan: ScanFormat) {
        debug_assert!(!frame.is_held(), "capture into a frame that was not freed");
        // SAFETY: `frame` is a valid video frame struct for the runtime to fill
        unsafe {
            (self.receiver.lib.framesync_capture_video)(
                self.instance,
                frame.as_raw_mut(),
                scan.to_raw(),
            );
        }
    }

    fn free(&mut self, frame: &mut SourceFrame) {
        if !frame.is_held() {
            return;
        }
        // SAFETY: the frame was produced by this frame-sync and not yet freed
        unsafe { (self.receiver.lib.framesync_free_video)(self.instance, frame.as_raw_mut()) };
        frame.clear_data();
    }
}

impl Drop for NdiFrameSync {
    fn drop(&mut self) {
        // SAFETY: created in `new`, destroyed exactly once, before the receiver
        unsafe { (self.receiver.lib.framesync_destroy)(self.instance) };
    }
}

/// [`NetworkBackend`] creating NDI runtime receivers
#[derive(Debug, Clone)]
pub struct NdiBackend {
    lib: Arc<NdiLibrary>,
}

impl NdiBackend {
    pub fn new(lib: Arc<NdiLibrary>) -> Self {
        Self { lib }
    }
}

impl NetworkBackend for NdiBackend {
    fn connect(
        &self,
        source: &Source,
        config: &ReceiverConfig,
        name: &str,
    ) -> Result<Connection> {
        if let Err(issues) = config.validate() {
            warn!("Receiver configuration issues: {}", issues.join(", "));
        }

        let receiver = NdiReceiver::new(Arc::clone(&self.lib), source, config, name)?;
        let frame_sync = match config.capture_mode {
            CaptureMode::FrameSync => {
                Some(Box::new(NdiFrameSync::new(&receiver)?) as Box<dyn FrameSync>)
            }
            CaptureMode::Direct => None,
        };

        Ok(Connection {
            frame_sync,
            receiver: Box::new(receiver),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_status_mapping() {
        assert_eq!(CaptureStatus::from_raw(1), CaptureStatus::Video);
        assert_eq!(CaptureStatus::from_raw(0), CaptureStatus::Timeout);
        assert_eq!(CaptureStatus::from_raw(100), CaptureStatus::StatusChange);
        assert_eq!(CaptureStatus::from_raw(4), CaptureStatus::Error);
        assert_eq!(CaptureStatus::from_raw(2), CaptureStatus::Other(2));
    }

    #[test]
    fn test_tally_default_is_off() {
        let tally = Tally::default();
        assert!(!tally.program);
        assert!(!tally.preview);
        assert!(Tally::new(true, false).program);
    }
}
