//! In-memory network backend
//!
//! Frames pushed into a [`SyntheticFeed`] are handed out the way the NDI
//! runtime hands them out: every capture copies the pixels into a buffer owned
//! by the feed, and that buffer stays alive until the frame is freed. The feed
//! counts captures and frees, so tests can check that nothing leaks and
//! nothing is freed twice.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use ndi_recv::synthetic::SyntheticFeed;
//! use ndi_recv::{
//!     FourCC, NetworkBackend, Rational, ReceiverConfig, Resolution, ScanFormat, Source,
//!     SourceFrame,
//! };
//!
//! let feed = SyntheticFeed::new();
//! let template = SourceFrame::new(
//!     Resolution::new(2, 2),
//!     FourCC::BGRA,
//!     Rational::new(25, 1),
//!     0.0,
//!     ScanFormat::Progressive,
//! );
//! feed.push_frame(template, 8, vec![0xFF; 16]);
//!
//! let backend = feed.backend();
//! let source = Source::new("TEST (Bars)").unwrap();
//! let mut conn = backend.connect(&source, &ReceiverConfig::default(), "test").unwrap();
//!
//! let frame_sync = conn.frame_sync.as_mut().unwrap();
//! let mut frame = SourceFrame::default();
//! frame_sync.capture(&mut frame, ScanFormat::Progressive);
//! assert!(frame.is_held());
//! frame_sync.free(&mut frame);
//! assert_eq!(feed.stats().outstanding, 0);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::{CaptureMode, ReceiverConfig};
use crate::error::{NdiError, Result};
use crate::frame::{ScanFormat, SourceFrame};
use crate::receiver::{CaptureStatus, Connection, FrameSync, NetworkBackend, Receiver, Tally};
use crate::source::Source;

struct PushedFrame {
    /// Frame parameters without data, copied into every capture
    template: SourceFrame,
    stride: usize,
    data: Arc<[u8]>,
}

impl Clone for PushedFrame {
    fn clone(&self) -> Self {
        Self {
            template: self.template.detached(),
            stride: self.stride,
            data: Arc::clone(&self.data),
        }
    }
}

#[derive(Default)]
struct FeedState {
    /// What a frame-sync capture returns
    latest: Option<PushedFrame>,
    /// What direct captures return, in order
    queue: VecDeque<PushedFrame>,
    /// Buffers handed out and not yet freed, keyed by address
    outstanding: HashMap<usize, Box<[u8]>>,
    refuse_connect: bool,
    stats: FeedStats,
}

/// Counters exposed by [`SyntheticFeed::stats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Connections created through the backend
    pub connections: usize,
    /// Receiver names used for those connections
    pub receiver_names: Vec<String>,
    /// Source the newest receiver is connected to
    pub source: Option<Source>,
    /// `Receiver::connect` calls (reconnects)
    pub reconnects: usize,
    /// Captures that handed out a buffer
    pub captures: usize,
    /// Buffers handed back
    pub frees: usize,
    /// Buffers currently handed out
    pub outstanding: usize,
    /// Every tally sent, oldest first
    pub tallies: Vec<Tally>,
}

/// Producer side of the synthetic network
#[derive(Clone, Default)]
pub struct SyntheticFeed {
    state: Arc<Mutex<FeedState>>,
}

impl SyntheticFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose connections read from this feed
    pub fn backend(&self) -> SyntheticBackend {
        SyntheticBackend { feed: self.clone() }
    }

    /// Publish a frame
    ///
    /// `template` supplies the geometry; its data pointer is ignored. The frame
    /// becomes the latest frame for frame-sync captures and is queued once for
    /// direct captures.
    pub fn push_frame(&self, template: SourceFrame, stride: usize, data: Vec<u8>) {
        let mut template = template;
        template.clear_data();

        if let Some(fourcc) = template.fourcc() {
            let needed = fourcc
                .layout()
                .total_size(stride, template.resolution().height);
            assert!(
                data.len() >= needed,
                "synthetic {} frame needs {} bytes, got {}",
                fourcc,
                needed,
                data.len()
            );
        }

        let pushed = PushedFrame {
            template,
            stride,
            data: data.into(),
        };
        let mut state = self.state.lock();
        state.latest = Some(pushed.clone());
        state.queue.push_back(pushed);
    }

    /// Make the next connection attempts fail
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().refuse_connect = refuse;
    }

    pub fn stats(&self) -> FeedStats {
        let state = self.state.lock();
        FeedStats {
            outstanding: state.outstanding.len(),
            ..state.stats.clone()
        }
    }

    /// Copy `pushed` into a fresh buffer and point `frame` at it
    fn hand_out(state: &mut FeedState, pushed: &PushedFrame, frame: &mut SourceFrame) {
        let mut buffer: Box<[u8]> = pushed.data.as_ref().into();
        *frame = pushed.template.detached();
        // SAFETY: the buffer is kept in `outstanding` until the frame is freed,
        // and moving the box does not move its heap allocation
        unsafe { frame.set_data(buffer.as_mut_ptr(), pushed.stride) };

        state.outstanding.insert(buffer.as_ptr() as usize, buffer);
        state.stats.captures += 1;
        trace!("Synthetic capture {}", state.stats.captures);
    }

    fn take_back(&self, frame: &mut SourceFrame) {
        if !frame.is_held() {
            return;
        }
        let mut state = self.state.lock();
        let released = state.outstanding.remove(&(frame.data_ptr() as usize));
        assert!(
            released.is_some(),
            "freed a frame buffer that the synthetic feed did not hand out"
        );
        state.stats.frees += 1;
        frame.clear_data();
    }
}

/// [`NetworkBackend`] over a [`SyntheticFeed`]
#[derive(Clone)]
pub struct SyntheticBackend {
    feed: SyntheticFeed,
}

impl NetworkBackend for SyntheticBackend {
    fn connect(
        &self,
        source: &Source,
        config: &ReceiverConfig,
        name: &str,
    ) -> Result<Connection> {
        {
            let mut state = self.feed.state.lock();
            if state.refuse_connect {
                return Err(NdiError::receiver_creation(format!(
                    "synthetic feed refused connection to {}",
                    source
                )));
            }
            state.stats.connections += 1;
            state.stats.receiver_names.push(name.to_string());
            state.stats.source = Some(source.clone());
        }
        debug!("Synthetic receiver {:?} connected to {}", name, source);

        let frame_sync = match config.capture_mode {
            CaptureMode::FrameSync => Some(Box::new(SyntheticFrameSync {
                feed: self.feed.clone(),
            }) as Box<dyn FrameSync>),
            CaptureMode::Direct => None,
        };
        Ok(Connection {
            frame_sync,
            receiver: Box::new(SyntheticReceiver {
                feed: self.feed.clone(),
            }),
        })
    }
}

struct SyntheticReceiver {
    feed: SyntheticFeed,
}

impl Receiver for SyntheticReceiver {
    fn connect(&mut self, source: &Source) {
        let mut state = self.feed.state.lock();
        state.stats.reconnects += 1;
        state.stats.source = Some(source.clone());
    }

    fn capture(&mut self, frame: &mut SourceFrame, _timeout: Duration) -> CaptureStatus {
        assert!(!frame.is_held(), "capture into a frame that was not freed");
        let mut state = self.feed.state.lock();
        match state.queue.pop_front() {
            Some(pushed) => {
                SyntheticFeed::hand_out(&mut state, &pushed, frame);
                CaptureStatus::Video
            }
            None => CaptureStatus::Timeout,
        }
    }

    fn free(&mut self, frame: &mut SourceFrame) {
        self.feed.take_back(frame);
    }

    fn set_tally(&mut self, tally: Tally) -> bool {
        self.feed.state.lock().stats.tallies.push(tally);
        true
    }
}

struct SyntheticFrameSync {
    feed: SyntheticFeed,
}

impl FrameSync for SyntheticFrameSync {
    fn capture(&mut self, frame: &mut SourceFrame, _scan: ScanFormat) {
        assert!(!frame.is_held(), "capture into a frame that was not freed");
        let mut state = self.feed.state.lock();
        match state.latest.clone() {
            Some(pushed) => SyntheticFeed::hand_out(&mut state, &pushed, frame),
            None => frame.clear_data(),
        }
    }

    fn free(&mut self, frame: &mut SourceFrame) {
        self.feed.take_back(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FourCC, Rational, Resolution};

    fn template(fourcc: FourCC) -> SourceFrame {
        SourceFrame::new(
            Resolution::new(4, 2),
            fourcc,
            Rational::new(30000, 1001),
            0.0,
            ScanFormat::Progressive,
        )
    }

    fn connect(feed: &SyntheticFeed, mode: CaptureMode) -> Connection {
        let config = ReceiverConfig {
            capture_mode: mode,
            ..Default::default()
        };
        let source = Source::new("TEST (Synthetic)").expect("valid");
        feed.backend()
            .connect(&source, &config, "HOST (Test)")
            .expect("connect")
    }

    #[test]
    fn test_frame_sync_without_frames_yields_empty() {
        let feed = SyntheticFeed::new();
        let mut conn = connect(&feed, CaptureMode::FrameSync);
        let frame_sync = conn.frame_sync.as_mut().expect("frame sync");

        let mut frame = SourceFrame::default();
        frame_sync.capture(&mut frame, ScanFormat::Progressive);
        assert!(!frame.is_held());
        frame_sync.free(&mut frame);
        assert_eq!(feed.stats().frees, 0);
    }

    #[test]
    fn test_frame_sync_repeats_latest_frame() {
        let feed = SyntheticFeed::new();
        feed.push_frame(template(FourCC::UYVY), 8, (0..16).collect());
        let mut conn = connect(&feed, CaptureMode::FrameSync);
        let frame_sync = conn.frame_sync.as_mut().expect("frame sync");

        let mut frame = SourceFrame::default();
        for _ in 0..3 {
            frame_sync.capture(&mut frame, ScanFormat::Progressive);
            assert!(frame.is_held());
            assert_eq!(frame.fourcc(), Some(FourCC::UYVY));
            assert_eq!(frame.planes().expect("held")[0][5], 5);
            frame_sync.free(&mut frame);
            assert!(!frame.is_held());
        }

        let stats = feed.stats();
        assert_eq!(stats.captures, 3);
        assert_eq!(stats.frees, 3);
        assert_eq!(stats.outstanding, 0);
    }

    #[test]
    fn test_direct_capture_drains_queue() {
        let feed = SyntheticFeed::new();
        feed.push_frame(template(FourCC::BGRA), 16, vec![1; 32]);
        let mut conn = connect(&feed, CaptureMode::Direct);
        assert!(conn.frame_sync.is_none());

        let mut frame = SourceFrame::default();
        let status = conn.receiver.capture(&mut frame, Duration::from_millis(5));
        assert_eq!(status, CaptureStatus::Video);
        conn.receiver.free(&mut frame);

        let status = conn.receiver.capture(&mut frame, Duration::from_millis(5));
        assert_eq!(status, CaptureStatus::Timeout);
        assert!(!frame.is_held());
    }

    #[test]
    fn test_tally_and_reconnect_recorded() {
        let feed = SyntheticFeed::new();
        let mut conn = connect(&feed, CaptureMode::FrameSync);

        assert!(conn.receiver.set_tally(Tally::new(true, false)));
        let other = Source::new("TEST (Other)").expect("valid");
        conn.receiver.connect(&other);

        let stats = feed.stats();
        assert_eq!(stats.connections, 1);
        assert_eq!(stats.receiver_names, vec!["HOST (Test)".to_string()]);
        assert_eq!(stats.reconnects, 1);
        assert_eq!(stats.source, Some(other));
        assert_eq!(stats.tallies, vec![Tally::new(true, false)]);
    }

    #[test]
    fn test_refused_connection() {
        let feed = SyntheticFeed::new();
        feed.refuse_connections(true);
        let source = Source::new("TEST (Synthetic)").expect("valid");
        let err = feed
            .backend()
            .connect(&source, &ReceiverConfig::default(), "x")
            .expect_err("refused");
        assert!(matches!(err, NdiError::ReceiverCreation(_)));
    }

    #[test]
    #[should_panic(expected = "did not hand out")]
    fn test_foreign_buffer_free_panics() {
        let feed = SyntheticFeed::new();
        let mut conn = connect(&feed, CaptureMode::FrameSync);
        let mut buffer = vec![0u8; 16];
        let mut frame = template(FourCC::UYVY);
        // SAFETY: the buffer outlives the frame
        unsafe { frame.set_data(buffer.as_mut_ptr(), 8) };
        conn.frame_sync.as_mut().expect("frame sync").free(&mut frame);
    }
}
