//! NDI source lifecycle
//!
//! [`NdiSource`] is the state machine tying a network receiver, a renderer
//! uploader and the host schedule together:
//!
//! ```text
//! Closed --open--> Opening --> Idle <--mode proposal--> Streaming
//!   ^                                                      |
//!   +---------------- Closing <---------close--------------+
//! ```
//!
//! Every method taking an [`InstanceLock`] must be called with the instance
//! lock held. `open` and `close` release it while they connect or tear down,
//! since both may block on the network.

use std::fmt;
use std::sync::Arc;

use ndi_recv::{NetworkBackend, Source, Tally};
use ndi_video::{Renderer, StagedFrame, VideoMode};
use parking_lot::MutexGuard;
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::error::{Result, SourceError};
use crate::instance::{ComponentId, Instance, InstanceLock, Scheduler};
use crate::session::IngestionSession;

/// Lifecycle state of an [`NdiSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SourceState {
    #[default]
    Closed,
    /// Connecting with the instance lock released
    Opening,
    /// Open, no video mode accepted
    Idle,
    /// Open with an uploader for the accepted mode
    Streaming,
    /// Tearing down with the instance lock released
    Closing,
}

impl fmt::Display for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceState::Closed => "closed",
            SourceState::Opening => "opening",
            SourceState::Idle => "idle",
            SourceState::Streaming => "streaming",
            SourceState::Closing => "closing",
        };
        f.write_str(s)
    }
}

/// A video source fed by an NDI receiver
pub struct NdiSource {
    id: ComponentId,
    name: String,
    source: Source,
    tally: Tally,
    config: SourceConfig,
    backend: Arc<dyn NetworkBackend>,
    renderer: Arc<dyn Renderer>,
    state: SourceState,
    video_mode: Option<VideoMode>,
    session: Option<IngestionSession>,
}

impl NdiSource {
    /// Register a new, closed source with `instance`
    pub fn new(
        instance: &Instance,
        name: impl Into<String>,
        source: Source,
        backend: Arc<dyn NetworkBackend>,
        renderer: Arc<dyn Renderer>,
        config: SourceConfig,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|issues| SourceError::InvalidConfig(issues.join(", ")))?;

        let id = instance.lock().register();
        Ok(Self {
            id,
            name: name.into(),
            source,
            tally: Tally::default(),
            config,
            backend,
            renderer,
            state: SourceState::Closed,
            video_mode: None,
            session: None,
        })
    }

    /// Connect and start asking for regular updates
    ///
    /// The receiver is created with the instance lock released.
    pub fn open(&mut self, lock: &mut InstanceLock<'_>) -> Result<()> {
        if self.state != SourceState::Closed || self.session.is_some() {
            return Err(SourceError::invalid_state(format!(
                "open called on a source that is {}",
                self.state
            )));
        }

        self.state = SourceState::Opening;
        let receiver_name = self.receiver_name();
        let built = MutexGuard::unlocked(lock, || {
            IngestionSession::open(
                self.backend.as_ref(),
                Arc::clone(&self.renderer),
                &self.source,
                &self.config.receiver,
                &receiver_name,
                self.tally,
            )
        });

        let session = match built {
            Ok(session) => session,
            Err(e) => {
                self.state = SourceState::Closed;
                return Err(e);
            }
        };

        self.session = Some(session);
        // The frame rate is unknown until the first frame arrives
        lock.schedule(self.id)
            .enable_regular_update(self.config.priority);
        self.state = SourceState::Idle;

        info!("Source {:?} opened as {:?}", self.name, receiver_name);
        Ok(())
    }

    /// Stop all updates, withdraw the published modes and tear down
    ///
    /// The session is destroyed with the instance lock released.
    pub fn close(&mut self, lock: &mut InstanceLock<'_>) -> Result<()> {
        if self.session.is_none() {
            return Err(SourceError::invalid_state(format!(
                "close called on a source that is {}",
                self.state
            )));
        }

        self.state = SourceState::Closing;
        let schedule = lock.schedule(self.id);
        schedule.disable_periodic_update();
        schedule.disable_regular_update();
        schedule.set_video_mode_compatibility(Vec::new());
        self.video_mode = None;

        let session = self.session.take();
        MutexGuard::unlocked(lock, || drop(session));

        self.state = SourceState::Closed;
        info!("Source {:?} closed", self.name);
        Ok(())
    }

    /// Recurring update: capture a frame and republish compatibility when
    /// its geometry changed
    pub fn on_tick(&mut self, lock: &mut InstanceLock<'_>) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Err(SourceError::invalid_state(format!(
                "update called on a source that is {}",
                self.state
            )));
        };

        if session.pull_frame() {
            let compatibility: Vec<VideoMode> = session.supported_video_mode().into_iter().collect();
            debug!(
                "Source {:?} publishes {} compatible mode(s)",
                self.name,
                compatibility.len()
            );
            lock.schedule(self.id)
                .set_video_mode_compatibility(compatibility);
        }
        Ok(())
    }

    /// Downstream accepted `mode` (or no mode)
    ///
    /// Recreates the uploader and switches to periodic updates at the mode's
    /// frame period, or drops the uploader and returns to regular updates.
    /// Returns whether the source now streams. Repeating the current mode
    /// only refreshes the conversion.
    pub fn on_mode_proposal(
        &mut self,
        lock: &mut InstanceLock<'_>,
        mode: Option<&VideoMode>,
    ) -> Result<bool> {
        let Some(session) = self.session.as_mut() else {
            return Err(SourceError::invalid_state(format!(
                "mode proposal on a source that is {}",
                self.state
            )));
        };

        if mode == self.video_mode.as_ref() && mode.is_some() == session.has_uploader() {
            // Same mode, but the tag may have moved within the same family
            session.select_conversion();
            return Ok(self.state == SourceState::Streaming);
        }

        let priority = self.config.priority;
        let schedule = lock.schedule(self.id);
        schedule.disable_regular_update();
        schedule.disable_periodic_update();

        let Some(mode) = mode else {
            session.recreate(None)?;
            schedule.enable_regular_update(priority);
            self.video_mode = None;
            self.state = SourceState::Idle;
            debug!("Source {:?} has no video mode", self.name);
            return Ok(false);
        };

        if let Err(e) = session.recreate(Some(&mode.frame_descriptor())) {
            warn!("Source {:?} cannot stream {}: {}", self.name, mode.resolution, e);
            schedule.enable_regular_update(priority);
            self.video_mode = None;
            self.state = SourceState::Idle;
            return Err(e);
        }

        match mode.frame_period() {
            Some(period) => schedule.enable_periodic_update(priority, period),
            None => {
                warn!("Source {:?} has no usable frame rate", self.name);
                schedule.enable_regular_update(priority);
            }
        }
        self.video_mode = Some(mode.clone());
        self.state = SourceState::Streaming;

        info!(
            "Source {:?} streaming {} @ {} as {:?}",
            self.name,
            mode.resolution,
            mode.frame_rate,
            mode.formats()
        );
        Ok(true)
    }

    /// Output for the downstream consumer
    ///
    /// `None` while closed or without an accepted mode. Repeated pulls between
    /// captures return the same staged frame.
    pub fn pull(&mut self) -> Result<Option<Arc<dyn StagedFrame>>> {
        match self.session.as_mut() {
            Some(session) => session.upload_frame(),
            None => Ok(None),
        }
    }

    /// Change the network source; an open receiver reconnects in place
    pub fn set_source(&mut self, source: Source) {
        self.source = source;
        if let Some(session) = self.session.as_mut() {
            session.set_source(&self.source);
        }
    }

    pub fn set_program_tally(&mut self, program: bool) {
        if self.tally.program != program {
            self.tally.program = program;
            self.apply_tally();
        }
    }

    pub fn set_preview_tally(&mut self, preview: bool) {
        if self.tally.preview != preview {
            self.tally.preview = preview;
            self.apply_tally();
        }
    }

    fn apply_tally(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.set_tally(self.tally);
        }
    }

    /// Receiver name as shown in the sender's connection list
    fn receiver_name(&self) -> String {
        if !self.config.receiver.prefix_host_name {
            return self.name.clone();
        }
        match hostname::get() {
            Ok(host) => format!("{} ({})", host.to_string_lossy(), self.name),
            Err(e) => {
                warn!("Host name unavailable: {}", e);
                self.name.clone()
            }
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn program_tally(&self) -> bool {
        self.tally.program
    }

    pub fn preview_tally(&self) -> bool {
        self.tally.preview
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Accepted video mode, `None` unless streaming
    pub fn video_mode(&self) -> Option<&VideoMode> {
        self.video_mode.as_ref()
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Parameters of the most recent capture, while open
    pub fn last_frame(&self) -> Option<&ndi_recv::SourceFrame> {
        self.session.as_ref().map(IngestionSession::frame)
    }
}

impl fmt::Debug for NdiSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NdiSource")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("source", &self.source)
            .field("state", &self.state)
            .field("tally", &self.tally)
            .field("video_mode", &self.video_mode)
            .finish_non_exhaustive()
    }
}

impl Drop for NdiSource {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("Source {:?} dropped while open", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{Cadence, Priority};
    use ndi_recv::synthetic::SyntheticFeed;
    use ndi_recv::{FourCC, Rational, Resolution, ScanFormat, SourceFrame};
    use ndi_video::{ColorFormat, FormatSet, MemoryRenderer, VideoError};

    struct Fixture {
        instance: Arc<Instance>,
        feed: SyntheticFeed,
        renderer: MemoryRenderer,
        source: NdiSource,
    }

    fn fixture(supported: FormatSet) -> Fixture {
        let instance = Instance::new();
        let feed = SyntheticFeed::new();
        let renderer = MemoryRenderer::new(supported);
        let config = SourceConfig {
            receiver: ndi_recv::ReceiverConfig {
                prefix_host_name: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let source = NdiSource::new(
            &instance,
            "Camera 1",
            Source::new("STUDIO (Cam)").expect("valid"),
            Arc::new(feed.backend()),
            Arc::new(renderer.clone()),
            config,
        )
        .expect("source");
        Fixture {
            instance,
            feed,
            renderer,
            source,
        }
    }

    fn push_bgra(feed: &SyntheticFeed, width: u32, height: u32, rate: Rational) {
        let template = SourceFrame::new(
            Resolution::new(width, height),
            FourCC::BGRA,
            rate,
            0.0,
            ScanFormat::Progressive,
        );
        let stride = FourCC::BGRA.min_stride(width);
        feed.push_frame(template, stride, vec![0x80; stride * height as usize]);
    }

    /// One host turn: tick, resolve published modes, pull
    fn turn(f: &mut Fixture) -> Option<Arc<dyn StagedFrame>> {
        let mut lock = f.instance.lock();
        f.source.on_tick(&mut lock).expect("tick");
        if let Some(compat) = lock.schedule(f.source.id()).take_published() {
            f.source
                .on_mode_proposal(&mut lock, compat.first())
                .expect("proposal");
        }
        drop(lock);
        f.source.pull().expect("pull")
    }

    #[test]
    fn test_update_before_open_is_rejected() {
        let mut f = fixture(FormatSet::all());
        let mut lock = f.instance.lock();
        let err = f.source.on_tick(&mut lock).expect_err("closed");
        assert!(matches!(err, SourceError::InvalidState(_)));
        assert!(f.source.on_mode_proposal(&mut lock, None).is_err());
        assert!(f.source.close(&mut lock).is_err());
    }

    #[test]
    fn test_open_twice_is_rejected() {
        let mut f = fixture(FormatSet::all());
        let mut lock = f.instance.lock();
        f.source.open(&mut lock).expect("open");
        assert_eq!(f.source.state(), SourceState::Idle);
        assert!(matches!(
            f.source.open(&mut lock),
            Err(SourceError::InvalidState(_))
        ));
        assert_eq!(f.feed.stats().connections, 1);
        f.source.close(&mut lock).expect("close");
    }

    #[test]
    fn test_open_registers_regular_update() {
        let mut f = fixture(FormatSet::all());
        let mut lock = f.instance.lock();
        f.source.open(&mut lock).expect("open");
        assert_eq!(
            lock.schedule(f.source.id()).cadence(),
            Cadence::Regular(Priority::INPUT)
        );
        assert_eq!(f.feed.stats().receiver_names, vec!["Camera 1".to_string()]);
        f.source.close(&mut lock).expect("close");
        assert_eq!(lock.schedule(f.source.id()).cadence(), Cadence::Disabled);
        assert_eq!(lock.schedule(f.source.id()).take_published(), Some(Vec::new()));
    }

    #[test]
    fn test_failed_open_stays_closed() {
        let mut f = fixture(FormatSet::all());
        f.feed.refuse_connections(true);
        let mut lock = f.instance.lock();
        assert!(matches!(f.source.open(&mut lock), Err(SourceError::Ndi(_))));
        assert_eq!(f.source.state(), SourceState::Closed);
        assert_eq!(lock.schedule(f.source.id()).cadence(), Cadence::Disabled);
    }

    #[test]
    fn test_mode_switches_to_periodic() {
        let mut f = fixture(FormatSet::all());
        push_bgra(&f.feed, 64, 36, Rational::new(25, 1));
        f.source.open(&mut f.instance.lock()).expect("open");

        let staged = turn(&mut f).expect("staged frame");
        assert_eq!(staged.descriptor().color_format, ColorFormat::B8G8R8A8);
        assert_eq!(f.source.state(), SourceState::Streaming);
        assert_eq!(
            f.instance.lock().schedule(f.source.id()).cadence(),
            Cadence::Periodic(Priority::INPUT, std::time::Duration::from_millis(40))
        );

        f.source.close(&mut f.instance.lock()).expect("close");
        assert_eq!(f.feed.stats().outstanding, 0);
    }

    #[test]
    fn test_unsupported_format_publishes_nothing() {
        let mut f = fixture(ColorFormat::G8B8R8TwoPlane.into());
        push_bgra(&f.feed, 64, 36, Rational::new(25, 1));
        f.source.open(&mut f.instance.lock()).expect("open");

        assert!(turn(&mut f).is_none());
        assert_eq!(f.source.state(), SourceState::Idle);
        assert!(f.source.video_mode().is_none());
        assert_eq!(f.renderer.stats().uploaders_created, 0);

        f.source.close(&mut f.instance.lock()).expect("close");
        assert_eq!(f.feed.stats().outstanding, 0);
    }

    #[test]
    fn test_repeated_mode_is_idempotent() {
        let mut f = fixture(FormatSet::all());
        push_bgra(&f.feed, 64, 36, Rational::new(25, 1));
        f.source.open(&mut f.instance.lock()).expect("open");
        turn(&mut f).expect("staged frame");

        let mode = f.source.video_mode().cloned().expect("mode");
        let mut lock = f.instance.lock();
        assert!(f.source.on_mode_proposal(&mut lock, Some(&mode)).expect("same mode"));
        assert!(f.source.on_mode_proposal(&mut lock, Some(&mode)).expect("same mode"));
        assert_eq!(f.renderer.stats().uploaders_created, 1);

        assert!(!f.source.on_mode_proposal(&mut lock, None).expect("no mode"));
        assert_eq!(
            lock.schedule(f.source.id()).cadence(),
            Cadence::Regular(Priority::INPUT)
        );
        assert_eq!(f.source.state(), SourceState::Idle);
        drop(lock);
        assert!(f.source.pull().expect("pull").is_none());

        f.source.close(&mut f.instance.lock()).expect("close");
    }

    #[test]
    fn test_uploader_failure_falls_back_to_idle() {
        let mut f = fixture(FormatSet::all());
        push_bgra(&f.feed, 64, 36, Rational::new(25, 1));
        f.source.open(&mut f.instance.lock()).expect("open");
        f.renderer.refuse_uploaders(true);

        let mut lock = f.instance.lock();
        f.source.on_tick(&mut lock).expect("tick");
        let compat = lock
            .schedule(f.source.id())
            .take_published()
            .expect("published");
        let err = f
            .source
            .on_mode_proposal(&mut lock, compat.first())
            .expect_err("refused");
        assert!(matches!(
            err,
            SourceError::Video(VideoError::UploaderCreation(_))
        ));
        assert_eq!(f.source.state(), SourceState::Idle);
        assert!(f.source.video_mode().is_none());
        assert_eq!(
            lock.schedule(f.source.id()).cadence(),
            Cadence::Regular(Priority::INPUT)
        );
        drop(lock);
        assert!(f.source.pull().expect("pull").is_none());

        // Same proposal once the renderer recovers
        f.renderer.refuse_uploaders(false);
        let mut lock = f.instance.lock();
        assert!(f
            .source
            .on_mode_proposal(&mut lock, compat.first())
            .expect("accepted"));
        assert_eq!(f.source.state(), SourceState::Streaming);
        drop(lock);
        assert!(f.source.pull().expect("pull").is_some());

        f.source.close(&mut f.instance.lock()).expect("close");
        assert_eq!(f.feed.stats().outstanding, 0);
    }

    #[test]
    fn test_withdrawn_mode_drops_uploader() {
        let mut f = fixture(FormatSet::all());
        push_bgra(&f.feed, 64, 36, Rational::new(25, 1));
        f.source.open(&mut f.instance.lock()).expect("open");
        turn(&mut f).expect("staged frame");
        assert_eq!(f.source.state(), SourceState::Streaming);

        let mut lock = f.instance.lock();
        assert!(!f.source.on_mode_proposal(&mut lock, None).expect("no mode"));
        assert_eq!(f.source.state(), SourceState::Idle);
        assert!(f.source.video_mode().is_none());
        assert_eq!(
            lock.schedule(f.source.id()).cadence(),
            Cadence::Regular(Priority::INPUT)
        );

        // New captures are not converted without an uploader
        f.source.on_tick(&mut lock).expect("tick");
        drop(lock);
        assert!(f.source.pull().expect("pull").is_none());
        assert_eq!(f.renderer.stats().frames_acquired, 1);

        f.source.close(&mut f.instance.lock()).expect("close");
        assert_eq!(f.feed.stats().outstanding, 0);
    }

    #[test]
    fn test_acquire_failure_keeps_frame_for_retry() {
        let mut f = fixture(FormatSet::all());
        push_bgra(&f.feed, 64, 36, Rational::new(25, 1));
        f.source.open(&mut f.instance.lock()).expect("open");
        f.renderer.refuse_frames(true);

        let mut lock = f.instance.lock();
        f.source.on_tick(&mut lock).expect("tick");
        let compat = lock
            .schedule(f.source.id())
            .take_published()
            .expect("published");
        assert!(f
            .source
            .on_mode_proposal(&mut lock, compat.first())
            .expect("accepted"));
        drop(lock);

        let err = f.source.pull().expect_err("refused");
        assert!(matches!(err, SourceError::Video(VideoError::Acquire(_))));
        assert_eq!(f.feed.stats().outstanding, 1);

        f.renderer.refuse_frames(false);
        let staged = f.source.pull().expect("pull").expect("staged frame");
        assert_eq!(staged.descriptor().resolution, Resolution::new(64, 36));
        assert_eq!(f.feed.stats().outstanding, 0);

        f.source.close(&mut f.instance.lock()).expect("close");
    }

    #[test]
    fn test_geometry_change_renegotiates() {
        let mut f = fixture(FormatSet::all());
        push_bgra(&f.feed, 64, 36, Rational::new(25, 1));
        f.source.open(&mut f.instance.lock()).expect("open");
        turn(&mut f).expect("first mode");

        push_bgra(&f.feed, 32, 18, Rational::new(50, 1));
        let staged = turn(&mut f).expect("second mode");
        assert_eq!(staged.descriptor().resolution, Resolution::new(32, 18));
        assert_eq!(f.renderer.stats().uploaders_created, 2);
        assert_eq!(
            f.instance.lock().schedule(f.source.id()).cadence(),
            Cadence::Periodic(Priority::INPUT, std::time::Duration::from_millis(20))
        );

        f.source.close(&mut f.instance.lock()).expect("close");
        assert_eq!(f.feed.stats().outstanding, 0);
    }

    #[test]
    fn test_tally_forwarded_only_on_change() {
        let mut f = fixture(FormatSet::all());
        f.source.set_program_tally(true);
        assert!(f.source.program_tally());

        f.source.open(&mut f.instance.lock()).expect("open");
        // Applied on open
        assert_eq!(f.feed.stats().tallies, vec![Tally::new(true, false)]);

        f.source.set_program_tally(true);
        f.source.set_preview_tally(true);
        f.source.set_preview_tally(true);
        assert_eq!(
            f.feed.stats().tallies,
            vec![Tally::new(true, false), Tally::new(true, true)]
        );
        f.source.close(&mut f.instance.lock()).expect("close");

        f.source.set_program_tally(false);
        assert_eq!(f.feed.stats().tallies.len(), 2);
        assert!(!f.source.program_tally());
        assert!(f.source.preview_tally());
    }

    #[test]
    fn test_set_source_reconnects_open_receiver() {
        let mut f = fixture(FormatSet::all());
        let other = Source::new("STUDIO (Wide)").expect("valid");

        f.source.set_source(other.clone());
        assert_eq!(f.feed.stats().reconnects, 0);

        f.source.open(&mut f.instance.lock()).expect("open");
        assert_eq!(f.feed.stats().source, Some(other));

        let third = Source::new("STUDIO (Close)").expect("valid");
        f.source.set_source(third.clone());
        assert_eq!(f.feed.stats().reconnects, 1);
        assert_eq!(f.feed.stats().source, Some(third.clone()));
        assert_eq!(f.source.source(), &third);
        assert_eq!(f.feed.stats().connections, 1);

        f.source.close(&mut f.instance.lock()).expect("close");
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SourceState::Streaming.to_string(), "streaming");
        assert_eq!(SourceState::default(), SourceState::Closed);
    }
}
