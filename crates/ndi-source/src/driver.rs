//! Threaded host loop for one source
//!
//! [`SourceDriver`] plays the host for a single [`NdiSource`]: it opens the
//! source on a dedicated thread, ticks it at the cadence the source
//! registered, lets a [`ModeSelector`] answer published compatibility in the
//! same locked turn, and forwards each new staged frame to async consumers
//! through a `tokio::sync::mpsc` channel.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ndi_recv::{LibraryConfig, NdiBackend, NdiLibrary, Source};
//! use ndi_source::{FirstCompatible, Instance, NdiSource, SourceConfig, SourceDriver};
//! use ndi_video::MemoryRenderer;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let lib = NdiLibrary::load(&LibraryConfig::default())?;
//! let instance = Instance::new();
//! let source = NdiSource::new(
//!     &instance,
//!     "Program",
//!     Source::new("STUDIO (Program)")?,
//!     Arc::new(NdiBackend::new(lib)),
//!     Arc::new(MemoryRenderer::default()),
//!     SourceConfig::default(),
//! )?;
//!
//! let (driver, mut frames) = SourceDriver::spawn(instance, source, Box::new(FirstCompatible))?;
//! while let Some(frame) = frames.recv().await {
//!     println!("{:?}", frame.descriptor().resolution);
//! }
//! driver.shutdown()?;
//! # Ok(())
//! # }
//! ```

use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use ndi_recv::Source;
use ndi_video::StagedFrame;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Result, SourceError};
use crate::instance::{Cadence, Instance, ModeSelector};
use crate::source::{NdiSource, SourceState};

/// Commands accepted by the driver thread
#[derive(Debug)]
pub enum DriverCommand {
    /// Switch the network source
    SetSource(Source),
    SetProgramTally(bool),
    SetPreviewTally(bool),
    /// Close the source and stop the thread
    Shutdown,
}

/// Counters kept by the driver thread
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Host turns run
    pub ticks: u64,
    /// Staged frames delivered to the channel
    pub frames_sent: u64,
    /// Staged frames dropped because the channel was full
    pub frames_dropped: u64,
    /// Mode proposals answered
    pub mode_changes: u64,
}

#[derive(Debug, Default)]
struct Shared {
    state: SourceState,
    stats: DriverStats,
}

/// Handle to a source running on its own thread
#[derive(Debug)]
pub struct SourceDriver {
    commands: std_mpsc::Sender<DriverCommand>,
    shared: Arc<Mutex<Shared>>,
    thread: Option<JoinHandle<()>>,
}

impl SourceDriver {
    /// Open `source` on a new thread and start driving it
    ///
    /// Returns once the source is open. Frames arrive on the returned channel
    /// until the driver shuts down.
    pub fn spawn(
        instance: Arc<Instance>,
        source: NdiSource,
        selector: Box<dyn ModeSelector>,
    ) -> Result<(Self, mpsc::Receiver<Arc<dyn StagedFrame>>)> {
        let depth = source.config().channel_depth;
        let (frame_tx, frame_rx) = mpsc::channel(depth);
        let (command_tx, command_rx) = std_mpsc::channel();
        let (open_tx, open_rx) = std_mpsc::sync_channel(1);
        let shared = Arc::new(Mutex::new(Shared::default()));

        let name = format!("ndi-source-{}", source.name());
        let worker = DriverLoop {
            instance,
            source,
            selector,
            frames: frame_tx,
            commands: command_rx,
            shared: Arc::clone(&shared),
            last_sent: None,
        };
        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || worker.run(open_tx))
            .map_err(|e| SourceError::driver(format!("failed to spawn thread: {}", e)))?;

        let opened = open_rx
            .recv()
            .map_err(|_| SourceError::driver("driver thread exited before opening"))?;
        if let Err(e) = opened {
            // The thread exits on its own after a failed open
            let _ = thread.join();
            return Err(e);
        }

        Ok((
            Self {
                commands: command_tx,
                shared,
                thread: Some(thread),
            },
            frame_rx,
        ))
    }

    pub fn send_command(&self, command: DriverCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| SourceError::driver("driver thread is not running"))
    }

    pub fn set_source(&self, source: Source) -> Result<()> {
        self.send_command(DriverCommand::SetSource(source))
    }

    pub fn set_program_tally(&self, tally: bool) -> Result<()> {
        self.send_command(DriverCommand::SetProgramTally(tally))
    }

    pub fn set_preview_tally(&self, tally: bool) -> Result<()> {
        self.send_command(DriverCommand::SetPreviewTally(tally))
    }

    /// Lifecycle state as of the last host turn
    pub fn state(&self) -> SourceState {
        self.shared.lock().state
    }

    pub fn stats(&self) -> DriverStats {
        self.shared.lock().stats.clone()
    }

    /// Close the source and join the thread
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        // The thread may already be gone, joining reports that
        let _ = self.commands.send(DriverCommand::Shutdown);
        thread
            .join()
            .map_err(|_| SourceError::driver("driver thread panicked"))
    }
}

impl Drop for SourceDriver {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("Error stopping source driver: {}", e);
        }
    }
}

struct DriverLoop {
    instance: Arc<Instance>,
    source: NdiSource,
    selector: Box<dyn ModeSelector>,
    frames: mpsc::Sender<Arc<dyn StagedFrame>>,
    commands: std_mpsc::Receiver<DriverCommand>,
    shared: Arc<Mutex<Shared>>,
    last_sent: Option<Arc<dyn StagedFrame>>,
}

impl DriverLoop {
    fn run(mut self, opened: std_mpsc::SyncSender<Result<()>>) {
        let open = self.source.open(&mut self.instance.lock());
        let failed = open.is_err();
        self.publish_state();
        let _ = opened.send(open);
        if failed {
            self.instance.lock().unregister(self.source.id());
            return;
        }

        info!("Driver for {:?} running", self.source.name());
        let mut next_tick = Instant::now();

        loop {
            let wait = next_tick.saturating_duration_since(Instant::now());
            match self.commands.recv_timeout(wait) {
                Ok(command) => {
                    if !self.handle_pending(command, next_tick) {
                        break;
                    }
                    if Instant::now() < next_tick {
                        continue;
                    }
                }
                Err(std_mpsc::RecvTimeoutError::Timeout) => {}
                Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                    debug!("Driver handle dropped");
                    break;
                }
            }

            let Some(interval) = self.turn() else {
                break;
            };
            next_tick += interval;
            let now = Instant::now();
            if next_tick < now {
                trace!("Driver fell behind by {:?}", now - next_tick);
                next_tick = now;
            }
        }

        let mut lock = self.instance.lock();
        if let Err(e) = self.source.close(&mut lock) {
            warn!("Error closing source: {}", e);
        }
        lock.unregister(self.source.id());
        drop(lock);
        self.publish_state();
        info!("Driver for {:?} stopped", self.source.name());
    }

    /// Handle `first` and whatever is queued behind it until `deadline`
    ///
    /// Returns `false` on shutdown. Commands left over once the deadline
    /// passes wait for the next turn.
    fn handle_pending(&mut self, first: DriverCommand, deadline: Instant) -> bool {
        let mut next = Some(first);
        while let Some(command) = next {
            if matches!(command, DriverCommand::Shutdown) {
                return false;
            }
            self.handle(command);
            next = if Instant::now() < deadline {
                self.commands.try_recv().ok()
            } else {
                None
            };
        }
        true
    }

    fn handle(&mut self, command: DriverCommand) {
        debug!("Driver command {:?}", command);
        match command {
            DriverCommand::SetSource(source) => self.source.set_source(source),
            DriverCommand::SetProgramTally(tally) => self.source.set_program_tally(tally),
            DriverCommand::SetPreviewTally(tally) => self.source.set_preview_tally(tally),
            DriverCommand::Shutdown => {}
        }
    }

    /// One host turn; returns the wait until the next one, `None` to stop
    fn turn(&mut self) -> Option<Duration> {
        let mut lock = self.instance.lock();

        if let Err(e) = self.source.on_tick(&mut lock) {
            error!("Update failed: {}", e);
            return None;
        }

        if let Some(compatibility) = lock.schedule(self.source.id()).take_published() {
            let selected = self.selector.select(&compatibility);
            match self.source.on_mode_proposal(&mut lock, selected.as_ref()) {
                Ok(streaming) => debug!("Mode proposal answered, streaming: {}", streaming),
                Err(e) => warn!("Mode proposal failed: {}", e),
            }
            self.shared.lock().stats.mode_changes += 1;
        }

        let cadence = lock.schedule(self.source.id()).cadence();
        let pulled = self.source.pull();
        drop(lock);

        match pulled {
            Ok(Some(frame)) => self.deliver(frame),
            Ok(None) => {}
            Err(e) => warn!("Pull failed: {}", e),
        }

        {
            let mut shared = self.shared.lock();
            shared.stats.ticks += 1;
            shared.state = self.source.state();
        }

        match cadence {
            Cadence::Periodic(_, period) => Some(period),
            Cadence::Regular(_) => Some(self.source.config().regular_interval),
            Cadence::Disabled => {
                warn!("Source disabled its updates, stopping");
                None
            }
        }
    }

    /// Send `frame` unless it was already sent
    fn deliver(&mut self, frame: Arc<dyn StagedFrame>) {
        if self
            .last_sent
            .as_ref()
            .is_some_and(|last| Arc::ptr_eq(last, &frame))
        {
            return;
        }

        match self.frames.try_send(Arc::clone(&frame)) {
            Ok(()) => self.shared.lock().stats.frames_sent += 1,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.shared.lock().stats.frames_dropped += 1;
                warn!("Frame channel full, dropping frame");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                trace!("Frame channel closed");
            }
        }
        self.last_sent = Some(frame);
    }

    fn publish_state(&self) {
        self.shared.lock().state = self.source.state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use crate::instance::FirstCompatible;
    use ndi_recv::synthetic::SyntheticFeed;
    use ndi_recv::{FourCC, Rational, ReceiverConfig, Resolution, ScanFormat, SourceFrame, Tally};
    use ndi_video::{ColorFormat, FormatSet, MemoryRenderer};

    fn source(instance: &Instance, feed: &SyntheticFeed, supported: FormatSet) -> NdiSource {
        let config = SourceConfig {
            receiver: ReceiverConfig {
                prefix_host_name: false,
                ..Default::default()
            },
            regular_interval: Duration::from_millis(5),
            ..Default::default()
        };
        NdiSource::new(
            instance,
            "Driver Test",
            Source::new("STUDIO (Cam)").expect("valid"),
            Arc::new(feed.backend()),
            Arc::new(MemoryRenderer::new(supported)),
            config,
        )
        .expect("source")
    }

    fn push_rgba(feed: &SyntheticFeed) {
        let template = SourceFrame::new(
            Resolution::new(16, 8),
            FourCC::RGBA,
            Rational::new(200, 1),
            0.0,
            ScanFormat::Progressive,
        );
        feed.push_frame(template, 64, vec![0x42; 64 * 8]);
    }

    #[tokio::test]
    async fn test_driver_delivers_frames() {
        let instance = Instance::new();
        let feed = SyntheticFeed::new();
        push_rgba(&feed);
        let source = source(&instance, &feed, ColorFormat::R8G8B8A8.into());

        let (driver, mut frames) =
            SourceDriver::spawn(Arc::clone(&instance), source, Box::new(FirstCompatible))
                .expect("spawn");

        let frame = tokio::time::timeout(Duration::from_secs(5), frames.recv())
            .await
            .expect("frame in time")
            .expect("channel open");
        assert_eq!(frame.descriptor().color_format, ColorFormat::R8G8B8A8);
        assert_eq!(frame.planes()[0], &[0x42; 64 * 8][..]);

        driver.set_program_tally(true).expect("command");
        driver.shutdown().expect("shutdown");

        assert_eq!(feed.stats().outstanding, 0);
        assert!(feed.stats().tallies.contains(&Tally::new(true, false)));
        assert!(instance.lock().is_empty());
        // Channel closes with the driver
        while frames.recv().await.is_some() {}
    }

    #[test]
    fn test_spawn_reports_open_failure() {
        let instance = Instance::new();
        let feed = SyntheticFeed::new();
        feed.refuse_connections(true);
        let source = source(&instance, &feed, FormatSet::all());

        let result = SourceDriver::spawn(Arc::clone(&instance), source, Box::new(FirstCompatible));
        assert!(matches!(result, Err(SourceError::Ndi(_))));
        assert!(instance.lock().is_empty());
    }

    #[test]
    fn test_command_stream_does_not_starve_ticks() {
        let instance = Instance::new();
        let feed = SyntheticFeed::new();
        let source = source(&instance, &feed, FormatSet::all());

        let (driver, _frames) =
            SourceDriver::spawn(instance, source, Box::new(FirstCompatible)).expect("spawn");

        let start = Instant::now();
        while start.elapsed() < Duration::from_millis(200) {
            driver.set_program_tally(true).expect("command");
        }
        // About 40 turns at a 5 ms interval
        assert!(driver.stats().ticks >= 5, "ticks: {}", driver.stats().ticks);

        driver.shutdown().expect("shutdown");
        assert_eq!(feed.stats().tallies.len(), 2);
    }

    #[test]
    fn test_driver_idles_without_frames() {
        let instance = Instance::new();
        let feed = SyntheticFeed::new();
        let source = source(&instance, &feed, FormatSet::all());

        let (driver, mut frames) =
            SourceDriver::spawn(instance, source, Box::new(FirstCompatible)).expect("spawn");
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(driver.state(), SourceState::Idle);
        assert!(driver.stats().ticks > 0);
        assert_eq!(driver.stats().frames_sent, 0);
        assert!(frames.try_recv().is_err());
        driver.shutdown().expect("shutdown");
    }
}
