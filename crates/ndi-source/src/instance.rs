//! Host scheduling seam
//!
//! An [`Instance`] owns the global lock that serializes every lifecycle
//! transition of the components registered with it. Behind the lock sits a
//! [`Registry`] holding one [`Schedule`] per component: which recurring
//! update the component asked for and which video modes it currently
//! publishes downstream.
//!
//! The host (for example [`SourceDriver`](crate::SourceDriver)) reads the
//! schedules to decide when to call `on_tick` and hands published
//! compatibility to a [`ModeSelector`] within the same locked turn.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ndi_video::VideoMode;
use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

/// Update priority; lower values run first within one host turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub i32);

impl Priority {
    /// Components that bring frames into the instance
    pub const INPUT: Priority = Priority(0);
    pub const PROCESSING: Priority = Priority(100);
    pub const OUTPUT: Priority = Priority(200);
}

/// Recurring update a component currently asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Disabled,
    /// Whenever convenient, at the host's own pace
    Regular(Priority),
    /// Every `period`
    Periodic(Priority, Duration),
}

/// What a component may ask of the host
pub trait Scheduler {
    fn enable_regular_update(&mut self, priority: Priority);

    fn disable_regular_update(&mut self);

    fn enable_periodic_update(&mut self, priority: Priority, period: Duration);

    fn disable_periodic_update(&mut self);

    /// Publish the video modes the component can produce
    ///
    /// An empty list means the component produces nothing.
    fn set_video_mode_compatibility(&mut self, compatibility: Vec<VideoMode>);
}

/// Per-component scheduling state
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    regular: Option<Priority>,
    periodic: Option<(Priority, Duration)>,
    compatibility: Vec<VideoMode>,
    published: bool,
}

impl Schedule {
    /// Effective cadence; a periodic update takes precedence over a regular one
    pub fn cadence(&self) -> Cadence {
        match (self.periodic, self.regular) {
            (Some((priority, period)), _) => Cadence::Periodic(priority, period),
            (None, Some(priority)) => Cadence::Regular(priority),
            (None, None) => Cadence::Disabled,
        }
    }

    pub fn compatibility(&self) -> &[VideoMode] {
        &self.compatibility
    }

    /// Compatibility published since the last call, if any
    pub fn take_published(&mut self) -> Option<Vec<VideoMode>> {
        std::mem::take(&mut self.published).then(|| self.compatibility.clone())
    }
}

impl Scheduler for Schedule {
    fn enable_regular_update(&mut self, priority: Priority) {
        self.regular = Some(priority);
    }

    fn disable_regular_update(&mut self) {
        self.regular = None;
    }

    fn enable_periodic_update(&mut self, priority: Priority, period: Duration) {
        self.periodic = Some((priority, period));
    }

    fn disable_periodic_update(&mut self) {
        self.periodic = None;
    }

    fn set_video_mode_compatibility(&mut self, compatibility: Vec<VideoMode>) {
        self.compatibility = compatibility;
        self.published = true;
    }
}

/// Handle identifying a component registered with an [`Instance`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId(u64);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// State guarded by the instance lock
#[derive(Debug, Default)]
pub struct Registry {
    schedules: HashMap<ComponentId, Schedule>,
    next_id: u64,
}

impl Registry {
    pub fn register(&mut self) -> ComponentId {
        let id = ComponentId(self.next_id);
        self.next_id += 1;
        self.schedules.insert(id, Schedule::default());
        debug!("Registered component {}", id);
        id
    }

    pub fn unregister(&mut self, id: ComponentId) {
        if self.schedules.remove(&id).is_some() {
            debug!("Unregistered component {}", id);
        }
    }

    /// Schedule of `id`, recreated empty if it was unregistered
    pub fn schedule(&mut self, id: ComponentId) -> &mut Schedule {
        self.schedules.entry(id).or_default()
    }

    pub fn is_registered(&self, id: ComponentId) -> bool {
        self.schedules.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }
}

/// Guard of the instance lock
pub type InstanceLock<'a> = MutexGuard<'a, Registry>;

/// Shared host context owning the global lock
#[derive(Debug, Default)]
pub struct Instance {
    registry: Mutex<Registry>,
}

impl Instance {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Take the instance lock
    pub fn lock(&self) -> InstanceLock<'_> {
        self.registry.lock()
    }
}

/// Downstream choice of the mode a source should produce
pub trait ModeSelector: Send {
    /// Pick one of `compatibility`, or `None` to accept no mode
    fn select(&mut self, compatibility: &[VideoMode]) -> Option<VideoMode>;
}

/// Accepts the first compatible mode in its preferred format
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstCompatible;

impl ModeSelector for FirstCompatible {
    fn select(&mut self, compatibility: &[VideoMode]) -> Option<VideoMode> {
        let mode = compatibility.first()?;
        let format = *mode.formats().first()?;
        mode.with_format(format)
    }
}

impl<F> ModeSelector for F
where
    F: FnMut(&[VideoMode]) -> Option<VideoMode> + Send,
{
    fn select(&mut self, compatibility: &[VideoMode]) -> Option<VideoMode> {
        self(compatibility)
    }
}
