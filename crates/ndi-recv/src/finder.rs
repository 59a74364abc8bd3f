//! Source discovery

use std::ffi::CString;
use std::slice;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::FinderConfig;
use crate::error::{NdiError, Result};
use crate::ffi::{NDIlib_find_create_t, NDIlib_find_instance_t};
use crate::library::NdiLibrary;
use crate::source::Source;

/// Discovers NDI sources on the network
///
/// # Examples
///
/// ```no_run
/// # use std::time::Duration;
/// # use ndi_recv::{FinderConfig, LibraryConfig, NdiFinder, NdiLibrary};
/// # fn main() -> ndi_recv::Result<()> {
/// let lib = NdiLibrary::load(&LibraryConfig::default())?;
/// let finder = NdiFinder::new(lib, &FinderConfig::default())?;
/// if finder.wait_for_sources(Duration::from_secs(2)) {
///     for source in finder.current_sources() {
///         println!("{}", source);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct NdiFinder {
    lib: Arc<NdiLibrary>,
    instance: NDIlib_find_instance_t,
}

// SAFETY: finder instances are not tied to the creating thread. Not Sync: the
// source list returned by the runtime is only valid until the next call.
unsafe impl Send for NdiFinder {}

impl NdiFinder {
    pub fn new(lib: Arc<NdiLibrary>, config: &FinderConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|issues| NdiError::InvalidConfig(issues.join(", ")))?;

        let groups = config.groups.as_deref().map(CString::new).transpose()?;
        let extra_ips = config.extra_ips.as_deref().map(CString::new).transpose()?;

        let create = NDIlib_find_create_t {
            show_local_sources: config.show_local_sources,
            p_groups: groups.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()),
            p_extra_ips: extra_ips.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()),
        };

        // SAFETY: `create` and the strings it points at outlive the call
        let instance = unsafe { (lib.find_create)(&create) };
        if instance.is_null() {
            return Err(NdiError::finder_creation("NDIlib_find_create_v2 returned null"));
        }

        debug!(
            "Created NDI finder (local: {}, groups: {:?}, extra ips: {:?})",
            config.show_local_sources, config.groups, config.extra_ips
        );
        Ok(Self { lib, instance })
    }

    /// Block until the source list changes or `timeout` elapses
    ///
    /// Returns `true` if the list changed.
    pub fn wait_for_sources(&self, timeout: Duration) -> bool {
        let timeout_ms = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
        // SAFETY: the instance is valid until drop
        unsafe { (self.lib.find_wait_for_sources)(self.instance, timeout_ms) }
    }

    /// Snapshot of the currently known sources, copied into owned values
    pub fn current_sources(&self) -> Vec<Source> {
        let mut count = 0u32;
        // SAFETY: the instance is valid until drop; the returned array stays
        // valid until the next call on this finder, and is copied right away.
        unsafe {
            let list = (self.lib.find_get_current_sources)(self.instance, &mut count);
            if list.is_null() || count == 0 {
                return Vec::new();
            }
            slice::from_raw_parts(list, count as usize)
                .iter()
                .map(|raw| Source::from_raw(raw))
                .collect()
        }
    }
}

impl Drop for NdiFinder {
    fn drop(&mut self) {
        // SAFETY: created in `new`, destroyed exactly once
        unsafe { (self.lib.find_destroy)(self.instance) };
    }
}
