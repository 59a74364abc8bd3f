//! Dynamically loaded NDI runtime
//!
//! [`NdiLibrary`] opens the vendor shared library, resolves every entry point
//! this crate calls and initialises the runtime. It is created explicitly once
//! and shared through an `Arc`; every finder, receiver and frame-sync holds a
//! clone, so the runtime is torn down only after the last of them is gone.

use std::ffi::CStr;
use std::fmt;
use std::sync::Arc;

use libloading::Library;
use tracing::{debug, info};

use crate::config::LibraryConfig;
use crate::error::{NdiError, Result};
use crate::ffi::{
    DestroyFn, FindCreateFn, FindDestroyFn, FindSourcesFn, FindWaitFn, FrameSyncCaptureFn,
    FrameSyncCreateFn, FrameSyncDestroyFn, FrameSyncFreeFn, InitializeFn, IsSupportedCpuFn,
    RecvCaptureFn, RecvConnectFn, RecvCreateFn, RecvDestroyFn, RecvFreeVideoFn, RecvSetTallyFn,
    VersionFn,
};

/// Loaded and initialised NDI runtime
pub struct NdiLibrary {
    destroy: DestroyFn,
    version: VersionFn,

    pub(crate) find_create: FindCreateFn,
    pub(crate) find_destroy: FindDestroyFn,
    pub(crate) find_wait_for_sources: FindWaitFn,
    pub(crate) find_get_current_sources: FindSourcesFn,

    pub(crate) recv_create: RecvCreateFn,
    pub(crate) recv_destroy: RecvDestroyFn,
    pub(crate) recv_connect: RecvConnectFn,
    pub(crate) recv_capture: RecvCaptureFn,
    pub(crate) recv_free_video: RecvFreeVideoFn,
    pub(crate) recv_set_tally: RecvSetTallyFn,

    pub(crate) framesync_create: FrameSyncCreateFn,
    pub(crate) framesync_destroy: FrameSyncDestroyFn,
    pub(crate) framesync_capture_video: FrameSyncCaptureFn,
    pub(crate) framesync_free_video: FrameSyncFreeFn,

    /// Keeps the shared object mapped while any pointer above is in use
    _lib: Library,
}

// SAFETY: the entry points are plain C functions documented as callable from
// any thread, and `Library` itself is Send + Sync.
unsafe impl Send for NdiLibrary {}
unsafe impl Sync for NdiLibrary {}

/// Resolve one symbol and copy out the function pointer
///
/// # Safety
///
/// `T` must match the C signature of `name`.
unsafe fn symbol<T: Copy>(lib: &Library, name: &[u8]) -> Result<T> {
    // SAFETY: guaranteed by the caller
    let sym = unsafe { lib.get::<T>(name) }?;
    Ok(*sym)
}

impl NdiLibrary {
    /// Load and initialise the runtime
    ///
    /// Fails if the library cannot be opened, an entry point is missing, the
    /// CPU is not supported or initialisation is refused.
    pub fn load(config: &LibraryConfig) -> Result<Arc<Self>> {
        config
            .validate()
            .map_err(|issues| NdiError::InvalidConfig(issues.join(", ")))?;

        let path = config.library_path();
        info!("Loading NDI runtime from {}", path.display());

        // SAFETY: loading the vendor runtime runs its initialisers, which have
        // no preconditions beyond being loaded once per path.
        let lib = unsafe { Library::new(&path) }?;

        // SAFETY: every type alias in `ffi` mirrors the SDK header prototype of
        // the symbol it is resolved from. Nothing is resolved after the
        // runtime is initialised, so a missing symbol never leaves it running.
        let this = unsafe {
            let initialize: InitializeFn = symbol(&lib, b"NDIlib_initialize\0")?;
            let is_supported_cpu: IsSupportedCpuFn = symbol(&lib, b"NDIlib_is_supported_CPU\0")?;
            let destroy: DestroyFn = symbol(&lib, b"NDIlib_destroy\0")?;
            let version: VersionFn = symbol(&lib, b"NDIlib_version\0")?;
            let find_create: FindCreateFn = symbol(&lib, b"NDIlib_find_create_v2\0")?;
            let find_destroy: FindDestroyFn = symbol(&lib, b"NDIlib_find_destroy\0")?;
            let find_wait_for_sources: FindWaitFn =
                symbol(&lib, b"NDIlib_find_wait_for_sources\0")?;
            let find_get_current_sources: FindSourcesFn =
                symbol(&lib, b"NDIlib_find_get_current_sources\0")?;
            let recv_create: RecvCreateFn = symbol(&lib, b"NDIlib_recv_create_v3\0")?;
            let recv_destroy: RecvDestroyFn = symbol(&lib, b"NDIlib_recv_destroy\0")?;
            let recv_connect: RecvConnectFn = symbol(&lib, b"NDIlib_recv_connect\0")?;
            let recv_capture: RecvCaptureFn = symbol(&lib, b"NDIlib_recv_capture_v2\0")?;
            let recv_free_video: RecvFreeVideoFn = symbol(&lib, b"NDIlib_recv_free_video_v2\0")?;
            let recv_set_tally: RecvSetTallyFn = symbol(&lib, b"NDIlib_recv_set_tally\0")?;
            let framesync_create: FrameSyncCreateFn = symbol(&lib, b"NDIlib_framesync_create\0")?;
            let framesync_destroy: FrameSyncDestroyFn =
                symbol(&lib, b"NDIlib_framesync_destroy\0")?;
            let framesync_capture_video: FrameSyncCaptureFn =
                symbol(&lib, b"NDIlib_framesync_capture_video\0")?;
            let framesync_free_video: FrameSyncFreeFn =
                symbol(&lib, b"NDIlib_framesync_free_video\0")?;

            if !is_supported_cpu() {
                return Err(NdiError::InitializationFailed(
                    "CPU not supported by the NDI runtime".to_string(),
                ));
            }
            if !initialize() {
                return Err(NdiError::InitializationFailed(
                    "NDIlib_initialize returned false".to_string(),
                ));
            }

            Self {
                destroy,
                version,
                find_create,
                find_destroy,
                find_wait_for_sources,
                find_get_current_sources,
                recv_create,
                recv_destroy,
                recv_connect,
                recv_capture,
                recv_free_video,
                recv_set_tally,
                framesync_create,
                framesync_destroy,
                framesync_capture_video,
                framesync_free_video,
                _lib: lib,
            }
        };

        info!("NDI runtime {} initialized", this.version());
        Ok(Arc::new(this))
    }

    /// Runtime version string
    pub fn version(&self) -> String {
        // SAFETY: the runtime returns a static NUL-terminated string
        let ptr = unsafe { (self.version)() };
        if ptr.is_null() {
            return String::from("unknown");
        }
        // SAFETY: non-null, static and NUL-terminated
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }
}

impl Drop for NdiLibrary {
    fn drop(&mut self) {
        debug!("Deinitializing NDI runtime");
        // SAFETY: the runtime was initialised in `load`, and every object
        // created from it holds an `Arc<NdiLibrary>`, so none remain.
        unsafe { (self.destroy)() };
    }
}

impl fmt::Debug for NdiLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NdiLibrary").field("loaded", &true).finish()
    }
}
