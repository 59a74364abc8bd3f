//! Raw NDI SDK layouts
//!
//! `#[repr(C)]` mirrors of the structures the runtime reads and writes.
//! Enumerations coming back from the runtime are kept as plain integers here
//! and converted to Rust enums at the boundary, so an unexpected value from
//! the runtime can never produce an invalid enum.
//!
//! The offsets below follow `Processing.NDI.structs.h`. They are checked at
//! compile time so a field reordering cannot silently break the ABI.

#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

use std::ffi::{c_char, c_int, c_void};
use std::mem::{align_of, offset_of, size_of};
use std::ptr;

/// Opaque finder instance
pub type NDIlib_find_instance_t = *mut c_void;

/// Opaque receiver instance
pub type NDIlib_recv_instance_t = *mut c_void;

/// Opaque frame-sync instance
pub type NDIlib_framesync_instance_t = *mut c_void;

/// Timecode value asking the runtime to synthesize one from the wall clock
pub const NDILIB_SEND_TIMECODE_SYNTHESIZE: i64 = i64::MAX;

/// `NDIlib_frame_type_e` values returned by `recv_capture_v2`
pub const NDILIB_FRAME_TYPE_NONE: c_int = 0;
pub const NDILIB_FRAME_TYPE_VIDEO: c_int = 1;
pub const NDILIB_FRAME_TYPE_AUDIO: c_int = 2;
pub const NDILIB_FRAME_TYPE_METADATA: c_int = 3;
pub const NDILIB_FRAME_TYPE_ERROR: c_int = 4;
pub const NDILIB_FRAME_TYPE_STATUS_CHANGE: c_int = 100;

/// Source descriptor. Both strings are borrowed from whoever built it.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NDIlib_source_t {
    pub p_ndi_name: *const c_char,
    pub p_url_address: *const c_char,
}

impl Default for NDIlib_source_t {
    fn default() -> Self {
        Self {
            p_ndi_name: ptr::null(),
            p_url_address: ptr::null(),
        }
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct NDIlib_find_create_t {
    pub show_local_sources: bool,
    pub p_groups: *const c_char,
    pub p_extra_ips: *const c_char,
}

#[repr(C)]
#[derive(Debug)]
pub struct NDIlib_recv_create_v3_t {
    pub source_to_connect_to: NDIlib_source_t,
    pub color_format: c_int,
    pub bandwidth: c_int,
    pub allow_video_fields: bool,
    pub p_ndi_recv_name: *const c_char,
}

/// Video frame as produced by `recv_capture_v2` / `framesync_capture_video`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NDIlib_video_frame_v2_t {
    pub xres: c_int,
    pub yres: c_int,
    pub FourCC: u32,
    pub frame_rate_N: c_int,
    pub frame_rate_D: c_int,
    pub picture_aspect_ratio: f32,
    pub frame_format_type: c_int,
    pub timecode: i64,
    pub p_data: *mut u8,
    /// Shares storage with `data_size_in_bytes` for compressed formats
    pub line_stride_in_bytes: c_int,
    pub p_metadata: *const c_char,
    pub timestamp: i64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct NDIlib_tally_t {
    pub on_program: bool,
    pub on_preview: bool,
}

// Layout checks against the SDK headers (LP64 / LLP64 64-bit targets).
#[cfg(target_pointer_width = "64")]
const _: () = {
    assert!(size_of::<NDIlib_source_t>() == 16);
    assert!(align_of::<NDIlib_source_t>() == 8);
    assert!(offset_of!(NDIlib_source_t, p_ndi_name) == 0);
    assert!(offset_of!(NDIlib_source_t, p_url_address) == 8);

    assert!(size_of::<NDIlib_video_frame_v2_t>() == 72);
    assert!(align_of::<NDIlib_video_frame_v2_t>() == 8);
    assert!(offset_of!(NDIlib_video_frame_v2_t, xres) == 0);
    assert!(offset_of!(NDIlib_video_frame_v2_t, yres) == 4);
    assert!(offset_of!(NDIlib_video_frame_v2_t, FourCC) == 8);
    assert!(offset_of!(NDIlib_video_frame_v2_t, frame_rate_N) == 12);
    assert!(offset_of!(NDIlib_video_frame_v2_t, frame_rate_D) == 16);
    assert!(offset_of!(NDIlib_video_frame_v2_t, picture_aspect_ratio) == 20);
    assert!(offset_of!(NDIlib_video_frame_v2_t, frame_format_type) == 24);
    assert!(offset_of!(NDIlib_video_frame_v2_t, timecode) == 32);
    assert!(offset_of!(NDIlib_video_frame_v2_t, p_data) == 40);
    assert!(offset_of!(NDIlib_video_frame_v2_t, line_stride_in_bytes) == 48);
    assert!(offset_of!(NDIlib_video_frame_v2_t, p_metadata) == 56);
    assert!(offset_of!(NDIlib_video_frame_v2_t, timestamp) == 64);

    assert!(size_of::<NDIlib_recv_create_v3_t>() == 40);
    assert!(offset_of!(NDIlib_recv_create_v3_t, color_format) == 16);
    assert!(offset_of!(NDIlib_recv_create_v3_t, bandwidth) == 20);
    assert!(offset_of!(NDIlib_recv_create_v3_t, allow_video_fields) == 24);
    assert!(offset_of!(NDIlib_recv_create_v3_t, p_ndi_recv_name) == 32);

    assert!(size_of::<NDIlib_tally_t>() == 2);
};

// Entry points resolved from the runtime at load time.
pub(crate) type InitializeFn = unsafe extern "C" fn() -> bool;
pub(crate) type DestroyFn = unsafe extern "C" fn();
pub(crate) type VersionFn = unsafe extern "C" fn() -> *const c_char;
pub(crate) type IsSupportedCpuFn = unsafe extern "C" fn() -> bool;

pub(crate) type FindCreateFn =
    unsafe extern "C" fn(*const NDIlib_find_create_t) -> NDIlib_find_instance_t;
pub(crate) type FindDestroyFn = unsafe extern "C" fn(NDIlib_find_instance_t);
pub(crate) type FindWaitFn = unsafe extern "C" fn(NDIlib_find_instance_t, u32) -> bool;
pub(crate) type FindSourcesFn =
    unsafe extern "C" fn(NDIlib_find_instance_t, *mut u32) -> *const NDIlib_source_t;

pub(crate) type RecvCreateFn =
    unsafe extern "C" fn(*const NDIlib_recv_create_v3_t) -> NDIlib_recv_instance_t;
pub(crate) type RecvDestroyFn = unsafe extern "C" fn(NDIlib_recv_instance_t);
pub(crate) type RecvConnectFn = unsafe extern "C" fn(NDIlib_recv_instance_t, *const NDIlib_source_t);
pub(crate) type RecvCaptureFn = unsafe extern "C" fn(
    NDIlib_recv_instance_t,
    *mut NDIlib_video_frame_v2_t,
    *mut c_void,
    *mut c_void,
    u32,
) -> c_int;
pub(crate) type RecvFreeVideoFn =
    unsafe extern "C" fn(NDIlib_recv_instance_t, *const NDIlib_video_frame_v2_t);
pub(crate) type RecvSetTallyFn =
    unsafe extern "C" fn(NDIlib_recv_instance_t, *const NDIlib_tally_t) -> bool;

pub(crate) type FrameSyncCreateFn =
    unsafe extern "C" fn(NDIlib_recv_instance_t) -> NDIlib_framesync_instance_t;
pub(crate) type FrameSyncDestroyFn = unsafe extern "C" fn(NDIlib_framesync_instance_t);
pub(crate) type FrameSyncCaptureFn =
    unsafe extern "C" fn(NDIlib_framesync_instance_t, *mut NDIlib_video_frame_v2_t, c_int);
pub(crate) type FrameSyncFreeFn =
    unsafe extern "C" fn(NDIlib_framesync_instance_t, *mut NDIlib_video_frame_v2_t);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_source_is_null() {
        let source = NDIlib_source_t::default();
        assert!(source.p_ndi_name.is_null());
        assert!(source.p_url_address.is_null());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_video_frame_layout() {
        // Mirrors the const assertions so a failure shows up in test output too
        assert_eq!(size_of::<NDIlib_video_frame_v2_t>(), 72);
        assert_eq!(offset_of!(NDIlib_video_frame_v2_t, p_data), 40);
        assert_eq!(offset_of!(NDIlib_video_frame_v2_t, timestamp), 64);
    }

    #[test]
    fn test_frame_type_values() {
        assert_eq!(NDILIB_FRAME_TYPE_NONE, 0);
        assert_eq!(NDILIB_FRAME_TYPE_VIDEO, 1);
        assert_eq!(NDILIB_FRAME_TYPE_STATUS_CHANGE, 100);
    }
}
