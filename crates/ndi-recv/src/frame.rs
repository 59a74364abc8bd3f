//! Captured NDI video frames
//!
//! [`SourceFrame`] is a transparent wrapper over the runtime's
//! `NDIlib_video_frame_v2_t`, so the runtime can write straight into it.
//! The pixel buffer it points at belongs to the network collaborator from
//! capture until the frame is released again through the same handle.

use std::ffi::{c_int, CStr};
use std::fmt;
use std::mem::{align_of, size_of};
use std::slice;
use std::time::Duration;

use crate::ffi::{NDIlib_video_frame_v2_t, NDILIB_SEND_TIMECODE_SYNTHESIZE};
use crate::layout::PlaneLayout;

/// Timecode sentinel asking for a timecode synthesized from the wall clock
pub const SYNTHESIZE_TIMECODE: i64 = NDILIB_SEND_TIMECODE_SYNTHESIZE;

/// Vendor pixel-format tag
///
/// Discriminants are the little-endian FourCC codes used on the wire.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FourCC {
    /// YCbCr 4:2:2, packed as U0 Y0 V0 Y1
    UYVY = u32::from_le_bytes(*b"UYVY"),
    /// UYVY followed by an 8-bit alpha plane
    UYVA = u32::from_le_bytes(*b"UYVA"),
    /// 16-bit 4:2:2 semi-planar (luma plane, then interleaved CbCr)
    P216 = u32::from_le_bytes(*b"P216"),
    /// P216 followed by an alpha plane
    PA16 = u32::from_le_bytes(*b"PA16"),
    /// 8-bit 4:2:0 planar, Cr plane before Cb
    YV12 = u32::from_le_bytes(*b"YV12"),
    /// 8-bit 4:2:0 planar, Cb plane before Cr
    I420 = u32::from_le_bytes(*b"I420"),
    /// 8-bit 4:2:0 semi-planar
    NV12 = u32::from_le_bytes(*b"NV12"),
    BGRA = u32::from_le_bytes(*b"BGRA"),
    BGRX = u32::from_le_bytes(*b"BGRX"),
    RGBA = u32::from_le_bytes(*b"RGBA"),
    RGBX = u32::from_le_bytes(*b"RGBX"),
}

impl FourCC {
    /// Every tag the runtime can hand out
    pub const ALL: [FourCC; 11] = [
        FourCC::UYVY,
        FourCC::UYVA,
        FourCC::P216,
        FourCC::PA16,
        FourCC::YV12,
        FourCC::I420,
        FourCC::NV12,
        FourCC::BGRA,
        FourCC::BGRX,
        FourCC::RGBA,
        FourCC::RGBX,
    ];

    /// Map a raw tag coming from the runtime
    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|fcc| *fcc as u32 == raw)
    }

    /// Bytes occupied by one pixel of the first plane
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            FourCC::BGRA | FourCC::BGRX | FourCC::RGBA | FourCC::RGBX => 4,
            FourCC::UYVY | FourCC::UYVA | FourCC::P216 | FourCC::PA16 => 2,
            FourCC::YV12 | FourCC::I420 | FourCC::NV12 => 1,
        }
    }

    /// Smallest valid line stride for the given width
    pub const fn min_stride(self, width: u32) -> usize {
        width as usize * self.bytes_per_pixel()
    }

    /// Plane layout of this tag
    pub const fn layout(self) -> PlaneLayout {
        PlaneLayout::of(self)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = (*self as u32).to_le_bytes();
        write!(f, "{}", String::from_utf8_lossy(&bytes))
    }
}

/// Field layout of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanFormat {
    Interleaved,
    Progressive,
    Field0,
    Field1,
}

impl ScanFormat {
    pub const fn to_raw(self) -> c_int {
        match self {
            ScanFormat::Interleaved => 0,
            ScanFormat::Progressive => 1,
            ScanFormat::Field0 => 2,
            ScanFormat::Field1 => 3,
        }
    }

    pub const fn from_raw(raw: c_int) -> Option<Self> {
        match raw {
            0 => Some(ScanFormat::Interleaved),
            1 => Some(ScanFormat::Progressive),
            2 => Some(ScanFormat::Field0),
            3 => Some(ScanFormat::Field1),
            _ => None,
        }
    }
}

/// Frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height, or `None` for an empty resolution
    #[must_use]
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.width == 0 || self.height == 0 {
            None
        } else {
            Some(f64::from(self.width) / f64::from(self.height))
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Frame rate as numerator / denominator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    #[must_use]
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    #[must_use]
    pub fn as_f64(&self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame, `None` when the rate is zero or malformed
    #[must_use]
    pub fn period(&self) -> Option<Duration> {
        if self.num <= 0 || self.den <= 0 {
            return None;
        }
        let nanos = u64::from(self.den.unsigned_abs()) * 1_000_000_000
            / u64::from(self.num.unsigned_abs());
        Some(Duration::from_nanos(nanos))
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::new(30000, 1001)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// The parameters whose change forces a new video mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameGeometry {
    pub resolution: Resolution,
    /// Raw tag, kept raw so unknown tags still compare
    pub fourcc: u32,
    pub frame_rate: Rational,
    pub picture_aspect_ratio: f32,
}

impl FrameGeometry {
    pub fn fourcc(&self) -> Option<FourCC> {
        FourCC::from_raw(self.fourcc)
    }
}

/// One captured network frame
///
/// The data pointer is non-null exactly while the frame is held, i.e. between
/// a capture and the matching release. A frame is neither `Clone` nor
/// `Copy`, so a held buffer has exactly one owner:
///
/// ```compile_fail
/// let frame = ndi_recv::SourceFrame::default();
/// let copy = frame;
/// assert!(!frame.is_held());
/// ```
///
/// Use [`geometry`](Self::geometry) or [`detached`](Self::detached) for a
/// snapshot.
#[repr(transparent)]
pub struct SourceFrame {
    raw: NDIlib_video_frame_v2_t,
}

const _: () = {
    assert!(size_of::<SourceFrame>() == size_of::<NDIlib_video_frame_v2_t>());
    assert!(align_of::<SourceFrame>() == align_of::<NDIlib_video_frame_v2_t>());
};

// SAFETY: the buffer behind `p_data` is owned by the runtime and may be
// released from any thread; the frame is only ever moved, never shared while
// held, so there is no concurrent access to it.
unsafe impl Send for SourceFrame {}

impl SourceFrame {
    /// Create an empty frame description (no data held)
    pub fn new(
        resolution: Resolution,
        fourcc: FourCC,
        frame_rate: Rational,
        picture_aspect_ratio: f32,
        scan_format: ScanFormat,
    ) -> Self {
        Self {
            raw: NDIlib_video_frame_v2_t {
                xres: resolution.width as c_int,
                yres: resolution.height as c_int,
                FourCC: fourcc as u32,
                frame_rate_N: frame_rate.num,
                frame_rate_D: frame_rate.den,
                picture_aspect_ratio,
                frame_format_type: scan_format.to_raw(),
                timecode: SYNTHESIZE_TIMECODE,
                p_data: std::ptr::null_mut(),
                line_stride_in_bytes: 0,
                p_metadata: std::ptr::null(),
                timestamp: 0,
            },
        }
    }

    /// Wrap a frame filled by the runtime
    pub const fn from_raw(raw: NDIlib_video_frame_v2_t) -> Self {
        Self { raw }
    }

    pub const fn as_raw(&self) -> &NDIlib_video_frame_v2_t {
        &self.raw
    }

    /// Mutable access for the runtime to write into
    pub fn as_raw_mut(&mut self) -> &mut NDIlib_video_frame_v2_t {
        &mut self.raw
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.raw.xres.max(0) as u32, self.raw.yres.max(0) as u32)
    }

    /// Pixel format, `None` if the runtime produced a tag outside the known set
    pub fn fourcc(&self) -> Option<FourCC> {
        FourCC::from_raw(self.raw.FourCC)
    }

    pub const fn raw_fourcc(&self) -> u32 {
        self.raw.FourCC
    }

    pub const fn frame_rate(&self) -> Rational {
        Rational::new(self.raw.frame_rate_N, self.raw.frame_rate_D)
    }

    /// Picture (display) aspect ratio; `0.0` means square pixels
    pub const fn picture_aspect_ratio(&self) -> f32 {
        self.raw.picture_aspect_ratio
    }

    pub const fn scan_format(&self) -> Option<ScanFormat> {
        ScanFormat::from_raw(self.raw.frame_format_type)
    }

    /// Timecode in 100 ns units, or [`SYNTHESIZE_TIMECODE`]
    pub const fn timecode(&self) -> i64 {
        self.raw.timecode
    }

    pub const fn timestamp(&self) -> i64 {
        self.raw.timestamp
    }

    /// Line stride of the first plane in bytes
    pub fn stride(&self) -> usize {
        self.raw.line_stride_in_bytes.max(0) as usize
    }

    pub fn is_held(&self) -> bool {
        !self.raw.p_data.is_null()
    }

    pub fn data_ptr(&self) -> *mut u8 {
        self.raw.p_data
    }

    /// Per-frame metadata string, if any
    pub fn metadata(&self) -> Option<&CStr> {
        if self.raw.p_metadata.is_null() {
            None
        } else {
            // SAFETY: the runtime hands out NUL-terminated metadata that lives
            // as long as the frame is held; the borrow is tied to `self`.
            Some(unsafe { CStr::from_ptr(self.raw.p_metadata) })
        }
    }

    /// The same frame parameters with no buffer attached
    pub fn detached(&self) -> Self {
        let mut raw = self.raw;
        raw.p_data = std::ptr::null_mut();
        raw.p_metadata = std::ptr::null();
        Self { raw }
    }

    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry {
            resolution: self.resolution(),
            fourcc: self.raw.FourCC,
            frame_rate: self.frame_rate(),
            picture_aspect_ratio: self.raw.picture_aspect_ratio,
        }
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.raw.xres = resolution.width as c_int;
        self.raw.yres = resolution.height as c_int;
    }

    pub fn set_fourcc(&mut self, fourcc: FourCC) {
        self.raw.FourCC = fourcc as u32;
    }

    pub fn set_frame_rate(&mut self, rate: Rational) {
        self.raw.frame_rate_N = rate.num;
        self.raw.frame_rate_D = rate.den;
    }

    pub fn set_picture_aspect_ratio(&mut self, dar: f32) {
        self.raw.picture_aspect_ratio = dar;
    }

    pub fn set_scan_format(&mut self, scan: ScanFormat) {
        self.raw.frame_format_type = scan.to_raw();
    }

    pub fn set_timecode(&mut self, timecode: i64) {
        self.raw.timecode = timecode;
    }

    pub fn set_timestamp(&mut self, timestamp: i64) {
        self.raw.timestamp = timestamp;
    }

    /// Attach a pixel buffer
    ///
    /// # Safety
    ///
    /// `data` must point at a buffer of at least
    /// `layout().total_size(stride, height)` bytes that stays valid and
    /// unaliased until [`clear_data`](Self::clear_data) is called.
    pub unsafe fn set_data(&mut self, data: *mut u8, stride: usize) {
        self.raw.p_data = data;
        self.raw.line_stride_in_bytes = stride as c_int;
    }

    /// Forget the pixel buffer after it was handed back
    pub fn clear_data(&mut self) {
        self.raw.p_data = std::ptr::null_mut();
        self.raw.p_metadata = std::ptr::null();
    }

    /// Plane views over the held buffer
    ///
    /// Returns `None` if no buffer is held. Panics on an unknown tag or on a
    /// stride too small for the width, both of which are runtime contract
    /// violations.
    pub fn planes(&self) -> Option<Vec<&[u8]>> {
        if !self.is_held() {
            return None;
        }

        let fourcc = self
            .fourcc()
            .unwrap_or_else(|| panic!("unsupported FourCC 0x{:08x} in held frame", self.raw.FourCC));
        let resolution = self.resolution();
        let stride = self.stride();
        assert!(
            stride >= fourcc.min_stride(resolution.width),
            "stride {} too small for {} {}",
            stride,
            resolution,
            fourcc
        );

        let layout = fourcc.layout();
        // SAFETY: a held frame points at a buffer laid out as `layout`
        // describes (see `set_data`); the slice borrows from `self`.
        let buffer = unsafe {
            slice::from_raw_parts(
                self.raw.p_data.cast_const(),
                layout.total_size(stride, resolution.height),
            )
        };
        Some(layout.split(buffer, stride, resolution.height))
    }
}

impl Default for SourceFrame {
    fn default() -> Self {
        Self::new(
            Resolution::default(),
            FourCC::UYVY,
            Rational::default(),
            0.0,
            ScanFormat::Progressive,
        )
    }
}

impl fmt::Debug for SourceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFrame")
            .field("resolution", &self.resolution())
            .field("fourcc", &self.fourcc())
            .field("frame_rate", &self.frame_rate())
            .field("picture_aspect_ratio", &self.picture_aspect_ratio())
            .field("scan_format", &self.scan_format())
            .field("stride", &self.stride())
            .field("held", &self.is_held())
            .finish()
    }
}
