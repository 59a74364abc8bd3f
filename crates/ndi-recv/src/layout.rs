//! Plane layout of each NDI pixel format
//!
//! A pure table: for every [`FourCC`] it gives the number of memory planes,
//! the sample width and each plane's (width, height) divisor relative to the
//! first plane. Plane `n` of a frame with line stride `s` and height `h` has
//! a stride of `s / wdiv` bytes and `ceil(h / hdiv)` rows, and the planes are
//! stored back to back.

use crate::frame::FourCC;

/// Sub-sampling of one plane relative to the first plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneDivisor {
    pub width: u32,
    pub height: u32,
}

const fn div(width: u32, height: u32) -> PlaneDivisor {
    PlaneDivisor { width, height }
}

const FULL: PlaneDivisor = div(1, 1);

const PACKED: &[PlaneDivisor] = &[FULL];
const PACKED_ALPHA: &[PlaneDivisor] = &[FULL, div(2, 1)];
const SEMI_PLANAR_422: &[PlaneDivisor] = &[FULL, FULL];
const SEMI_PLANAR_422_ALPHA: &[PlaneDivisor] = &[FULL, FULL, div(2, 1)];
const PLANAR_420: &[PlaneDivisor] = &[FULL, div(2, 2), div(2, 2)];
const SEMI_PLANAR_420: &[PlaneDivisor] = &[FULL, div(1, 2)];

/// Memory layout of one pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    divisors: &'static [PlaneDivisor],
    sample_bytes: usize,
}

/// Extent of one plane inside a frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneExtent {
    pub offset: usize,
    pub stride: usize,
    pub rows: usize,
}

impl PlaneExtent {
    pub const fn len(&self) -> usize {
        self.stride * self.rows
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PlaneLayout {
    pub const fn of(fourcc: FourCC) -> Self {
        match fourcc {
            FourCC::RGBA | FourCC::RGBX | FourCC::BGRA | FourCC::BGRX | FourCC::UYVY => Self {
                divisors: PACKED,
                sample_bytes: 1,
            },
            FourCC::UYVA => Self {
                divisors: PACKED_ALPHA,
                sample_bytes: 1,
            },
            FourCC::P216 => Self {
                divisors: SEMI_PLANAR_422,
                sample_bytes: 2,
            },
            FourCC::PA16 => Self {
                divisors: SEMI_PLANAR_422_ALPHA,
                sample_bytes: 2,
            },
            FourCC::I420 | FourCC::YV12 => Self {
                divisors: PLANAR_420,
                sample_bytes: 1,
            },
            FourCC::NV12 => Self {
                divisors: SEMI_PLANAR_420,
                sample_bytes: 1,
            },
        }
    }

    pub const fn plane_count(&self) -> usize {
        self.divisors.len()
    }

    /// Bytes per sample (1 for 8-bit formats, 2 for 16-bit formats)
    pub const fn sample_bytes(&self) -> usize {
        self.sample_bytes
    }

    pub fn divisors(&self) -> &'static [PlaneDivisor] {
        self.divisors
    }

    /// Stride of `plane` given the stride of the first plane
    pub fn plane_stride(&self, plane: usize, stride: usize) -> usize {
        stride / self.divisors[plane].width as usize
    }

    pub fn plane_rows(&self, plane: usize, height: u32) -> usize {
        height.div_ceil(self.divisors[plane].height) as usize
    }

    pub fn extents(&self, stride: usize, height: u32) -> Vec<PlaneExtent> {
        let mut offset = 0;
        (0..self.plane_count())
            .map(|plane| {
                let extent = PlaneExtent {
                    offset,
                    stride: self.plane_stride(plane, stride),
                    rows: self.plane_rows(plane, height),
                };
                offset += extent.len();
                extent
            })
            .collect()
    }

    /// Size of the whole frame buffer
    pub fn total_size(&self, stride: usize, height: u32) -> usize {
        (0..self.plane_count())
            .map(|plane| self.plane_stride(plane, stride) * self.plane_rows(plane, height))
            .sum()
    }

    /// Slice a frame buffer into its planes
    ///
    /// Panics if `buffer` is shorter than [`total_size`](Self::total_size).
    pub fn split<'a>(&self, buffer: &'a [u8], stride: usize, height: u32) -> Vec<&'a [u8]> {
        let total = self.total_size(stride, height);
        assert!(
            buffer.len() >= total,
            "frame buffer of {} bytes is smaller than the {} byte layout",
            buffer.len(),
            total
        );
        self.extents(stride, height)
            .into_iter()
            .map(|extent| &buffer[extent.offset..extent.offset + extent.len()])
            .collect()
    }
}
