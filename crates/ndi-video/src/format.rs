//! Renderer-side pixel format vocabulary
//!
//! Names follow the Vulkan convention: components are listed in memory order,
//! `TwoPlane`/`ThreePlane` formats store luma (G) in the first plane and the
//! chroma pair (B = Cb, R = Cr) interleaved or split in the following ones.

use std::fmt;

use enumflags2::{bitflags, BitFlags};

/// Staging-buffer pixel format
#[bitflags]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorFormat {
    /// Packed 8-bit RGBA
    R8G8B8A8 = 1 << 0,
    /// Packed 8-bit BGRA
    B8G8R8A8 = 1 << 1,
    /// Packed 8-bit 4:2:2 (Cb Y Cr Y)
    B8G8R8G8 = 1 << 2,
    /// 8-bit luma plane + interleaved CbCr plane (NV12 / NV16)
    G8B8R8TwoPlane = 1 << 3,
    /// 8-bit luma plane + interleaved CbCr plane + alpha plane
    G8B8R8A8ThreePlane = 1 << 4,
    /// 16-bit luma plane + interleaved CbCr plane (P216)
    G16B16R16TwoPlane = 1 << 5,
    /// 16-bit luma plane + interleaved CbCr plane + alpha plane
    G16B16R16A16ThreePlane = 1 << 6,
    /// 8-bit luma, Cb and Cr planes (I420)
    G8B8R8ThreePlane = 1 << 7,
}

/// Set of staging formats, e.g. the formats a renderer can upload
pub type FormatSet = BitFlags<ColorFormat>;

/// Chroma sub-sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSubsampling {
    Rb444,
    Rb422,
    Rb420,
}

impl ColorSubsampling {
    /// Horizontal and vertical chroma divisors
    pub const fn divisors(self) -> (u32, u32) {
        match self {
            ColorSubsampling::Rb444 => (1, 1),
            ColorSubsampling::Rb422 => (2, 1),
            ColorSubsampling::Rb420 => (2, 2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorModel {
    Rgb,
    Bt601,
    Bt709,
    Bt2020,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorPrimaries {
    /// 625-line (PAL) primaries
    Bt601_625,
    Bt709,
    Bt2020,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorTransferFunction {
    Linear,
    Bt601,
    Bt709,
    Bt2020,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorRange {
    Full,
    ItuNarrow,
}

/// Geometry of one staging plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneGeometry {
    /// Bytes per row (also the row stride of the staging plane)
    pub row_bytes: usize,
    pub rows: usize,
}

impl PlaneGeometry {
    pub const fn len(&self) -> usize {
        self.row_bytes * self.rows
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ColorFormat {
    pub const fn plane_count(self) -> usize {
        match self {
            ColorFormat::R8G8B8A8 | ColorFormat::B8G8R8A8 | ColorFormat::B8G8R8G8 => 1,
            ColorFormat::G8B8R8TwoPlane | ColorFormat::G16B16R16TwoPlane => 2,
            ColorFormat::G8B8R8A8ThreePlane
            | ColorFormat::G16B16R16A16ThreePlane
            | ColorFormat::G8B8R8ThreePlane => 3,
        }
    }

    /// Tightly packed plane geometry for a `width` x `height` frame
    pub fn planes(
        self,
        width: u32,
        height: u32,
        subsampling: ColorSubsampling,
    ) -> Vec<PlaneGeometry> {
        let (cw, ch) = subsampling.divisors();
        let w = width as usize;
        let h = height as usize;
        let chroma_w = width.div_ceil(cw) as usize;
        let chroma_h = height.div_ceil(ch) as usize;
        let plane = |row_bytes, rows| PlaneGeometry { row_bytes, rows };

        match self {
            ColorFormat::R8G8B8A8 | ColorFormat::B8G8R8A8 => vec![plane(w * 4, h)],
            ColorFormat::B8G8R8G8 => vec![plane(w * 2, h)],
            ColorFormat::G8B8R8TwoPlane => vec![plane(w, h), plane(chroma_w * 2, chroma_h)],
            ColorFormat::G8B8R8A8ThreePlane => vec![
                plane(w, h),
                plane(chroma_w * 2, chroma_h),
                plane(w, h),
            ],
            ColorFormat::G16B16R16TwoPlane => {
                vec![plane(w * 2, h), plane(chroma_w * 4, chroma_h)]
            }
            ColorFormat::G16B16R16A16ThreePlane => vec![
                plane(w * 2, h),
                plane(chroma_w * 4, chroma_h),
                plane(w * 2, h),
            ],
            ColorFormat::G8B8R8ThreePlane => vec![
                plane(w, h),
                plane(chroma_w, chroma_h),
                plane(chroma_w, chroma_h),
            ],
        }
    }
}

impl fmt::Display for ColorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Pixel (sample) aspect ratio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectRatio(pub f64);

impl AspectRatio {
    pub const SQUARE: AspectRatio = AspectRatio(1.0);

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::SQUARE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_set_intersection() {
        let supported: FormatSet = ColorFormat::G8B8R8TwoPlane | ColorFormat::R8G8B8A8;
        assert!(supported.contains(ColorFormat::G8B8R8TwoPlane));
        assert!(!supported.contains(ColorFormat::B8G8R8G8));
        assert_eq!(supported.len(), 2);
    }

    #[test]
    fn test_plane_geometry_422() {
        let planes = ColorFormat::G8B8R8TwoPlane.planes(1920, 1080, ColorSubsampling::Rb422);
        assert_eq!(planes.len(), 2);
        assert_eq!(planes[0], PlaneGeometry { row_bytes: 1920, rows: 1080 });
        assert_eq!(planes[1], PlaneGeometry { row_bytes: 1920, rows: 1080 });

        let planes = ColorFormat::G16B16R16TwoPlane.planes(1920, 1080, ColorSubsampling::Rb422);
        assert_eq!(planes[0].row_bytes, 3840);
        assert_eq!(planes[1].row_bytes, 3840);
    }

    #[test]
    fn test_plane_geometry_420() {
        let planes = ColorFormat::G8B8R8ThreePlane.planes(1920, 1080, ColorSubsampling::Rb420);
        assert_eq!(planes[1], PlaneGeometry { row_bytes: 960, rows: 540 });
        assert_eq!(planes[2], PlaneGeometry { row_bytes: 960, rows: 540 });

        let planes = ColorFormat::G8B8R8TwoPlane.planes(1920, 1080, ColorSubsampling::Rb420);
        assert_eq!(planes[1], PlaneGeometry { row_bytes: 1920, rows: 540 });
    }

    #[test]
    fn test_plane_count_matches_geometry() {
        for format in FormatSet::all().iter() {
            let planes = format.planes(64, 32, ColorSubsampling::Rb422);
            assert_eq!(planes.len(), format.plane_count(), "{}", format);
        }
    }
}
