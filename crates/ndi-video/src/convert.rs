//! Conversion from NDI frames into staging buffers
//!
//! Every supported (source tag, staging format) pair maps to exactly one
//! [`Conversion`]. A conversion is a composition of two copy primitives:
//!
//! - [`copy_plane`]: row-by-row copy between planes of different stride
//! - [`copy_plane_interleaved`]: split a plane of alternating words into two
//!   planes
//!
//! Source and destination are expected to agree on format, resolution and
//! plane count. A disagreement is a bug in format negotiation, so the
//! conversions assert instead of returning errors.

use ndi_recv::{FourCC, SourceFrame};
use tracing::trace;

use crate::format::{ColorFormat, ColorSubsampling};
use crate::uploader::StagedFrame;

/// Copy `rows` rows of `min(src_stride, dst_stride)` bytes
///
/// Equal strides are copied in one go.
pub fn copy_plane(src: &[u8], src_stride: usize, dst: &mut [u8], dst_stride: usize, rows: usize) {
    assert!(src.len() >= src_stride * rows, "source plane too small");
    assert!(dst.len() >= dst_stride * rows, "destination plane too small");

    if src_stride == dst_stride {
        let len = src_stride * rows;
        dst[..len].copy_from_slice(&src[..len]);
        return;
    }

    let width = src_stride.min(dst_stride);
    if width == 0 {
        return;
    }
    for (src_row, dst_row) in src
        .chunks(src_stride)
        .zip(dst.chunks_mut(dst_stride))
        .take(rows)
    {
        dst_row[..width].copy_from_slice(&src_row[..width]);
    }
}

/// Split alternating `WORD`-byte words into two planes
///
/// Within each row, even words go to `even_dst` and odd words to `odd_dst`,
/// each plane written with its own stride. The word pairs come from the
/// source row and each destination row takes as many words as its stride
/// holds, so the two planes may differ in width.
pub fn copy_plane_interleaved<const WORD: usize>(
    src: &[u8],
    src_stride: usize,
    even_dst: &mut [u8],
    even_stride: usize,
    odd_dst: &mut [u8],
    odd_stride: usize,
    rows: usize,
) {
    assert!(WORD > 0);
    assert!(src.len() >= src_stride * rows, "source plane too small");
    assert!(even_dst.len() >= even_stride * rows, "even destination plane too small");
    assert!(odd_dst.len() >= odd_stride * rows, "odd destination plane too small");

    let pairs = src_stride / (2 * WORD);
    let even_words = pairs.min(even_stride / WORD);
    let odd_words = pairs.min(odd_stride / WORD);

    for row in 0..rows {
        let src_row = &src[row * src_stride..][..pairs * 2 * WORD];

        let even_row = &mut even_dst[row * even_stride..][..even_words * WORD];
        for (pair, even) in src_row
            .chunks_exact(2 * WORD)
            .zip(even_row.chunks_exact_mut(WORD))
        {
            even.copy_from_slice(&pair[..WORD]);
        }

        let odd_row = &mut odd_dst[row * odd_stride..][..odd_words * WORD];
        for (pair, odd) in src_row
            .chunks_exact(2 * WORD)
            .zip(odd_row.chunks_exact_mut(WORD))
        {
            odd.copy_from_slice(&pair[WORD..]);
        }
    }
}

/// One conversion entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Conversion {
    /// RGBA/RGBX into packed RGBA
    Rgba,
    /// BGRA/BGRX into packed BGRA
    Bgra,
    /// UYVY into packed 4:2:2
    Uyvy,
    /// UYVY into two-plane 4:2:2 (NV16)
    UyvyToNv16,
    /// UYVA into two-plane 4:2:2 plus alpha plane
    UyvaToPa8,
    /// P216 into 16-bit two-plane 4:2:2
    P216,
    /// PA16 into 16-bit two-plane 4:2:2 plus alpha plane
    Pa16,
    /// I420 into three-plane 4:2:0
    I420,
    /// YV12 into three-plane 4:2:0 (chroma planes swapped)
    Yv12ToI420,
    /// NV12 into two-plane 4:2:0
    Nv12,
}

impl Conversion {
    /// Entry point for a (source tag, staging format) pair
    ///
    /// `None` means the pair is not convertible. Negotiation only offers
    /// formats for which this returns `Some`.
    pub fn select(source: FourCC, destination: ColorFormat) -> Option<Self> {
        let conversion = match (source, destination) {
            (FourCC::RGBA | FourCC::RGBX, ColorFormat::R8G8B8A8) => Conversion::Rgba,
            (FourCC::BGRA | FourCC::BGRX, ColorFormat::B8G8R8A8) => Conversion::Bgra,
            (FourCC::UYVY, ColorFormat::B8G8R8G8) => Conversion::Uyvy,
            (FourCC::UYVY, ColorFormat::G8B8R8TwoPlane) => Conversion::UyvyToNv16,
            (FourCC::UYVA, ColorFormat::G8B8R8A8ThreePlane) => Conversion::UyvaToPa8,
            (FourCC::P216, ColorFormat::G16B16R16TwoPlane) => Conversion::P216,
            (FourCC::PA16, ColorFormat::G16B16R16A16ThreePlane) => Conversion::Pa16,
            (FourCC::I420, ColorFormat::G8B8R8ThreePlane) => Conversion::I420,
            (FourCC::YV12, ColorFormat::G8B8R8ThreePlane) => Conversion::Yv12ToI420,
            (FourCC::NV12, ColorFormat::G8B8R8TwoPlane) => Conversion::Nv12,
            _ => return None,
        };
        Some(conversion)
    }

    /// Source tags this entry point reads
    pub const fn source_tags(self) -> &'static [FourCC] {
        match self {
            Conversion::Rgba => &[FourCC::RGBA, FourCC::RGBX],
            Conversion::Bgra => &[FourCC::BGRA, FourCC::BGRX],
            Conversion::Uyvy | Conversion::UyvyToNv16 => &[FourCC::UYVY],
            Conversion::UyvaToPa8 => &[FourCC::UYVA],
            Conversion::P216 => &[FourCC::P216],
            Conversion::Pa16 => &[FourCC::PA16],
            Conversion::I420 => &[FourCC::I420],
            Conversion::Yv12ToI420 => &[FourCC::YV12],
            Conversion::Nv12 => &[FourCC::NV12],
        }
    }

    /// Staging format and sub-sampling this entry point writes
    pub const fn destination(self) -> (ColorFormat, ColorSubsampling) {
        match self {
            Conversion::Rgba => (ColorFormat::R8G8B8A8, ColorSubsampling::Rb444),
            Conversion::Bgra => (ColorFormat::B8G8R8A8, ColorSubsampling::Rb444),
            Conversion::Uyvy => (ColorFormat::B8G8R8G8, ColorSubsampling::Rb422),
            Conversion::UyvyToNv16 => (ColorFormat::G8B8R8TwoPlane, ColorSubsampling::Rb422),
            Conversion::UyvaToPa8 => (ColorFormat::G8B8R8A8ThreePlane, ColorSubsampling::Rb422),
            Conversion::P216 => (ColorFormat::G16B16R16TwoPlane, ColorSubsampling::Rb422),
            Conversion::Pa16 => (ColorFormat::G16B16R16A16ThreePlane, ColorSubsampling::Rb422),
            Conversion::I420 | Conversion::Yv12ToI420 => {
                (ColorFormat::G8B8R8ThreePlane, ColorSubsampling::Rb420)
            }
            Conversion::Nv12 => (ColorFormat::G8B8R8TwoPlane, ColorSubsampling::Rb420),
        }
    }

    /// True if `frame` can be fed to this entry point
    pub fn accepts(self, frame: &SourceFrame) -> bool {
        frame
            .fourcc()
            .is_some_and(|fourcc| self.source_tags().contains(&fourcc))
    }

    /// Copy the held `src` frame into `dst`
    ///
    /// Panics if `src` is not held, its tag is not one of
    /// [`source_tags`](Self::source_tags), or `dst` does not have the format,
    /// sub-sampling, resolution and plane count of
    /// [`destination`](Self::destination).
    pub fn convert(self, src: &SourceFrame, dst: &mut dyn StagedFrame) {
        let (format, subsampling) = self.destination();
        let descriptor = *dst.descriptor();
        assert!(
            self.accepts(src),
            "{:?} cannot read {:?}",
            self,
            src.fourcc()
        );
        assert_eq!(descriptor.color_format, format, "{:?} destination format", self);
        assert_eq!(
            descriptor.color_subsampling, subsampling,
            "{:?} destination sub-sampling",
            self
        );
        assert_eq!(
            descriptor.resolution,
            src.resolution(),
            "{:?} resolution mismatch",
            self
        );

        let src_planes = src.planes().unwrap_or_default();
        assert!(!src_planes.is_empty(), "conversion from a frame that is not held");
        let layout = src.fourcc().map(FourCC::layout);
        let src_stride = |plane: usize| {
            layout.map_or(0, |layout| layout.plane_stride(plane, src.stride()))
        };

        let geometry = descriptor.plane_geometry();
        let mut dst_planes = dst.planes_mut();
        assert_eq!(
            dst_planes.len(),
            format.plane_count(),
            "{:?} destination plane count",
            self
        );

        trace!("{:?}: {} -> {}", self, src.resolution(), format);

        match self {
            Conversion::Rgba | Conversion::Bgra | Conversion::Uyvy => {
                copy_plane(
                    src_planes[0],
                    src_stride(0),
                    dst_planes[0],
                    geometry[0].row_bytes,
                    geometry[0].rows,
                );
            }
            Conversion::UyvyToNv16 => {
                let [luma, chroma] = &mut dst_planes[..] else {
                    unreachable!("plane count checked above")
                };
                // U Y V Y: even bytes are chroma, odd bytes are luma
                copy_plane_interleaved::<1>(
                    src_planes[0],
                    src_stride(0),
                    chroma,
                    geometry[1].row_bytes,
                    luma,
                    geometry[0].row_bytes,
                    geometry[0].rows,
                );
            }
            Conversion::UyvaToPa8 => {
                let [luma, chroma, alpha] = &mut dst_planes[..] else {
                    unreachable!("plane count checked above")
                };
                copy_plane_interleaved::<1>(
                    src_planes[0],
                    src_stride(0),
                    chroma,
                    geometry[1].row_bytes,
                    luma,
                    geometry[0].row_bytes,
                    geometry[0].rows,
                );
                copy_plane(
                    src_planes[1],
                    src_stride(1),
                    alpha,
                    geometry[2].row_bytes,
                    geometry[2].rows,
                );
            }
            Conversion::P216 | Conversion::Pa16 | Conversion::I420 | Conversion::Nv12 => {
                for (plane, dst_plane) in dst_planes.iter_mut().enumerate() {
                    copy_plane(
                        src_planes[plane],
                        src_stride(plane),
                        dst_plane,
                        geometry[plane].row_bytes,
                        geometry[plane].rows,
                    );
                }
            }
            Conversion::Yv12ToI420 => {
                // Y Cr Cb into Y Cb Cr
                for (src_plane, dst_plane) in [(0, 0), (1, 2), (2, 1)] {
                    copy_plane(
                        src_planes[src_plane],
                        src_stride(src_plane),
                        dst_planes[dst_plane],
                        geometry[dst_plane].row_bytes,
                        geometry[dst_plane].rows,
                    );
                }
            }
        }
    }
}
