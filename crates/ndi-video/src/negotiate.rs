//! Video mode negotiation
//!
//! Derives the renderer-facing [`VideoMode`] from the parameters of a captured
//! frame and the set of staging formats the renderer supports.

use ndi_recv::{FourCC, Resolution, SourceFrame};
use tracing::debug;

use crate::format::{
    AspectRatio, ColorFormat, ColorModel, ColorPrimaries, ColorRange, ColorSubsampling,
    ColorTransferFunction, FormatSet,
};
use crate::mode::VideoMode;

/// Staging formats a source tag can be converted into, plus its colour family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatFamily {
    /// Candidates in order of preference
    pub formats: &'static [ColorFormat],
    pub subsampling: ColorSubsampling,
    /// `true` for YCbCr tags, which take the model from the colorimetry
    pub ycbcr: bool,
}

impl FormatFamily {
    pub const fn of(fourcc: FourCC) -> Self {
        const fn family(
            formats: &'static [ColorFormat],
            subsampling: ColorSubsampling,
            ycbcr: bool,
        ) -> FormatFamily {
            FormatFamily {
                formats,
                subsampling,
                ycbcr,
            }
        }

        match fourcc {
            FourCC::RGBA | FourCC::RGBX => {
                family(&[ColorFormat::R8G8B8A8], ColorSubsampling::Rb444, false)
            }
            FourCC::BGRA | FourCC::BGRX => {
                family(&[ColorFormat::B8G8R8A8], ColorSubsampling::Rb444, false)
            }
            FourCC::UYVY => family(
                &[ColorFormat::B8G8R8G8, ColorFormat::G8B8R8TwoPlane],
                ColorSubsampling::Rb422,
                true,
            ),
            FourCC::UYVA => family(
                &[ColorFormat::G8B8R8A8ThreePlane],
                ColorSubsampling::Rb422,
                true,
            ),
            FourCC::P216 => family(
                &[ColorFormat::G16B16R16TwoPlane],
                ColorSubsampling::Rb422,
                true,
            ),
            FourCC::PA16 => family(
                &[ColorFormat::G16B16R16A16ThreePlane],
                ColorSubsampling::Rb422,
                true,
            ),
            FourCC::I420 | FourCC::YV12 => family(
                &[ColorFormat::G8B8R8ThreePlane],
                ColorSubsampling::Rb420,
                true,
            ),
            FourCC::NV12 => family(
                &[ColorFormat::G8B8R8TwoPlane],
                ColorSubsampling::Rb420,
                true,
            ),
        }
    }
}

/// Pixel aspect ratio from the picture (display) aspect ratio
///
/// A picture aspect ratio of `0.0` means square pixels, as does an empty
/// resolution.
pub fn pixel_aspect_ratio(resolution: Resolution, picture_aspect_ratio: f32) -> AspectRatio {
    if picture_aspect_ratio == 0.0 {
        return AspectRatio::SQUARE;
    }
    match resolution.aspect_ratio() {
        // DAR = SAR * PAR
        Some(storage) => AspectRatio(f64::from(picture_aspect_ratio) / storage),
        None => AspectRatio::SQUARE,
    }
}

/// YCbCr model and primaries by resolution
///
/// The HD test runs before the UHD test, so anything above SD resolves to
/// BT.709 and the BT.2020 branch is only reachable if the first test changes.
pub fn colorimetry(resolution: Resolution) -> (ColorModel, ColorPrimaries) {
    let Resolution { width, height } = resolution;
    if width > 720 || height > 576 {
        (ColorModel::Bt709, ColorPrimaries::Bt709)
    } else if width > 1920 || height > 1080 {
        (ColorModel::Bt2020, ColorPrimaries::Bt2020)
    } else {
        (ColorModel::Bt601, ColorPrimaries::Bt601_625)
    }
}

/// Derive the video mode of `frame`
///
/// Returns `None` if the frame carries an unknown tag or none of the staging
/// formats its tag converts to is in `supported`.
pub fn derive_mode(frame: &SourceFrame, supported: FormatSet) -> Option<VideoMode> {
    let Some(fourcc) = frame.fourcc() else {
        debug!("No video mode: unknown FourCC 0x{:08x}", frame.raw_fourcc());
        return None;
    };

    let resolution = frame.resolution();
    let pixel_aspect_ratio = pixel_aspect_ratio(resolution, frame.picture_aspect_ratio());
    let (ycbcr_model, color_primaries) = colorimetry(resolution);
    let family = FormatFamily::of(fourcc);
    let color_model = if family.ycbcr {
        ycbcr_model
    } else {
        ColorModel::Rgb
    };

    let formats: Vec<ColorFormat> = family
        .formats
        .iter()
        .copied()
        .filter(|format| supported.contains(*format))
        .collect();

    let mode = VideoMode::new(
        frame.frame_rate(),
        resolution,
        pixel_aspect_ratio,
        color_primaries,
        color_model,
        // Interchangeable with the 709 and 2020 curves here
        ColorTransferFunction::Bt601,
        family.subsampling,
        ColorRange::Full,
        formats,
    );

    match &mode {
        Some(mode) => debug!(
            "Derived video mode {} @ {} {:?} ({:?})",
            mode.resolution,
            mode.frame_rate,
            mode.formats(),
            mode.color_model
        ),
        None => debug!(
            "No video mode: renderer supports none of {:?} for {}",
            family.formats, fourcc
        ),
    }
    mode
}
