//! Negotiated video modes and staging frame descriptors

use std::time::Duration;

use ndi_recv::{Rational, Resolution};

use crate::format::{
    AspectRatio, ColorFormat, ColorModel, ColorPrimaries, ColorRange, ColorSubsampling,
    ColorTransferFunction, PlaneGeometry,
};

/// A fully resolved video mode
///
/// Every field holds one concrete value except `formats`, which lists the
/// staging formats acceptable to both sides in order of preference. The list
/// is never empty: a negotiation that cannot produce a format yields no mode
/// at all.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMode {
    pub frame_rate: Rational,
    pub resolution: Resolution,
    pub pixel_aspect_ratio: AspectRatio,
    pub color_primaries: ColorPrimaries,
    pub color_model: ColorModel,
    pub color_transfer_function: ColorTransferFunction,
    pub color_subsampling: ColorSubsampling,
    pub color_range: ColorRange,
    formats: Vec<ColorFormat>,
}

impl VideoMode {
    /// Build a mode, or `None` if `formats` is empty
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        frame_rate: Rational,
        resolution: Resolution,
        pixel_aspect_ratio: AspectRatio,
        color_primaries: ColorPrimaries,
        color_model: ColorModel,
        color_transfer_function: ColorTransferFunction,
        color_subsampling: ColorSubsampling,
        color_range: ColorRange,
        formats: Vec<ColorFormat>,
    ) -> Option<Self> {
        if formats.is_empty() {
            return None;
        }
        Some(Self {
            frame_rate,
            resolution,
            pixel_aspect_ratio,
            color_primaries,
            color_model,
            color_transfer_function,
            color_subsampling,
            color_range,
            formats,
        })
    }

    /// Acceptable staging formats, most preferred first
    pub fn formats(&self) -> &[ColorFormat] {
        &self.formats
    }

    /// The same mode restricted to one of its formats
    pub fn with_format(&self, format: ColorFormat) -> Option<Self> {
        self.formats.contains(&format).then(|| Self {
            formats: vec![format],
            ..self.clone()
        })
    }

    /// Staging frame descriptor for the preferred format
    pub fn frame_descriptor(&self) -> FrameDescriptor {
        FrameDescriptor {
            resolution: self.resolution,
            pixel_aspect_ratio: self.pixel_aspect_ratio,
            color_primaries: self.color_primaries,
            color_model: self.color_model,
            color_transfer_function: self.color_transfer_function,
            color_subsampling: self.color_subsampling,
            color_range: self.color_range,
            color_format: self.formats[0],
        }
    }

    /// Time between frames, `None` for a zero or malformed rate
    pub fn frame_period(&self) -> Option<Duration> {
        self.frame_rate.period()
    }
}

/// Layout of one staging frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameDescriptor {
    pub resolution: Resolution,
    pub pixel_aspect_ratio: AspectRatio,
    pub color_primaries: ColorPrimaries,
    pub color_model: ColorModel,
    pub color_transfer_function: ColorTransferFunction,
    pub color_subsampling: ColorSubsampling,
    pub color_range: ColorRange,
    pub color_format: ColorFormat,
}

impl FrameDescriptor {
    pub fn plane_geometry(&self) -> Vec<PlaneGeometry> {
        self.color_format.planes(
            self.resolution.width,
            self.resolution.height,
            self.color_subsampling,
        )
    }

    /// Total staging buffer size in bytes
    pub fn size(&self) -> usize {
        self.plane_geometry().iter().map(PlaneGeometry::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(formats: Vec<ColorFormat>) -> Option<VideoMode> {
        VideoMode::new(
            Rational::new(30000, 1001),
            Resolution::new(1920, 1080),
            AspectRatio::SQUARE,
            ColorPrimaries::Bt709,
            ColorModel::Bt709,
            ColorTransferFunction::Bt601,
            ColorSubsampling::Rb422,
            ColorRange::Full,
            formats,
        )
    }

    #[test]
    fn test_mode_without_formats_is_invalid() {
        assert!(mode(Vec::new()).is_none());
    }

    #[test]
    fn test_frame_descriptor_uses_first_format() {
        let mode = mode(vec![ColorFormat::B8G8R8G8, ColorFormat::G8B8R8TwoPlane]).expect("valid");
        let desc = mode.frame_descriptor();
        assert_eq!(desc.color_format, ColorFormat::B8G8R8G8);
        assert_eq!(desc.size(), 1920 * 2 * 1080);

        let narrowed = mode.with_format(ColorFormat::G8B8R8TwoPlane).expect("listed");
        assert_eq!(narrowed.formats(), &[ColorFormat::G8B8R8TwoPlane]);
        assert_eq!(narrowed.frame_descriptor().size(), 1920 * 1080 * 2);

        assert!(mode.with_format(ColorFormat::R8G8B8A8).is_none());
    }

    #[test]
    fn test_frame_period() {
        let mode = mode(vec![ColorFormat::B8G8R8G8]).expect("valid");
        let period = mode.frame_period().expect("rate");
        assert_eq!(period.as_micros(), 33366);
    }
}
