//! Receive-side configuration
//!
//! Provides configuration for loading the NDI runtime, discovering sources and
//! creating receivers, with a builder pattern for ergonomic construction.
//!
//! # Examples
//!
//! ```rust
//! use ndi_recv::{Bandwidth, CaptureMode, ReceiverConfig, RecvColorFormat};
//!
//! // Using builder pattern
//! let config = ReceiverConfig::builder()
//!     .color_format(RecvColorFormat::UyvyBgra)
//!     .bandwidth(Bandwidth::Lowest)
//!     .capture_mode(CaptureMode::Direct)
//!     .capture_timeout_ms(500)
//!     .build();
//!
//! // Using struct literal with defaults
//! let config = ReceiverConfig {
//!     allow_video_fields: true,
//!     ..Default::default()
//! };
//! ```

use std::ffi::c_int;
use std::path::PathBuf;
use std::time::Duration;

/// Colour formats the runtime may deliver
///
/// The first name is used for opaque video, the second for video with alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecvColorFormat {
    BgrxBgra,
    UyvyBgra,
    RgbxRgba,
    UyvyRgba,
    /// Whatever needs the least work on the receive side
    Fastest,
    /// Highest fidelity the sender offers (may be 16-bit formats)
    #[default]
    Best,
}

impl RecvColorFormat {
    pub const fn to_raw(self) -> c_int {
        match self {
            RecvColorFormat::BgrxBgra => 0,
            RecvColorFormat::UyvyBgra => 1,
            RecvColorFormat::RgbxRgba => 2,
            RecvColorFormat::UyvyRgba => 3,
            RecvColorFormat::Fastest => 100,
            RecvColorFormat::Best => 101,
        }
    }
}

/// Receive bandwidth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Bandwidth {
    MetadataOnly,
    AudioOnly,
    /// Low-resolution preview stream
    Lowest,
    #[default]
    Highest,
}

impl Bandwidth {
    pub const fn to_raw(self) -> c_int {
        match self {
            Bandwidth::MetadataOnly => -10,
            Bandwidth::AudioOnly => 10,
            Bandwidth::Lowest => 0,
            Bandwidth::Highest => 100,
        }
    }
}

/// How frames are pulled from a receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CaptureMode {
    /// Through a frame-sync helper that always returns the latest frame
    #[default]
    FrameSync,
    /// Directly from the receiver, blocking up to the capture timeout
    Direct,
}

/// Configuration for an NDI receiver
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Preferred delivery colour format (default: Best)
    pub color_format: RecvColorFormat,

    /// Receive bandwidth (default: Highest)
    pub bandwidth: Bandwidth,

    /// Deliver fielded video as fields instead of frames (default: false)
    pub allow_video_fields: bool,

    /// Frame-sync or direct capture (default: FrameSync)
    pub capture_mode: CaptureMode,

    /// Blocking wait for [`CaptureMode::Direct`] in milliseconds (default: 1000)
    pub capture_timeout_ms: u32,

    /// Prefix the receiver name with this machine's host name (default: true)
    ///
    /// Produces names like `"HOST (Program A)"` in the sender's connection list.
    pub prefix_host_name: bool,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            color_format: RecvColorFormat::Best,
            bandwidth: Bandwidth::Highest,
            allow_video_fields: false,
            capture_mode: CaptureMode::FrameSync,
            capture_timeout_ms: 1000,
            prefix_host_name: true,
        }
    }
}

impl ReceiverConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> ReceiverConfigBuilder {
        ReceiverConfigBuilder::default()
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.capture_timeout_ms))
    }

    /// Validate configuration and return any issues
    ///
    /// Returns `Ok(())` if configuration is valid, or a list of issues.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut issues = Vec::new();

        if self.capture_mode == CaptureMode::Direct && self.capture_timeout_ms == 0 {
            issues.push("capture_timeout_ms must be at least 1 for direct capture".to_string());
        }

        if self.capture_timeout_ms > 60_000 {
            issues.push("capture_timeout_ms should not exceed 60000".to_string());
        }

        if matches!(self.bandwidth, Bandwidth::MetadataOnly | Bandwidth::AudioOnly) {
            issues.push("bandwidth must include video".to_string());
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

/// Builder for [`ReceiverConfig`]
#[derive(Debug, Clone, Default)]
pub struct ReceiverConfigBuilder {
    color_format: Option<RecvColorFormat>,
    bandwidth: Option<Bandwidth>,
    allow_video_fields: Option<bool>,
    capture_mode: Option<CaptureMode>,
    capture_timeout_ms: Option<u32>,
    prefix_host_name: Option<bool>,
}

impl ReceiverConfigBuilder {
    /// Set the preferred delivery colour format
    #[must_use]
    pub fn color_format(mut self, format: RecvColorFormat) -> Self {
        self.color_format = Some(format);
        self
    }

    /// Set the receive bandwidth
    #[must_use]
    pub fn bandwidth(mut self, bandwidth: Bandwidth) -> Self {
        self.bandwidth = Some(bandwidth);
        self
    }

    /// Set whether fielded video is delivered as fields
    #[must_use]
    pub fn allow_video_fields(mut self, allow: bool) -> Self {
        self.allow_video_fields = Some(allow);
        self
    }

    /// Set the capture mode
    #[must_use]
    pub fn capture_mode(mut self, mode: CaptureMode) -> Self {
        self.capture_mode = Some(mode);
        self
    }

    /// Set the direct capture timeout in milliseconds
    #[must_use]
    pub fn capture_timeout_ms(mut self, timeout: u32) -> Self {
        self.capture_timeout_ms = Some(timeout);
        self
    }

    /// Set whether the receiver name carries the host name
    #[must_use]
    pub fn prefix_host_name(mut self, enable: bool) -> Self {
        self.prefix_host_name = Some(enable);
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> ReceiverConfig {
        let defaults = ReceiverConfig::default();

        ReceiverConfig {
            color_format: self.color_format.unwrap_or(defaults.color_format),
            bandwidth: self.bandwidth.unwrap_or(defaults.bandwidth),
            allow_video_fields: self
                .allow_video_fields
                .unwrap_or(defaults.allow_video_fields),
            capture_mode: self.capture_mode.unwrap_or(defaults.capture_mode),
            capture_timeout_ms: self
                .capture_timeout_ms
                .unwrap_or(defaults.capture_timeout_ms),
            prefix_host_name: self.prefix_host_name.unwrap_or(defaults.prefix_host_name),
        }
    }
}

/// Configuration for source discovery
#[derive(Debug, Clone)]
pub struct FinderConfig {
    /// Include sources running on this machine (default: true)
    pub show_local_sources: bool,

    /// Comma separated group list, `None` for the default groups
    pub groups: Option<String>,

    /// Comma separated addresses to query directly, for networks without mDNS
    pub extra_ips: Option<String>,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            show_local_sources: true,
            groups: None,
            extra_ips: None,
        }
    }
}

impl FinderConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut issues = Vec::new();

        if self.groups.as_deref().is_some_and(str::is_empty) {
            issues.push("groups cannot be empty when set".to_string());
        }

        if self.extra_ips.as_deref().is_some_and(str::is_empty) {
            issues.push("extra_ips cannot be empty when set".to_string());
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

/// Environment variables the NDI installers set, newest first
pub const RUNTIME_DIR_VARS: [&str; 3] = [
    "NDI_RUNTIME_DIR_V6",
    "NDI_RUNTIME_DIR_V5",
    "NDI_RUNTIME_DIR_V4",
];

/// Platform file name of the runtime library
#[cfg(target_os = "windows")]
pub const LIBRARY_NAME: &str = "Processing.NDI.Lib.x64.dll";
#[cfg(target_os = "macos")]
pub const LIBRARY_NAME: &str = "libndi.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const LIBRARY_NAME: &str = "libndi.so.6";

/// Where to find the NDI runtime
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// Directory holding the runtime; `None` lets the system loader search
    ///
    /// Defaults to the first of [`RUNTIME_DIR_VARS`] that is set.
    pub runtime_dir: Option<PathBuf>,

    /// Library file name (default: [`LIBRARY_NAME`])
    pub library_name: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            runtime_dir: RUNTIME_DIR_VARS
                .iter()
                .find_map(|var| std::env::var_os(var))
                .map(PathBuf::from),
            library_name: LIBRARY_NAME.to_string(),
        }
    }
}

impl LibraryConfig {
    /// Path handed to the dynamic loader
    pub fn library_path(&self) -> PathBuf {
        match &self.runtime_dir {
            Some(dir) => dir.join(&self.library_name),
            None => PathBuf::from(&self.library_name),
        }
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        if self.library_name.is_empty() {
            Err(vec!["library_name cannot be empty".to_string()])
        } else {
            Ok(())
        }
    }
}
