//! Source configuration
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//! use ndi_recv::{CaptureMode, ReceiverConfig};
//! use ndi_source::SourceConfig;
//!
//! let config = SourceConfig::builder()
//!     .receiver(ReceiverConfig::builder().capture_mode(CaptureMode::Direct).build())
//!     .regular_interval(Duration::from_millis(50))
//!     .channel_depth(8)
//!     .build();
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use ndi_recv::ReceiverConfig;

use crate::instance::Priority;

/// Configuration for an [`NdiSource`](crate::NdiSource)
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Receiver settings used on every open
    pub receiver: ReceiverConfig,

    /// Priority of the recurring updates (default: [`Priority::INPUT`])
    pub priority: Priority,

    /// Update interval while the frame rate is unknown (default: 100ms)
    pub regular_interval: Duration,

    /// Staged frames buffered for async consumers of a
    /// [`SourceDriver`](crate::SourceDriver) (default: 4)
    pub channel_depth: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            receiver: ReceiverConfig::default(),
            priority: Priority::INPUT,
            regular_interval: Duration::from_millis(100),
            channel_depth: 4,
        }
    }
}

impl SourceConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> SourceConfigBuilder {
        SourceConfigBuilder::default()
    }

    /// Validate configuration and return any issues
    ///
    /// Receiver issues are included.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut issues = self.receiver.validate().err().unwrap_or_default();

        if self.regular_interval.is_zero() {
            issues.push("regular_interval must be greater than zero".to_string());
        }

        if self.regular_interval > Duration::from_secs(10) {
            issues.push("regular_interval should not exceed 10s".to_string());
        }

        if self.channel_depth == 0 {
            issues.push("channel_depth must be at least 1".to_string());
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

/// Builder for [`SourceConfig`]
#[derive(Debug, Clone, Default)]
pub struct SourceConfigBuilder {
    receiver: Option<ReceiverConfig>,
    priority: Option<Priority>,
    regular_interval: Option<Duration>,
    channel_depth: Option<usize>,
}

impl SourceConfigBuilder {
    /// Set the receiver configuration
    #[must_use]
    pub fn receiver(mut self, receiver: ReceiverConfig) -> Self {
        self.receiver = Some(receiver);
        self
    }

    /// Set the update priority
    #[must_use]
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set the update interval used while the frame rate is unknown
    #[must_use]
    pub fn regular_interval(mut self, interval: Duration) -> Self {
        self.regular_interval = Some(interval);
        self
    }

    /// Set the driver output channel depth
    #[must_use]
    pub fn channel_depth(mut self, depth: usize) -> Self {
        self.channel_depth = Some(depth);
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> SourceConfig {
        let defaults = SourceConfig::default();

        SourceConfig {
            receiver: self.receiver.unwrap_or(defaults.receiver),
            priority: self.priority.unwrap_or(defaults.priority),
            regular_interval: self.regular_interval.unwrap_or(defaults.regular_interval),
            channel_depth: self.channel_depth.unwrap_or(defaults.channel_depth),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndi_recv::{Bandwidth, CaptureMode};

    #[test]
    fn test_default_config() {
        let config = SourceConfig::default();
        assert_eq!(config.priority, Priority::INPUT);
        assert_eq!(config.regular_interval, Duration::from_millis(100));
        assert_eq!(config.channel_depth, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SourceConfig::builder()
            .priority(Priority::OUTPUT)
            .channel_depth(1)
            .build();
        assert_eq!(config.priority, Priority::OUTPUT);
        assert_eq!(config.channel_depth, 1);
        assert_eq!(config.regular_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_validation_collects_receiver_issues() {
        let config = SourceConfig {
            receiver: ReceiverConfig {
                capture_mode: CaptureMode::Direct,
                capture_timeout_ms: 0,
                bandwidth: Bandwidth::AudioOnly,
                ..Default::default()
            },
            regular_interval: Duration::ZERO,
            channel_depth: 0,
            ..Default::default()
        };

        let issues = config.validate().expect_err("invalid");
        assert_eq!(issues.len(), 4);
        assert!(issues.iter().any(|i| i.contains("channel_depth")));
        assert!(issues.iter().any(|i| i.contains("regular_interval")));
    }
}
