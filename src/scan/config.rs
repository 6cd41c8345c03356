//! Scan loop configuration.
//!
//! The delay between attempts bounds how hard the loop drives the decoder;
//! a zero delay would spin the decoder on every frame, so it is rejected.

use super::RetryPolicy;
use crate::capture::DeviceId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Longest accepted delay between attempts.
const MAX_TIME_BETWEEN_SCANS_MS: u64 = 60_000;

/// Configuration fixed when a [`ScanLoop`](super::ScanLoop) is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Delay before each decode attempt, in milliseconds.
    pub time_between_scans_ms: u64,
    /// Policy applied to sessions started by this loop.
    pub retry: RetryPolicy,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            time_between_scans_ms: 500,
            retry: RetryPolicy::default(),
        }
    }
}

impl ScanConfig {
    /// Creates a configuration with the given delay between attempts.
    pub fn with_interval_ms(time_between_scans_ms: u64) -> Self {
        Self {
            time_between_scans_ms,
            ..Default::default()
        }
    }

    pub fn time_between_scans(&self) -> Duration {
        Duration::from_millis(self.time_between_scans_ms)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.time_between_scans_ms == 0
            || self.time_between_scans_ms > MAX_TIME_BETWEEN_SCANS_MS
        {
            return Err(ConfigError::InvalidInterval(self.time_between_scans_ms));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid time between scans: {0} ms (must be 1-60000)")]
    InvalidInterval(u64),
    #[error("invalid surface dimensions")]
    InvalidDimensions,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Camera selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Exact device to open. Unset prefers an environment-facing camera.
    pub device_id: Option<DeviceId>,
    /// Frame width of the demo camera.
    pub width: u32,
    /// Frame height of the demo camera.
    pub height: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            width: 640,
            height: 480,
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Keep scanning until interrupted (true) or stop at the first result.
    pub continuous: bool,
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            continuous: true,
            metrics_port: 9090,
        }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scan.validate()?;
        if self.source.width == 0 || self.source.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        Ok(())
    }
}
