//! Host configuration file.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::Path;

use crate::error::{ConfigError, Result};

/// Accepted sample rates in Hz.
pub const SAMPLE_RATE_RANGE: RangeInclusive<f32> = 8_000.0..=384_000.0;

/// Accepted block sizes in frames.
pub const BLOCK_SIZE_RANGE: RangeInclusive<usize> = 1..=8192;

/// Accepted channel counts.
pub const CHANNEL_RANGE: RangeInclusive<usize> = 1..=8;

/// Audio settings a host runs the engines with.
///
/// Missing keys fall back to their defaults, so an empty file is a valid
/// configuration.
///
/// # TOML Format
///
/// ```toml
/// sample_rate = 44100
/// max_block_size = 256
/// channels = 2
/// log_filter = "tonewell_io=debug"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Sample rate in Hz.
    pub sample_rate: f32,
    /// Largest block the host will pass to `process`.
    pub max_block_size: usize,
    /// Interleaved channel count for offline buffers.
    pub channels: usize,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            max_block_size: 512,
            channels: 2,
            log_filter: "info".to_string(),
        }
    }
}

impl HostConfig {
    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: HostConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            sample_rate = config.sample_rate,
            max_block_size = config.max_block_size,
            channels = config.channels,
            "host config loaded"
        );
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every field against its accepted range.
    pub fn validate(&self) -> Result<()> {
        if !SAMPLE_RATE_RANGE.contains(&self.sample_rate) {
            return Err(ConfigError::host(
                "sample_rate",
                format!("{} Hz is outside 8000..=384000", self.sample_rate),
            ));
        }
        if !BLOCK_SIZE_RANGE.contains(&self.max_block_size) {
            return Err(ConfigError::host(
                "max_block_size",
                format!("{} frames is outside 1..=8192", self.max_block_size),
            ));
        }
        if !CHANNEL_RANGE.contains(&self.channels) {
            return Err(ConfigError::host(
                "channels",
                format!("{} is outside 1..=8", self.channels),
            ));
        }
        Ok(())
    }

    /// Set the sample rate.
    pub fn with_sample_rate(mut self, sample_rate: f32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set the maximum block size.
    pub fn with_max_block_size(mut self, frames: usize) -> Self {
        self.max_block_size = frames;
        self
    }

    /// Set the channel count.
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }
}
