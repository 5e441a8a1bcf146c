//! Error types for configuration operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Host configuration value outside its accepted range
    #[error("invalid host config '{field}': {reason}")]
    InvalidHostConfig {
        /// Offending field.
        field: &'static str,
        /// Description of the accepted range.
        reason: String,
    },

    /// Engine name or ID the factory does not know
    #[error("unknown engine: {0}")]
    UnknownEngine(String),

    /// Parameter name not found in the engine's table
    #[error("unknown parameter '{param}' for engine '{engine}'")]
    UnknownParameter {
        /// Engine display name.
        engine: &'static str,
        /// Name as written in the preset.
        param: String,
    },

    /// Normalized parameter value outside `[0, 1]`
    #[error("parameter '{param}' for engine '{engine}' out of range: {value}")]
    InvalidParameter {
        /// Engine display name.
        engine: &'static str,
        /// Name as written in the preset.
        param: String,
        /// Rejected value.
        value: f32,
    },

    /// Slot mix outside `[0, 1]`
    #[error("mix for slot {slot} out of range: {value}")]
    InvalidMix {
        /// Slot index.
        slot: usize,
        /// Rejected value.
        value: f32,
    },

    /// Two entries target the same slot
    #[error("slot {0} is assigned more than once")]
    DuplicateSlot(usize),

    /// Slot index beyond the host's slot count
    #[error("slot {slot} exceeds the maximum of {max}")]
    SlotOutOfRange {
        /// Requested slot.
        slot: usize,
        /// Number of available slots.
        max: usize,
    },
}

impl ConfigError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn host(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidHostConfig {
            field,
            reason: reason.into(),
        }
    }
}

/// Convenience result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
