//! Host-side processing for tonewell effects.
//!
//! This crate provides:
//!
//! - **Slot chain**: [`ProcessingEngine`] runs engines in numbered slots,
//!   each with its own latency-compensated wet/dry bus, and applies
//!   [`Preset`](tonewell_config::Preset)s
//! - **Offline processing**: [`ProcessingEngine::process_buffer`] for
//!   interleaved buffers of any length
//! - **Logging**: [`logging::init`] installs the `tracing` subscriber
//!
//! ## Quick Start
//!
//! ```rust
//! use tonewell_config::{HostConfig, get_factory_preset};
//! use tonewell_io::ProcessingEngine;
//!
//! tonewell_io::logging::init("warn");
//!
//! let config = HostConfig::from_toml("sample_rate = 44100").unwrap();
//! let mut engine = ProcessingEngine::new(config).unwrap();
//! engine.apply_preset(&get_factory_preset("warm_plate").unwrap()).unwrap();
//!
//! let mut buffer = vec![0.0f32; 2 * 4410];
//! engine.process_buffer(&mut buffer, 2).unwrap();
//! ```

mod engine;

/// Process-wide `tracing` subscriber setup.
pub mod logging;

pub use engine::ProcessingEngine;

use tonewell_config::ConfigError;
use tonewell_core::StateError;

/// Error types for host-side processing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid host configuration or preset.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Slot index beyond the chain.
    #[error("slot {slot} exceeds the maximum of {max}")]
    SlotOutOfRange {
        /// Requested slot.
        slot: usize,
        /// Number of slots.
        max: usize,
    },

    /// Operation on a slot with no engine.
    #[error("slot {0} is empty")]
    EmptySlot(usize),

    /// Rejected state blob.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Interleaved buffer does not hold whole frames.
    #[error("buffer of {len} samples does not hold whole {channels}-channel frames")]
    BufferShape {
        /// Buffer length in samples.
        len: usize,
        /// Requested channel count.
        channels: usize,
    },
}

/// Alias used where the crate name alone is ambiguous.
pub use Error as IoError;

/// Convenience result type for host-side processing.
pub type Result<T> = std::result::Result<T, Error>;
