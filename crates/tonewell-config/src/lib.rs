//! Host configuration and slot presets for tonewell effects.
//!
//! # Features
//!
//! - **Host config**: [`HostConfig`] read from a TOML file, with defaults and
//!   range validation
//! - **Presets**: [`Preset`] slot lists parsed from TOML strings and
//!   [resolved](Preset::resolve) against the engine registry
//! - **Factory presets**: a few built-in chains
//!
//! # Example
//!
//! ```rust
//! use tonewell_config::{Preset, SlotConfig};
//! use tonewell_registry::EngineKind;
//!
//! let preset = Preset::from_toml(r#"
//! name = "Dark Room"
//!
//! [[slots]]
//! slot = 0
//! engine = "plate_reverb"
//! mix = 0.4
//! [slots.params]
//! damping = 0.8
//! "#).unwrap();
//!
//! let slots = preset.resolve().unwrap();
//! assert_eq!(slots[0].engine_id, EngineKind::PlateReverb.id());
//! assert_eq!(slots[0].mix, 0.4);
//! ```

mod error;
mod host;
mod preset;

/// Factory presets bundled with the library.
pub mod factory_presets;

pub use error::{ConfigError, Result};
pub use factory_presets::{factory_preset_names, factory_presets, get_factory_preset};
pub use host::{BLOCK_SIZE_RANGE, CHANNEL_RANGE, HostConfig, SAMPLE_RATE_RANGE};
pub use preset::{EngineRef, MAX_SLOTS, Preset, ResolvedSlot, SlotConfig};

/// Re-export commonly used types from tonewell-registry
pub use tonewell_registry::{EngineCategory, EngineKind};
