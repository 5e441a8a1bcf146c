//! Engine factory and catalogue for tonewell effects.
//!
//! The set of engines is closed and known at compile time. Each one has a
//! small dense numeric ID that hosts persist in presets and state blobs;
//! [`create_engine`] turns an ID back into a boxed [`Engine`]. IDs the
//! factory does not know produce a [`Passthrough`], so a host never ends
//! up holding an empty slot.
//!
//! # Features
//!
//! - **Factory**: [`create_engine`] / [`EngineKind::create`]
//! - **Discovery**: [`EngineKind::ALL`], [`descriptors`] for UI listings
//! - **Name lookup**: engines by key or display name, parameters by name
//!
//! # Example
//!
//! ```rust
//! use tonewell_core::{AudioBlock, Engine};
//! use tonewell_registry::{EngineKind, create_engine};
//!
//! let mut reverb = create_engine(EngineKind::PlateReverb.id());
//! reverb.prepare(48_000.0, 128);
//! assert_eq!(reverb.name(), "Plate Reverb");
//!
//! // unknown IDs are harmless
//! let mut fallback = create_engine(999);
//! let mut data = [0.5f32; 4];
//! fallback.process(&mut AudioBlock::new(&mut data, 2));
//! assert_eq!(data, [0.5; 4]);
//!
//! let kind = EngineKind::from_name("wave folder").unwrap();
//! assert_eq!(kind.param_index("asym"), Some(1));
//! ```
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible. Disable the default `std` feature:
//!
//! ```toml
//! [dependencies]
//! tonewell-registry = { version = "0.1", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, vec::Vec};

use tonewell_core::{Engine, ParamDescriptor, find_param};
use tonewell_effects::{
    BitCrusher, MultibandSaturator, Passthrough, PlateReverb, TubePreamp, WaveFolder, bitcrusher,
    multiband, passthrough, reverb, tube, wavefolder,
};

/// Category of engine for organization and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineCategory {
    /// Saturation, clipping and other waveshaping engines
    Distortion,
    /// Reverbs and other time-based engines
    TimeBased,
    /// Bit reduction and folding
    LoFi,
    /// Signal routing helpers
    Utility,
}

impl EngineCategory {
    /// Returns a human-readable name for the category.
    pub const fn name(&self) -> &'static str {
        match self {
            EngineCategory::Distortion => "Distortion",
            EngineCategory::TimeBased => "Time-Based",
            EngineCategory::LoFi => "Lo-Fi",
            EngineCategory::Utility => "Utility",
        }
    }
}

/// Every engine the factory can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EngineKind {
    /// Identity.
    Passthrough = 0,
    /// Schroeder/Moorer plate reverb.
    PlateReverb = 1,
    /// Oversampled triode preamp.
    TubePreamp = 2,
    /// Three-band LR4 saturator.
    MultibandSaturator = 3,
    /// Bit depth and rate reduction.
    BitCrusher = 4,
    /// Oversampled wave folder.
    WaveFolder = 5,
}

impl EngineKind {
    /// All engines in ID order.
    pub const ALL: [EngineKind; 6] = [
        EngineKind::Passthrough,
        EngineKind::PlateReverb,
        EngineKind::TubePreamp,
        EngineKind::MultibandSaturator,
        EngineKind::BitCrusher,
        EngineKind::WaveFolder,
    ];

    /// Numeric factory ID.
    pub const fn id(self) -> u16 {
        self as u16
    }

    /// Look up an engine by numeric ID.
    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }

    /// Look up an engine by key (`"plate_reverb"`) or display name
    /// (`"Plate Reverb"`), ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.key().eq_ignore_ascii_case(name) || k.name().eq_ignore_ascii_case(name))
    }

    /// Stable lowercase key used in preset files.
    pub const fn key(self) -> &'static str {
        match self {
            EngineKind::Passthrough => "passthrough",
            EngineKind::PlateReverb => "plate_reverb",
            EngineKind::TubePreamp => "tube_preamp",
            EngineKind::MultibandSaturator => "multiband",
            EngineKind::BitCrusher => "bitcrusher",
            EngineKind::WaveFolder => "wavefolder",
        }
    }

    /// Display name, identical to [`Engine::name`] of the built engine.
    pub const fn name(self) -> &'static str {
        match self {
            EngineKind::Passthrough => "Passthrough",
            EngineKind::PlateReverb => "Plate Reverb",
            EngineKind::TubePreamp => "Tube Preamp",
            EngineKind::MultibandSaturator => "Multiband Saturator",
            EngineKind::BitCrusher => "Bit Crusher",
            EngineKind::WaveFolder => "Wave Folder",
        }
    }

    /// One-line description.
    pub const fn description(self) -> &'static str {
        match self {
            EngineKind::Passthrough => "Leaves audio untouched",
            EngineKind::PlateReverb => "Eight damped combs into four allpasses, with freeze",
            EngineKind::TubePreamp => "Koren triode, output transformer and passive EQ",
            EngineKind::MultibandSaturator => "Three LR4 bands with independent waveshapers",
            EngineKind::BitCrusher => "Bit depth quantizer with sample-and-hold decimation",
            EngineKind::WaveFolder => "Reflective folder with asymmetric offset",
        }
    }

    /// Category for organization.
    pub const fn category(self) -> EngineCategory {
        match self {
            EngineKind::Passthrough => EngineCategory::Utility,
            EngineKind::PlateReverb => EngineCategory::TimeBased,
            EngineKind::TubePreamp | EngineKind::MultibandSaturator => EngineCategory::Distortion,
            EngineKind::BitCrusher | EngineKind::WaveFolder => EngineCategory::LoFi,
        }
    }

    /// Build a fresh engine with default parameters.
    pub fn create(self) -> Box<dyn Engine> {
        match self {
            EngineKind::Passthrough => Box::new(Passthrough::new()),
            EngineKind::PlateReverb => Box::new(PlateReverb::new()),
            EngineKind::TubePreamp => Box::new(TubePreamp::new()),
            EngineKind::MultibandSaturator => Box::new(MultibandSaturator::new()),
            EngineKind::BitCrusher => Box::new(BitCrusher::new()),
            EngineKind::WaveFolder => Box::new(WaveFolder::new()),
        }
    }

    /// The engine's static parameter table.
    pub fn params(self) -> &'static [ParamDescriptor] {
        match self {
            EngineKind::Passthrough => &passthrough::PARAMS,
            EngineKind::PlateReverb => &reverb::PARAMS,
            EngineKind::TubePreamp => &tube::PARAMS,
            EngineKind::MultibandSaturator => &multiband::PARAMS,
            EngineKind::BitCrusher => &bitcrusher::PARAMS,
            EngineKind::WaveFolder => &wavefolder::PARAMS,
        }
    }

    /// Index of the parameter whose full or short name matches `name`.
    pub fn param_index(self, name: &str) -> Option<usize> {
        find_param(self.params(), name)
    }

    /// Catalogue entry for this engine.
    pub fn descriptor(self) -> EngineDescriptor {
        EngineDescriptor {
            id: self.id(),
            key: self.key(),
            name: self.name(),
            description: self.description(),
            category: self.category(),
            params: self.params(),
        }
    }
}

/// Describes an engine in the catalogue.
#[derive(Debug, Clone)]
pub struct EngineDescriptor {
    /// Factory ID.
    pub id: u16,
    /// Lowercase key.
    pub key: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Brief description of the engine.
    pub description: &'static str,
    /// Category for organization.
    pub category: EngineCategory,
    /// Parameter table.
    pub params: &'static [ParamDescriptor],
}

/// Create the engine registered under `id`.
///
/// Unknown IDs yield a [`Passthrough`].
pub fn create_engine(id: u16) -> Box<dyn Engine> {
    EngineKind::from_id(id).map_or_else(|| EngineKind::Passthrough.create(), EngineKind::create)
}

/// Descriptors for every engine, in ID order.
pub fn descriptors() -> Vec<EngineDescriptor> {
    EngineKind::ALL.iter().map(|k| k.descriptor()).collect()
}

/// Descriptors for engines in `category`.
pub fn descriptors_in_category(category: EngineCategory) -> Vec<EngineDescriptor> {
    EngineKind::ALL
        .iter()
        .filter(|k| k.category() == category)
        .map(|k| k.descriptor())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_dense() {
        for (i, kind) in EngineKind::ALL.iter().enumerate() {
            assert_eq!(kind.id() as usize, i);
            assert_eq!(EngineKind::from_id(kind.id()), Some(*kind));
        }
        assert_eq!(EngineKind::from_id(6), None);
    }

    #[test]
    fn test_created_engine_matches_kind() {
        for kind in EngineKind::ALL {
            let engine = kind.create();
            assert_eq!(engine.engine_id(), kind.id());
            assert_eq!(engine.name(), kind.name());
        }
        assert_eq!(EngineKind::PlateReverb.id(), PlateReverb::ID);
        assert_eq!(EngineKind::WaveFolder.id(), WaveFolder::ID);
    }

    #[test]
    fn test_param_table_is_the_engines_own() {
        for kind in EngineKind::ALL {
            let engine = kind.create();
            assert!(
                core::ptr::eq(kind.params(), engine.params().descriptors()),
                "{}",
                kind.name()
            );
        }
        assert_eq!(EngineKind::TubePreamp.params().len(), 12);
    }

    #[test]
    fn test_unknown_id_is_passthrough() {
        for id in [6u16, 42, u16::MAX] {
            let engine = create_engine(id);
            assert_eq!(engine.engine_id(), Passthrough::ID);
            assert_eq!(engine.num_parameters(), 0);
        }
    }

    #[test]
    fn test_name_lookup() {
        assert_eq!(
            EngineKind::from_name("plate_reverb"),
            Some(EngineKind::PlateReverb)
        );
        assert_eq!(
            EngineKind::from_name("TUBE PREAMP"),
            Some(EngineKind::TubePreamp)
        );
        assert_eq!(EngineKind::from_name("chorus"), None);
    }

    #[test]
    fn test_param_lookup() {
        assert_eq!(
            EngineKind::PlateReverb.param_index("Pre-Delay"),
            Some(PlateReverb::PREDELAY)
        );
        assert_eq!(
            EngineKind::BitCrusher.param_index("bits"),
            Some(BitCrusher::BITS)
        );
        assert_eq!(EngineKind::TubePreamp.param_index("nope"), None);
    }

    #[test]
    fn test_descriptors() {
        let all = descriptors();
        assert_eq!(all.len(), 6);
        assert_eq!(all[3].key, "multiband");
        assert_eq!(all[3].params.len(), 10);
        for d in &all {
            for (i, p) in d.params.iter().enumerate() {
                assert_eq!(p.index, i, "{} parameter {} out of order", d.name, p.name);
            }
        }
        assert_eq!(descriptors_in_category(EngineCategory::LoFi).len(), 2);
        assert_eq!(EngineCategory::TimeBased.name(), "Time-Based");
    }
}
