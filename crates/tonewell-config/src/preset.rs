//! Slot presets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use tonewell_registry::EngineKind;

use crate::error::{ConfigError, Result};

/// Number of slots a host chain offers.
pub const MAX_SLOTS: usize = 16;

/// Engine reference in a preset: a factory ID or a key/display name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum EngineRef {
    /// Numeric factory ID.
    Id(u16),
    /// Engine key (`"plate_reverb"`) or display name (`"Plate Reverb"`).
    Name(String),
}

impl EngineRef {
    /// Look the engine up in the registry.
    pub fn kind(&self) -> Option<EngineKind> {
        match self {
            EngineRef::Id(id) => EngineKind::from_id(*id),
            EngineRef::Name(name) => EngineKind::from_name(name),
        }
    }
}

impl fmt::Display for EngineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineRef::Id(id) => write!(f, "#{id}"),
            EngineRef::Name(name) => f.write_str(name),
        }
    }
}

impl From<&str> for EngineRef {
    fn from(name: &str) -> Self {
        EngineRef::Name(name.to_string())
    }
}

impl From<u16> for EngineRef {
    fn from(id: u16) -> Self {
        EngineRef::Id(id)
    }
}

impl From<EngineKind> for EngineRef {
    fn from(kind: EngineKind) -> Self {
        EngineRef::Name(kind.key().to_string())
    }
}

fn default_mix() -> f32 {
    1.0
}

/// One engine placed in a slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SlotConfig {
    /// Slot index in the host chain.
    pub slot: usize,
    /// Engine to build.
    pub engine: EngineRef,
    /// Host-side wet/dry mix for the slot.
    #[serde(default = "default_mix")]
    pub mix: f32,
    /// Normalized parameter values keyed by full or short parameter name.
    /// Parameters left out keep their defaults.
    #[serde(default)]
    pub params: BTreeMap<String, f32>,
}

impl SlotConfig {
    /// Create a slot entry with full mix and default parameters.
    pub fn new(slot: usize, engine: impl Into<EngineRef>) -> Self {
        Self {
            slot,
            engine: engine.into(),
            mix: 1.0,
            params: BTreeMap::new(),
        }
    }

    /// Set a normalized parameter value.
    pub fn with_param(mut self, name: impl Into<String>, value: f32) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Set the slot mix.
    pub fn with_mix(mut self, mix: f32) -> Self {
        self.mix = mix;
        self
    }
}

/// A slot entry checked against the registry, ready to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSlot {
    /// Slot index.
    pub slot: usize,
    /// Factory ID.
    pub engine_id: u16,
    /// `(parameter index, normalized value)` pairs in index order.
    pub params: Vec<(usize, f32)>,
    /// Host-side wet/dry mix.
    pub mix: f32,
}

/// A named chain of slot assignments.
///
/// # TOML Format
///
/// ```toml
/// name = "Warm Plate"
/// description = "Gentle tube drive into a long plate"
///
/// [[slots]]
/// slot = 0
/// engine = "tube_preamp"
/// [slots.params]
/// Drive = 0.45
///
/// [[slots]]
/// slot = 1
/// engine = 1
/// mix = 0.35
/// [slots.params]
/// size = 0.8
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Preset {
    /// Name of the preset.
    pub name: String,

    /// Optional description of the preset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Slot assignments.
    #[serde(default)]
    pub slots: Vec<SlotConfig>,
}

impl Preset {
    /// Create a new empty preset.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            slots: Vec::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a slot assignment.
    pub fn with_slot(mut self, slot: SlotConfig) -> Self {
        self.slots.push(slot);
        self
    }

    /// Parse a preset from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Convert the preset to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Number of slot assignments.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the preset assigns no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Check every slot against the registry and return the assignments
    /// ordered by slot index.
    pub fn resolve(&self) -> Result<Vec<ResolvedSlot>> {
        let mut resolved: Vec<ResolvedSlot> = Vec::with_capacity(self.slots.len());
        for entry in &self.slots {
            if entry.slot >= MAX_SLOTS {
                return Err(ConfigError::SlotOutOfRange {
                    slot: entry.slot,
                    max: MAX_SLOTS,
                });
            }
            if resolved.iter().any(|r| r.slot == entry.slot) {
                return Err(ConfigError::DuplicateSlot(entry.slot));
            }
            resolved.push(resolve_slot(entry)?);
        }
        resolved.sort_by_key(|r| r.slot);
        tracing::debug!(preset = %self.name, slots = resolved.len(), "preset resolved");
        Ok(resolved)
    }
}

fn resolve_slot(entry: &SlotConfig) -> Result<ResolvedSlot> {
    let kind = entry.engine.kind().ok_or_else(|| {
        tracing::warn!(engine = %entry.engine, slot = entry.slot, "unknown engine in preset");
        ConfigError::UnknownEngine(entry.engine.to_string())
    })?;

    if !(0.0..=1.0).contains(&entry.mix) {
        return Err(ConfigError::InvalidMix {
            slot: entry.slot,
            value: entry.mix,
        });
    }

    let table = kind.params();
    let mut params = Vec::with_capacity(entry.params.len());
    for (name, &value) in &entry.params {
        let index = tonewell_core::find_param(table, name)
            .or_else(|| tonewell_core::find_param(table, &name.replace('_', " ")))
            .ok_or_else(|| ConfigError::UnknownParameter {
                engine: kind.name(),
                param: name.clone(),
            })?;
        if !(0.0..=1.0).contains(&value) {
            tracing::warn!(engine = kind.name(), param = %name, value, "parameter out of range");
            return Err(ConfigError::InvalidParameter {
                engine: kind.name(),
                param: name.clone(),
                value,
            });
        }
        params.push((index, value));
    }
    params.sort_by_key(|&(index, _)| index);

    Ok(ResolvedSlot {
        slot: entry.slot,
        engine_id: kind.id(),
        params,
        mix: entry.mix,
    })
}

impl Default for Preset {
    fn default() -> Self {
        Self::new("Untitled")
    }
}
