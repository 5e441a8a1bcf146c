//! Static parameter metadata.
//!
//! Every engine declares its parameters as a `static` table of
//! [`ParamDescriptor`]s. Hosts only ever exchange normalized `[0, 1]` values
//! with an engine; the descriptor's [`ParamMapping`] tells a UI or preset
//! tool what that value means in physical units.
//!
//! # Example
//!
//! ```rust
//! use tonewell_core::{ParamDescriptor, ParamMapping, ParamUnit};
//!
//! static PARAMS: [ParamDescriptor; 2] = [
//!     ParamDescriptor::new(0, "Mix", "Mix", ParamUnit::Percent, 0.5, ParamMapping::PERCENT),
//!     ParamDescriptor::new(
//!         1,
//!         "Cutoff",
//!         "Cut",
//!         ParamUnit::Hertz,
//!         0.5,
//!         ParamMapping::Exponential { min: 20.0, max: 20_000.0 },
//!     ),
//! ];
//!
//! assert_eq!(PARAMS[0].to_physical(0.5), 50.0);
//! assert!((PARAMS[1].to_physical(0.5) - 632.455).abs() < 0.01);
//! ```

use libm::powf;

/// Physical unit a parameter is displayed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamUnit {
    /// Decibels (dB).
    Decibels,
    /// Hertz (Hz).
    Hertz,
    /// Milliseconds (ms).
    Milliseconds,
    /// Percentage (%).
    Percent,
    /// Dimensionless ratio.
    Ratio,
    /// Quantizer word length.
    Bits,
    /// On/off switch.
    Toggle,
    /// One of a fixed set of choices.
    Choice,
    /// No unit.
    None,
}

impl ParamUnit {
    /// Returns the unit suffix string for display.
    ///
    /// ```rust
    /// use tonewell_core::ParamUnit;
    ///
    /// assert_eq!(ParamUnit::Decibels.suffix(), " dB");
    /// assert_eq!(ParamUnit::None.suffix(), "");
    /// ```
    pub const fn suffix(&self) -> &'static str {
        match self {
            ParamUnit::Decibels => " dB",
            ParamUnit::Hertz => " Hz",
            ParamUnit::Milliseconds => " ms",
            ParamUnit::Percent => "%",
            ParamUnit::Ratio => ":1",
            ParamUnit::Bits => " bit",
            ParamUnit::Toggle | ParamUnit::Choice | ParamUnit::None => "",
        }
    }
}

/// How a normalized value maps onto the physical range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamMapping {
    /// `min + p (max - min)`.
    Linear {
        /// Value at `p = 0`.
        min: f32,
        /// Value at `p = 1`.
        max: f32,
    },
    /// `min (max / min)^p`. Requires `min > 0`.
    Exponential {
        /// Value at `p = 0`.
        min: f32,
        /// Value at `p = 1`.
        max: f32,
    },
    /// `count` evenly spaced choices, reported as a choice index.
    Stepped {
        /// Number of choices.
        count: u32,
    },
    /// Off below 0.5, on above.
    Toggle,
}

impl ParamMapping {
    /// Linear 0..100 %.
    pub const PERCENT: Self = Self::Linear {
        min: 0.0,
        max: 100.0,
    };

    /// Map a normalized value to physical units.
    pub fn to_physical(&self, normalized: f32) -> f32 {
        let p = normalized.clamp(0.0, 1.0);
        match *self {
            Self::Linear { min, max } => min + p * (max - min),
            Self::Exponential { min, max } => min * powf(max / min, p),
            Self::Stepped { count } => {
                let last = count.saturating_sub(1) as f32;
                libm::roundf(p * last)
            }
            Self::Toggle => {
                if p > 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Inverse of [`to_physical`](Self::to_physical), clamped to `[0, 1]`.
    pub fn to_normalized(&self, physical: f32) -> f32 {
        let p = match *self {
            Self::Linear { min, max } => {
                if max == min {
                    0.0
                } else {
                    (physical - min) / (max - min)
                }
            }
            Self::Exponential { min, max } => {
                if physical <= 0.0 || min <= 0.0 || max == min {
                    0.0
                } else {
                    libm::logf(physical / min) / libm::logf(max / min)
                }
            }
            Self::Stepped { count } => {
                let last = count.saturating_sub(1);
                if last == 0 {
                    0.0
                } else {
                    physical / last as f32
                }
            }
            Self::Toggle => {
                if physical > 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
        };
        p.clamp(0.0, 1.0)
    }
}

/// Descriptor for one engine parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDescriptor {
    /// Stable parameter index.
    pub index: usize,
    /// Full display name, also the key used by presets.
    pub name: &'static str,
    /// Abbreviated name for constrained displays.
    pub short_name: &'static str,
    /// Display unit.
    pub unit: ParamUnit,
    /// Default normalized value.
    pub default: f32,
    /// Normalized-to-physical mapping.
    pub mapping: ParamMapping,
}

impl ParamDescriptor {
    /// Create a descriptor.
    pub const fn new(
        index: usize,
        name: &'static str,
        short_name: &'static str,
        unit: ParamUnit,
        default: f32,
        mapping: ParamMapping,
    ) -> Self {
        Self {
            index,
            name,
            short_name,
            unit,
            default,
            mapping,
        }
    }

    /// Dry/wet mix (0 = dry, 1 = wet).
    pub const fn mix(index: usize, default: f32) -> Self {
        Self::new(
            index,
            "Mix",
            "Mix",
            ParamUnit::Percent,
            default,
            ParamMapping::PERCENT,
        )
    }

    /// Output trim spanning ±`range_db`, centred on 0 dB at `p = 0.5`.
    pub const fn output(index: usize, range_db: f32) -> Self {
        Self::new(
            index,
            "Output",
            "Out",
            ParamUnit::Decibels,
            0.5,
            ParamMapping::Linear {
                min: -range_db,
                max: range_db,
            },
        )
    }

    /// Map a normalized value to physical units.
    pub fn to_physical(&self, normalized: f32) -> f32 {
        self.mapping.to_physical(normalized)
    }

    /// Returns `true` if `name` matches the full or short name, ignoring ASCII case.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.short_name.eq_ignore_ascii_case(name)
    }
}

/// Find a descriptor by name or short name.
pub fn find_param(table: &[ParamDescriptor], name: &str) -> Option<usize> {
    table.iter().position(|d| d.matches_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_mapping_roundtrip() {
        let m = ParamMapping::Linear {
            min: -12.0,
            max: 12.0,
        };
        assert_eq!(m.to_physical(0.5), 0.0);
        assert!((m.to_normalized(6.0) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_exponential_mapping() {
        let m = ParamMapping::Exponential {
            min: 20.0,
            max: 500.0,
        };
        assert!((m.to_physical(0.0) - 20.0).abs() < 1e-4);
        assert!((m.to_physical(1.0) - 500.0).abs() < 1e-2);
        let p = m.to_normalized(100.0);
        assert!((m.to_physical(p) - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_stepped_and_toggle() {
        let s = ParamMapping::Stepped { count: 4 };
        assert_eq!(s.to_physical(0.0), 0.0);
        assert_eq!(s.to_physical(1.0), 3.0);
        assert_eq!(s.to_physical(0.34), 1.0);
        assert_eq!(ParamMapping::Toggle.to_physical(0.6), 1.0);
        assert_eq!(ParamMapping::Toggle.to_physical(0.5), 0.0);
    }

    #[test]
    fn test_find_param_by_either_name() {
        let table = [
            ParamDescriptor::mix(0, 1.0),
            ParamDescriptor::output(1, 12.0),
        ];
        assert_eq!(find_param(&table, "mix"), Some(0));
        assert_eq!(find_param(&table, "Out"), Some(1));
        assert_eq!(find_param(&table, "output"), Some(1));
        assert_eq!(find_param(&table, "drive"), None);
    }
}
