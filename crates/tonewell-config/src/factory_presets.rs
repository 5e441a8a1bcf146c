//! Factory presets bundled with the library.
//!
//! Embedded as TOML so they read exactly like user presets and go through
//! the same parser.

use crate::Preset;

/// Factory presets by key, in display order.
static FACTORY_PRESETS_TOML: &[(&str, &str)] = &[
    ("init", INIT_PRESET),
    ("warm_plate", WARM_PLATE_PRESET),
    ("crunch_box", CRUNCH_BOX_PRESET),
    ("broken_radio", BROKEN_RADIO_PRESET),
];

const INIT_PRESET: &str = r#"
name = "Init"
description = "Empty chain"
"#;

const WARM_PLATE_PRESET: &str = r#"
name = "Warm Plate"
description = "Gentle tube drive into a long, dark plate"

[[slots]]
slot = 0
engine = "tube_preamp"
[slots.params]
Drive = 0.35
Saturation = 0.4

[[slots]]
slot = 1
engine = "plate_reverb"
mix = 0.3
[slots.params]
Size = 0.8
Damping = 0.55
Pre-Delay = 0.15
Mix = 1.0
"#;

const CRUNCH_BOX_PRESET: &str = r#"
name = "Crunch Box"
description = "Tight low end, cubic mids, folded top"

[[slots]]
slot = 0
engine = "multiband"
[slots.params]
"Low Drive" = 0.2
"Mid Drive" = 0.6
"High Drive" = 0.4
"Mid Shape" = 0.34
"High Shape" = 1.0
"#;

const BROKEN_RADIO_PRESET: &str = r#"
name = "Broken Radio"
description = "Six bits at a fifth of the rate, lightly folded"

[[slots]]
slot = 0
engine = "bitcrusher"
[slots.params]
Bits = 0.29
Rate = 0.2
Dither = 0.3

[[slots]]
slot = 1
engine = "wavefolder"
mix = 0.5
[slots.params]
Fold = 0.4
"#;

/// All factory presets, in display order.
pub fn factory_presets() -> Vec<Preset> {
    FACTORY_PRESETS_TOML
        .iter()
        .filter_map(|(_, toml)| Preset::from_toml(toml).ok())
        .collect()
}

/// Look a factory preset up by key or by its `name` field, ignoring case.
pub fn get_factory_preset(name: &str) -> Option<Preset> {
    FACTORY_PRESETS_TOML
        .iter()
        .filter_map(|(key, toml)| Some((key, Preset::from_toml(toml).ok()?)))
        .find(|(key, preset)| key.eq_ignore_ascii_case(name) || preset.name.eq_ignore_ascii_case(name))
        .map(|(_, preset)| preset)
}

/// Keys of the factory presets.
pub fn factory_preset_names() -> Vec<&'static str> {
    FACTORY_PRESETS_TOML.iter().map(|(key, _)| *key).collect()
}
