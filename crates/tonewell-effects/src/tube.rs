//! Tube preamp: Koren triode, output transformer and passive EQ.
//!
//! # Signal Flow
//!
//! ```text
//! in ─ cable LC ─┬─ ↑8 ─ Miller LPF ─ triode ─ cathode bypass ─ transformer ─ ↓8 ─┐
//!                │                                                               │
//!                │   ┌───────────────────────────────────────────────────────────┘
//!                │   └─ noise ─ core resonances ─ EQ ─ output ─ 3·tanh(x/3) ─┐
//!                └─ dry delay (oversampler latency) ─────────────────────────┴─ mix ─ out
//! ```
//!
//! ## Triode
//!
//! Grid voltage `vg = x · (1 + 10·drive) + grid_bias + (bias - 0.5) · 5`.
//! Only the signal part passes the Miller one-pole, whose corner is
//! `1 / (2π Cgp Rp)`; the bias is a DC offset and never touches that filter.
//! Every valve in the table puts that corner above the internal Nyquist
//! rate, so the one-pole clamps to `0.49·fs` and only trims the top octave.
//! With a fixed plate voltage of 250 V:
//!
//! ```text
//! E1 = 250/μ + vgk
//! Ip = (kp/kg1) · E1^1.5 / (1 + (E1/kvb)^ex) · 1/(1 + e^(-0.1·E1))    (E1 > 0)
//! ```
//!
//! The output is `(Ip - Ip_q) / (gm · G)` where `Ip_q` is the quiescent
//! current at the current bias and `gm` the small-signal transconductance at
//! nominal bias. Subtracting `Ip_q` keeps silence exactly silent, and the
//! `gm · G` normalisation keeps the small-signal gain near unity so that
//! drive changes the character rather than the level. The curvature of
//! `E1^1.5` around a low quiescent point is what produces the strong second
//! harmonic.
//!
//! Plate current warms the valve: a 10 s thermal average of `Ip - Ip_q`
//! feeds back onto the bias. An unbypassed cathode resistor tracks the
//! output below ~1.6 Hz; the difference is added back at 0.3 for a lift
//! above DC.
//!
//! ## Transformer
//!
//! Core flux integrates the primary current and leaks by 0.9999 per sample.
//! Flux saturates through `Φsat · tanh(Φ/Φsat)`; the secondary voltage is
//! the flux derivative. Low frequencies build more flux and saturate first.
//! Signed eddy-current (`v|v|`) and copper (`I|I|`) losses are subtracted.
//!
//! ## Linear stages
//!
//! The cable, three fixed core resonances (80 Hz, 3 kHz, 12 kHz) and the
//! four-band passive EQ are biquads at the base rate. Their low corners are
//! poorly conditioned at 350 kHz in single precision, and they generate no
//! harmonics that would need oversampling.
//!
//! Reference: Koren, "Improved VT Models for SPICE Simulations" (1996).

use core::f32::consts::TAU;

use libm::{expf, floorf, powf, sinf, sqrtf, tanhf};
use tonewell_core::{
    AudioBlock, Biquad, BiquadKind, DelayLine, Engine, NoiseGen, OnePole, Oversampler, ParamBank,
    ParamDescriptor, ParamMapping, ParamUnit, SmoothedParam, db_to_linear, flush_denormal,
    lerp, sanitize, wet_dry_mix,
};

use crate::CONTROL_INTERVAL;

/// Internal oversampling factor.
pub const OVERSAMPLING: usize = 8;

/// Fixed plate-to-cathode voltage.
const PLATE_VOLTAGE: f32 = 250.0;

/// Cathode bypass corner in rad/s.
const CATHODE_CORNER: f32 = 10.0;

/// Share of the above-corner difference added back by the cathode bypass.
const CATHODE_LIFT: f32 = 0.3;

/// Thermal time constant in seconds.
const THERMAL_TAU_S: f32 = 10.0;

/// Bias shift per unit of averaged excess current (in input-referred volts).
const THERMAL_FEEDBACK: f32 = 0.05;

/// Transformer flux leak per oversampled sample.
const FLUX_LEAK: f32 = 0.9999;

/// Flux integration reference (rad/s): a 50 Hz sine of amplitude 1 peaks at Φ = 1.
const FLUX_REFERENCE: f32 = TAU * 50.0;

const EDDY_LOSS: f32 = 0.02;
const COPPER_LOSS: f32 = 0.01;

/// Cable inductance in henries for the input loading resonance.
const CABLE_INDUCTANCE: f32 = 4.0;

/// Loading resonance quality factor.
const CABLE_Q: f32 = 1.5;

/// Fixed core resonances: `(freq Hz, Q, gain dB)`.
const CORE_RESONANCES: [(f32, f32, f32); 3] =
    [(80.0, 1.0, 1.0), (3000.0, 2.0, 0.8), (12_000.0, 1.5, 0.6)];

/// Output ceiling: `CEILING · tanh(x / CEILING)`.
const CEILING: f32 = 3.0;

/// Heater hum frequency.
const HUM_HZ: f32 = 60.0;

/// Electrical constants for one valve type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TubeType {
    /// Type designation.
    pub name: &'static str,
    /// Amplification factor.
    pub mu: f32,
    /// Koren exponent for the `kvb` roll-off.
    pub ex: f32,
    /// Koren current scale.
    pub kg1: f32,
    /// Koren plate coefficient.
    pub kp: f32,
    /// Koren knee voltage.
    pub kvb: f32,
    /// Plate resistance in ohms.
    pub rp: f32,
    /// Grid-cathode capacitance in farads.
    pub cgk: f32,
    /// Grid-plate capacitance in farads.
    pub cgp: f32,
    /// Fixed grid bias in volts at the nominal operating point.
    pub grid_bias: f32,
    /// Relative heater hum level.
    pub hum: f32,
    /// Relative shot noise level.
    pub shot: f32,
}

impl TubeType {
    /// Blend two valve types component by component. `t = 0` gives `self`.
    pub fn blend(&self, other: &Self, t: f32) -> Self {
        Self {
            name: if t < 0.5 { self.name } else { other.name },
            mu: lerp(self.mu, other.mu, t),
            ex: lerp(self.ex, other.ex, t),
            kg1: lerp(self.kg1, other.kg1, t),
            kp: lerp(self.kp, other.kp, t),
            kvb: lerp(self.kvb, other.kvb, t),
            rp: lerp(self.rp, other.rp, t),
            cgk: lerp(self.cgk, other.cgk, t),
            cgp: lerp(self.cgp, other.cgp, t),
            grid_bias: lerp(self.grid_bias, other.grid_bias, t),
            hum: lerp(self.hum, other.hum, t),
            shot: lerp(self.shot, other.shot, t),
        }
    }

    /// Valve at a continuous position across [`TUBE_TYPES`] (`0..=9`).
    pub fn morph(position: f32) -> Self {
        let last = TUBE_TYPES.len() - 1;
        let pos = position.clamp(0.0, last as f32);
        let i = floorf(pos) as usize;
        if i >= last {
            return TUBE_TYPES[last];
        }
        TUBE_TYPES[i].blend(&TUBE_TYPES[i + 1], pos - i as f32)
    }

    /// `E1 = Vp/μ + grid_bias` at nominal bias.
    pub fn quiescent_e1(&self) -> f32 {
        PLATE_VOLTAGE / self.mu + self.grid_bias
    }

    /// Corner of the Miller-effect lowpass in Hz: `1 / (2π Cgp Rp)`.
    pub fn miller_corner(&self) -> f32 {
        1.0 / (TAU * self.cgp * self.rp)
    }
}

/// The selectable valves, in parameter order.
pub static TUBE_TYPES: [TubeType; 10] = [
    TubeType {
        name: "12AX7",
        mu: 100.0,
        ex: 1.4,
        kg1: 1060.0,
        kp: 600.0,
        kvb: 300.0,
        rp: 62_500.0,
        cgk: 1.6e-12,
        cgp: 1.7e-12,
        grid_bias: -1.5,
        hum: 1.0,
        shot: 0.5,
    },
    TubeType {
        name: "12AT7",
        mu: 60.0,
        ex: 1.35,
        kg1: 460.0,
        kp: 300.0,
        kvb: 300.0,
        rp: 10_900.0,
        cgk: 2.2e-12,
        cgp: 1.5e-12,
        grid_bias: -2.7,
        hum: 0.8,
        shot: 0.6,
    },
    TubeType {
        name: "12AU7",
        mu: 20.0,
        ex: 1.3,
        kg1: 1180.0,
        kp: 84.0,
        kvb: 300.0,
        rp: 7700.0,
        cgk: 1.6e-12,
        cgp: 1.5e-12,
        grid_bias: -10.0,
        hum: 0.6,
        shot: 0.4,
    },
    TubeType {
        name: "12AY7",
        mu: 44.0,
        ex: 1.35,
        kg1: 1000.0,
        kp: 400.0,
        kvb: 300.0,
        rp: 25_000.0,
        cgk: 1.3e-12,
        cgp: 1.3e-12,
        grid_bias: -4.3,
        hum: 0.7,
        shot: 0.5,
    },
    TubeType {
        name: "5751",
        mu: 70.0,
        ex: 1.4,
        kg1: 1000.0,
        kp: 500.0,
        kvb: 300.0,
        rp: 58_000.0,
        cgk: 1.4e-12,
        cgp: 1.4e-12,
        grid_bias: -2.4,
        hum: 0.5,
        shot: 0.4,
    },
    TubeType {
        name: "12BH7",
        mu: 16.5,
        ex: 1.3,
        kg1: 600.0,
        kp: 60.0,
        kvb: 300.0,
        rp: 5300.0,
        cgk: 3.2e-12,
        cgp: 2.6e-12,
        grid_bias: -12.0,
        hum: 1.2,
        shot: 0.7,
    },
    TubeType {
        name: "6SN7",
        mu: 20.0,
        ex: 1.3,
        kg1: 1550.0,
        kp: 70.0,
        kvb: 300.0,
        rp: 7700.0,
        cgk: 2.4e-12,
        cgp: 3.9e-12,
        grid_bias: -9.5,
        hum: 1.5,
        shot: 0.6,
    },
    TubeType {
        name: "6SL7",
        mu: 70.0,
        ex: 1.4,
        kg1: 1400.0,
        kp: 500.0,
        kvb: 300.0,
        rp: 44_000.0,
        cgk: 3.0e-12,
        cgp: 2.8e-12,
        grid_bias: -2.3,
        hum: 1.4,
        shot: 0.5,
    },
    TubeType {
        name: "ECC88",
        mu: 33.0,
        ex: 1.35,
        kg1: 330.0,
        kp: 320.0,
        kvb: 300.0,
        rp: 2600.0,
        cgk: 3.3e-12,
        cgp: 1.4e-12,
        grid_bias: -5.5,
        hum: 0.4,
        shot: 0.3,
    },
    TubeType {
        name: "6N1P",
        mu: 35.0,
        ex: 1.35,
        kg1: 300.0,
        kp: 320.0,
        kvb: 300.0,
        rp: 3900.0,
        cgk: 3.2e-12,
        cgp: 1.8e-12,
        grid_bias: -5.0,
        hum: 0.9,
        shot: 0.5,
    },
];

/// Parameter table, in index order.
pub static PARAMS: [ParamDescriptor; 12] = [
    ParamDescriptor::new(
        0,
        "Drive",
        "Drive",
        ParamUnit::Percent,
        0.3,
        ParamMapping::PERCENT,
    ),
    ParamDescriptor::new(
        1,
        "Bias",
        "Bias",
        ParamUnit::None,
        0.5,
        ParamMapping::Linear {
            min: -2.5,
            max: 2.5,
        },
    ),
    ParamDescriptor::new(
        2,
        "Tube Type",
        "Tube",
        ParamUnit::Choice,
        0.0,
        ParamMapping::Stepped { count: 10 },
    ),
    // 500 pF default: log10(500 / 100)
    ParamDescriptor::new(
        3,
        "Cable",
        "Cable",
        ParamUnit::None,
        0.698_97,
        ParamMapping::Exponential {
            min: 100.0,
            max: 1000.0,
        },
    ),
    ParamDescriptor::new(
        4,
        "Low Boost",
        "LoBst",
        ParamUnit::Decibels,
        0.0,
        ParamMapping::Linear { min: 0.0, max: 10.0 },
    ),
    ParamDescriptor::new(
        5,
        "Low Atten",
        "LoAtt",
        ParamUnit::Decibels,
        0.0,
        ParamMapping::Linear {
            min: 0.0,
            max: -10.0,
        },
    ),
    ParamDescriptor::new(
        6,
        "High Boost",
        "HiBst",
        ParamUnit::Decibels,
        0.0,
        ParamMapping::Linear { min: 0.0, max: 10.0 },
    ),
    ParamDescriptor::new(
        7,
        "High Atten",
        "HiAtt",
        ParamUnit::Decibels,
        0.0,
        ParamMapping::Linear {
            min: 0.0,
            max: -10.0,
        },
    ),
    ParamDescriptor::new(
        8,
        "Saturation",
        "Sat",
        ParamUnit::Percent,
        0.5,
        ParamMapping::PERCENT,
    ),
    ParamDescriptor::new(
        9,
        "Noise",
        "Noise",
        ParamUnit::Decibels,
        0.0,
        ParamMapping::Linear {
            min: -120.0,
            max: -60.0,
        },
    ),
    ParamDescriptor::output(10, 12.0),
    ParamDescriptor::mix(11, 1.0),
];

/// Per-control-period constants shared by both channels.
#[derive(Debug, Clone, Copy)]
struct OperatingPoint {
    vp_over_mu: f32,
    bias: f32,
    scale: f32,
    kvb: f32,
    ex: f32,
    ip_q: f32,
    inv_gm: f32,
    drive: f32,
    norm: f32,
    cathode_alpha: f32,
    flux_step: f32,
    flux_sat: f32,
}

impl OperatingPoint {
    fn new(tube: &TubeType, bias_offset: f32) -> Self {
        let mut op = Self {
            vp_over_mu: PLATE_VOLTAGE / tube.mu,
            bias: tube.grid_bias + bias_offset,
            scale: tube.kp / tube.kg1,
            kvb: tube.kvb,
            ex: tube.ex,
            ip_q: 0.0,
            inv_gm: 1.0,
            drive: 1.0,
            norm: 1.0,
            cathode_alpha: 0.0,
            flux_step: 1.0,
            flux_sat: 1.0,
        };
        op.ip_q = op.plate_current(op.vp_over_mu + op.bias);

        let e1 = tube.quiescent_e1();
        let h = 0.01;
        let gm = (op.plate_current(e1 + h) - op.plate_current(e1 - h)) / (2.0 * h);
        op.inv_gm = 1.0 / gm.max(1e-6);
        op
    }

    #[inline]
    fn plate_current(&self, e1: f32) -> f32 {
        if e1 <= 0.0 {
            return 0.0;
        }
        let knee = 1.0 / (1.0 + expf(-0.1 * e1));
        self.scale * e1 * sqrtf(e1) / (1.0 + powf(e1 / self.kvb, self.ex)) * knee
    }
}

/// Oversampled state of one channel.
#[derive(Debug, Clone)]
struct Stage {
    miller: OnePole,
    cathode: f32,
    flux: f32,
    sat_prev: f32,
    drift_v: f32,
    excess: f32,
}

impl Stage {
    fn new() -> Self {
        Self {
            miller: OnePole::new(48_000.0 * OVERSAMPLING as f32, 20_000.0),
            cathode: 0.0,
            flux: 0.0,
            sat_prev: 0.0,
            drift_v: 0.0,
            excess: 0.0,
        }
    }

    #[inline]
    fn tick(&mut self, x: f32, op: &OperatingPoint) -> f32 {
        let vsig = self.miller.process(x * op.drive);
        let vgk = vsig + op.bias + self.drift_v;
        let ip = op.plate_current(op.vp_over_mu + vgk);
        let excess = ip - op.ip_q;
        self.excess += excess;

        let out = excess * op.norm;
        let above = out - self.cathode;
        self.cathode = flush_denormal(self.cathode + op.cathode_alpha * above);
        self.transformer(out + CATHODE_LIFT * above, op)
    }

    #[inline]
    fn transformer(&mut self, i: f32, op: &OperatingPoint) -> f32 {
        self.flux = flush_denormal(self.flux * FLUX_LEAK + i * op.flux_step);
        let sat = op.flux_sat * tanhf(self.flux / op.flux_sat);
        let v = (sat - self.sat_prev) / op.flux_step;
        self.sat_prev = flush_denormal(sat);
        v - EDDY_LOSS * v * v.abs() - COPPER_LOSS * i * i.abs()
    }

    fn reset(&mut self) {
        self.miller.reset();
        self.cathode = 0.0;
        self.flux = 0.0;
        self.sat_prev = 0.0;
        self.drift_v = 0.0;
        self.excess = 0.0;
    }
}

/// Everything one channel owns.
#[derive(Debug, Clone)]
struct Channel {
    cable: Biquad,
    oversampler: Oversampler,
    stage: Stage,
    thermal: f32,
    resonances: [Biquad; 3],
    eq: [Biquad; 4],
    dry: DelayLine,
    noise: NoiseGen,
    hum_phase: f32,
}

impl Channel {
    fn new(seed: u32) -> Self {
        Self {
            cable: Biquad::new(),
            oversampler: Oversampler::new(OVERSAMPLING),
            stage: Stage::new(),
            thermal: 0.0,
            resonances: [Biquad::new(), Biquad::new(), Biquad::new()],
            eq: [Biquad::new(), Biquad::new(), Biquad::new(), Biquad::new()],
            dry: DelayLine::new(1),
            noise: NoiseGen::new(seed),
            hum_phase: 0.0,
        }
    }

    fn reset(&mut self) {
        self.cable.reset();
        self.oversampler.reset();
        self.stage.reset();
        self.thermal = 0.0;
        for f in self.resonances.iter_mut().chain(self.eq.iter_mut()) {
            f.reset();
        }
        self.dry.mute();
        self.noise.reseed();
        self.hum_phase = 0.0;
    }

    /// Fold the accumulated excess current into the thermal average.
    fn update_thermal(&mut self, alpha: f32, samples: usize, inv_gm: f32) {
        let mean = self.stage.excess / samples.max(1) as f32;
        self.stage.excess = 0.0;
        self.thermal = flush_denormal(self.thermal + alpha * (mean - self.thermal));
        self.stage.drift_v = -THERMAL_FEEDBACK * self.thermal * inv_gm;
    }

    fn inspect(&self, visit: &mut dyn FnMut(f32)) {
        for f in core::iter::once(&self.cable)
            .chain(self.resonances.iter())
            .chain(self.eq.iter())
        {
            let [a, b] = f.state();
            visit(a);
            visit(b);
        }
        self.oversampler.inspect(visit);
        visit(self.stage.miller.state());
        visit(self.stage.cathode);
        visit(self.stage.flux);
        visit(self.stage.sat_prev);
        visit(self.thermal);
        for &s in self.dry.as_slice() {
            visit(s);
        }
    }
}

/// Per-frame values shared by both channels within one control period.
struct FrameControls {
    drive: [f32; CONTROL_INTERVAL],
    gain: [f32; CONTROL_INTERVAL],
    mix: [f32; CONTROL_INTERVAL],
}

/// Oversampled triode preamp with output transformer and passive EQ.
///
/// ## Parameter Indices
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Drive | 0–100% (`G = 1 + 10·p`) | 30% |
/// | 1 | Bias | −2.5–+2.5 V | 0 V |
/// | 2 | Tube Type | 10 valves, see [`TUBE_TYPES`] | 12AX7 |
/// | 3 | Cable | 100–1000 pF | 500 pF |
/// | 4 | Low Boost | 0–10 dB shelf at 60 Hz | 0 dB |
/// | 5 | Low Atten | 0–−10 dB shelf at 100 Hz | 0 dB |
/// | 6 | High Boost | 0–10 dB peak at 8 kHz | 0 dB |
/// | 7 | High Atten | 0–−10 dB shelf at 10 kHz | 0 dB |
/// | 8 | Saturation | transformer `Φsat = 2 − 1.5·p` | 50% |
/// | 9 | Noise | off, then −120–−60 dB | off |
/// | 10 | Output | −12–+12 dB | 0 dB |
/// | 11 | Mix | 0–100% | 100% |
///
/// The tube type glides continuously between neighbouring valves while
/// the parameter is smoothed.
///
/// # Example
///
/// ```rust
/// use tonewell_core::{AudioBlock, Engine};
/// use tonewell_effects::TubePreamp;
///
/// let mut tube = TubePreamp::new();
/// tube.prepare(48_000.0, 128);
/// assert_eq!(tube.latency_samples(), 222);
///
/// let mut data = [0.0f32; 256];
/// tube.process(&mut AudioBlock::new(&mut data, 2));
/// assert!(data.iter().all(|&s| s == 0.0));
/// ```
#[derive(Debug, Clone)]
pub struct TubePreamp {
    params: ParamBank,
    sample_rate: f32,
    channels: [Channel; 2],
    op: OperatingPoint,
    latency: usize,

    drive: SmoothedParam,
    output: SmoothedParam,
    mix: SmoothedParam,

    bias: SmoothedParam,
    tube: SmoothedParam,
    cable: SmoothedParam,
    low_boost: SmoothedParam,
    low_atten: SmoothedParam,
    high_boost: SmoothedParam,
    high_atten: SmoothedParam,
    saturation: SmoothedParam,
    noise: SmoothedParam,

    // Last values the derived state was built from
    op_key: (u32, u32),
    cable_key: u32,
    eq_key: [u32; 4],
    noise_level: f32,
    hum_coeff: f32,
    shot_coeff: f32,
    snap_pending: bool,
}

impl TubePreamp {
    /// Factory identifier.
    pub const ID: u16 = 2;

    /// Drive.
    pub const DRIVE: usize = 0;
    /// Grid bias offset.
    pub const BIAS: usize = 1;
    /// Valve selection.
    pub const TUBE: usize = 2;
    /// Cable capacitance.
    pub const CABLE: usize = 3;
    /// Low shelf boost.
    pub const LOW_BOOST: usize = 4;
    /// Low shelf cut.
    pub const LOW_ATTEN: usize = 5;
    /// High peak boost.
    pub const HIGH_BOOST: usize = 6;
    /// High shelf cut.
    pub const HIGH_ATTEN: usize = 7;
    /// Transformer saturation.
    pub const SATURATION: usize = 8;
    /// Noise floor.
    pub const NOISE: usize = 9;
    /// Output trim.
    pub const OUTPUT: usize = 10;
    /// Dry/wet mix.
    pub const MIX: usize = 11;

    /// Create a preamp with default parameters.
    pub fn new() -> Self {
        let params = ParamBank::new(&PARAMS);
        let sp = |index| SmoothedParam::new(&params, index);
        let mut tube = Self {
            sample_rate: 48_000.0,
            channels: [Channel::new(0x2545_F491), Channel::new(0x9E37_79B9)],
            op: OperatingPoint::new(&TUBE_TYPES[0], 0.0),
            latency: 0,
            drive: sp(Self::DRIVE),
            output: sp(Self::OUTPUT),
            mix: sp(Self::MIX),
            bias: sp(Self::BIAS),
            tube: sp(Self::TUBE),
            cable: sp(Self::CABLE),
            low_boost: sp(Self::LOW_BOOST),
            low_atten: sp(Self::LOW_ATTEN),
            high_boost: sp(Self::HIGH_BOOST),
            high_atten: sp(Self::HIGH_ATTEN),
            saturation: sp(Self::SATURATION),
            noise: sp(Self::NOISE),
            op_key: (u32::MAX, u32::MAX),
            cable_key: u32::MAX,
            eq_key: [u32::MAX; 4],
            noise_level: 0.0,
            hum_coeff: 0.0,
            shot_coeff: 0.0,
            snap_pending: true,
            params,
        };
        tube.prepare(48_000.0, 512);
        tube
    }

    /// Oversampling factor in effect after `prepare`.
    pub fn oversampling(&self) -> usize {
        self.channels[0].oversampler.factor()
    }

    fn smoothed(&mut self) -> [&mut SmoothedParam; 12] {
        [
            &mut self.drive,
            &mut self.output,
            &mut self.mix,
            &mut self.bias,
            &mut self.tube,
            &mut self.cable,
            &mut self.low_boost,
            &mut self.low_atten,
            &mut self.high_boost,
            &mut self.high_atten,
            &mut self.saturation,
            &mut self.noise,
        ]
    }

    fn internal_rate(&self) -> f32 {
        self.sample_rate * self.oversampling() as f32
    }

    /// Rebuild everything derived from control-rate parameters that moved.
    fn refresh_derived(&mut self) {
        let tube_pos = self.tube.get() * (TUBE_TYPES.len() - 1) as f32;
        let bias = PARAMS[Self::BIAS].to_physical(self.bias.get());
        let key = (tube_pos.to_bits(), bias.to_bits());
        if key != self.op_key {
            self.op_key = key;
            let valve = TubeType::morph(tube_pos);
            let rate = self.internal_rate();
            let (cathode_alpha, flux_step, flux_sat) =
                (self.op.cathode_alpha, self.op.flux_step, self.op.flux_sat);
            self.op = OperatingPoint::new(&valve, bias);
            self.op.cathode_alpha = cathode_alpha;
            self.op.flux_step = flux_step;
            self.op.flux_sat = flux_sat;
            let miller = valve.miller_corner();
            for ch in &mut self.channels {
                ch.stage.miller.set_sample_rate(rate);
                ch.stage.miller.set_frequency(miller);
            }
            self.hum_coeff = valve.hum;
            self.shot_coeff = valve.shot;
        }

        self.op.flux_sat = 2.0 - 1.5 * self.saturation.get();

        let cable = self.cable.get();
        if cable.to_bits() != self.cable_key {
            self.cable_key = cable.to_bits();
            let farads = PARAMS[Self::CABLE].to_physical(cable) * 1e-12;
            let f0 = 1.0 / (TAU * sqrtf(CABLE_INDUCTANCE * farads));
            let f0 = f0.min(0.45 * self.sample_rate);
            for ch in &mut self.channels {
                ch.cable.design(BiquadKind::Lowpass, f0, CABLE_Q, 0.0, self.sample_rate);
            }
        }

        let eq = [
            PARAMS[Self::LOW_BOOST].to_physical(self.low_boost.get()),
            PARAMS[Self::LOW_ATTEN].to_physical(self.low_atten.get()),
            PARAMS[Self::HIGH_BOOST].to_physical(self.high_boost.get()),
            PARAMS[Self::HIGH_ATTEN].to_physical(self.high_atten.get()),
        ];
        let eq_key = eq.map(f32::to_bits);
        if eq_key != self.eq_key {
            self.eq_key = eq_key;
            let sr = self.sample_rate;
            let bands: [(BiquadKind, f32, f32); 4] = [
                (BiquadKind::LowShelf, 60.0, 0.7),
                (BiquadKind::LowShelf, 100.0, 0.7),
                (BiquadKind::Peak, 8000.0, 0.8),
                (BiquadKind::HighShelf, 10_000.0, 0.7),
            ];
            for ch in &mut self.channels {
                for (filter, (&(kind, freq, q), &gain)) in
                    ch.eq.iter_mut().zip(bands.iter().zip(eq.iter()))
                {
                    filter.design(kind, freq.min(0.45 * sr), q, gain, sr);
                }
            }
        }

        let noise = self.noise.get();
        self.noise_level = if noise > 0.0 {
            db_to_linear(PARAMS[Self::NOISE].to_physical(noise))
        } else {
            0.0
        };
    }

    /// Advance control-rate parameters by `n` frames and refresh.
    fn update_control(&mut self, n: usize) {
        for p in [
            &mut self.bias,
            &mut self.tube,
            &mut self.cable,
            &mut self.low_boost,
            &mut self.low_atten,
            &mut self.high_boost,
            &mut self.high_atten,
            &mut self.saturation,
            &mut self.noise,
        ] {
            p.skip(n);
        }
        self.refresh_derived();
    }

    fn fill_frame_controls(&mut self, n: usize) -> FrameControls {
        let mut fc = FrameControls {
            drive: [1.0; CONTROL_INTERVAL],
            gain: [1.0; CONTROL_INTERVAL],
            mix: [1.0; CONTROL_INTERVAL],
        };
        for i in 0..n {
            fc.drive[i] = 1.0 + 10.0 * self.drive.next();
            fc.gain[i] = db_to_linear(PARAMS[Self::OUTPUT].to_physical(self.output.next()));
            fc.mix[i] = self.mix.next();
        }
        fc
    }

    fn run_channel(&mut self, ch: usize, samples: &mut [f32], fc: &FrameControls) {
        let latency = self.latency;
        let hum_step = HUM_HZ / self.sample_rate;
        let (noise_level, hum_coeff, shot_coeff) =
            (self.noise_level, self.hum_coeff, self.shot_coeff);
        let mut op = self.op;
        let channel = &mut self.channels[ch];

        for (i, s) in samples.iter_mut().enumerate() {
            let x = *s;
            channel.dry.write(x);
            let dry = channel.dry.read_int(latency);

            op.drive = fc.drive[i];
            op.norm = op.inv_gm / op.drive;
            let pre = channel.cable.process(x);
            let stage = &mut channel.stage;
            let mut y = channel.oversampler.process_sample(pre, |v| stage.tick(v, &op));

            if noise_level > 0.0 {
                channel.hum_phase += hum_step;
                if channel.hum_phase >= 1.0 {
                    channel.hum_phase -= 1.0;
                }
                let hum = hum_coeff * sinf(TAU * channel.hum_phase);
                let shot = shot_coeff * sqrtf(y.abs()) * channel.noise.next_bipolar();
                let thermal = channel.noise.next_bipolar();
                y += noise_level * (hum + shot + thermal);
            }

            for f in channel.resonances.iter_mut().chain(channel.eq.iter_mut()) {
                y = f.process(y);
            }
            let wet = CEILING * tanhf(y * fc.gain[i] / CEILING);
            *s = sanitize(wet_dry_mix(dry, wet, fc.mix[i]));
        }
    }
}

impl Default for TubePreamp {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for TubePreamp {
    fn name(&self) -> &'static str {
        "Tube Preamp"
    }

    fn engine_id(&self) -> u16 {
        Self::ID
    }

    fn prepare(&mut self, sample_rate: f32, _max_block_size: usize) {
        self.sample_rate = sample_rate.max(1.0);
        for ch in &mut self.channels {
            ch.oversampler.prepare(self.sample_rate);
        }
        self.latency = self.channels[0].oversampler.latency_samples();
        let rate = self.internal_rate();
        let sr = self.sample_rate;
        for ch in &mut self.channels {
            ch.dry.resize(self.latency + 1);
            for (f, &(freq, q, gain)) in ch.resonances.iter_mut().zip(CORE_RESONANCES.iter()) {
                f.design(BiquadKind::Peak, freq.min(0.45 * sr), q, gain, sr);
            }
        }
        self.op.cathode_alpha = 1.0 - expf(-CATHODE_CORNER / rate);
        self.op.flux_step = FLUX_REFERENCE / rate;

        for p in self.smoothed() {
            p.prepare(sr);
        }
        // force every derived coefficient to be rebuilt at the new rate
        self.op_key = (u32::MAX, u32::MAX);
        self.cable_key = u32::MAX;
        self.eq_key = [u32::MAX; 4];
        self.reset();
        self.snap_parameters();
        self.snap_pending = true;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            sample_rate,
            oversampling = self.oversampling(),
            latency = self.latency,
            "tube preamp prepared"
        );
    }

    fn process(&mut self, block: &mut AudioBlock<'_>) {
        if core::mem::take(&mut self.snap_pending) {
            self.snap_parameters();
        }
        let frames = block.frames();
        let channels = block.channels().min(2);
        let factor = self.oversampling();
        let mut start = 0;
        while start < frames {
            let n = (frames - start).min(CONTROL_INTERVAL);
            self.update_control(n);
            let fc = self.fill_frame_controls(n);
            for ch in 0..channels {
                self.run_channel(ch, &mut block.channel_mut(ch)[start..start + n], &fc);
            }
            let alpha = 1.0 - expf(-(n as f32) / (THERMAL_TAU_S * self.sample_rate));
            let inv_gm = self.op.inv_gm;
            for ch in &mut self.channels[..channels] {
                ch.update_thermal(alpha, n * factor, inv_gm);
            }
            start += n;
        }
    }

    fn reset(&mut self) {
        for ch in &mut self.channels {
            ch.reset();
        }
    }

    fn latency_samples(&self) -> usize {
        self.latency
    }

    fn params(&self) -> &ParamBank {
        &self.params
    }

    fn snap_parameters(&mut self) {
        for p in self.smoothed() {
            p.snap();
        }
        self.refresh_derived();
    }

    fn inspect_state(&self, visit: &mut dyn FnMut(f32)) {
        for ch in &self.channels {
            ch.inspect(visit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    const SR: f32 = 48_000.0;

    fn sine(freq: f32, amp: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amp * sinf(TAU * freq * i as f32 / SR))
            .collect()
    }

    fn run_mono(tube: &mut TubePreamp, input: &[f32]) -> Vec<f32> {
        let mut out = input.to_vec();
        for chunk in out.chunks_mut(256) {
            tube.process(&mut AudioBlock::new(chunk, 1));
        }
        out
    }

    #[test]
    fn test_table_has_positive_quiescent_points() {
        assert_eq!(TUBE_TYPES.len(), 10);
        for t in &TUBE_TYPES {
            assert!(t.quiescent_e1() > 0.5, "{}: {}", t.name, t.quiescent_e1());
            assert!(t.miller_corner() > 1000.0, "{}", t.name);
        }
        for (i, a) in TUBE_TYPES.iter().enumerate() {
            assert!(TUBE_TYPES[i + 1..].iter().all(|b| b.name != a.name));
        }
    }

    #[test]
    fn test_miller_corner_follows_plate_capacitance() {
        // 12AX7: 1 / (2π · 1.7 pF · 62.5 kΩ)
        let corner = TUBE_TYPES[0].miller_corner();
        assert!((corner - 1_497_929.0).abs() < 1e-3 * 1_497_929.0, "{corner}");

        let mut doubled = TUBE_TYPES[0];
        doubled.cgp *= 2.0;
        assert!((doubled.miller_corner() - 0.5 * corner).abs() < 1e-3 * corner);

        let mut heavier_grid = TUBE_TYPES[0];
        heavier_grid.cgk *= 10.0;
        heavier_grid.mu *= 2.0;
        assert_eq!(heavier_grid.miller_corner(), corner);
    }

    #[test]
    fn test_morph_endpoints() {
        assert_eq!(TubeType::morph(0.0), TUBE_TYPES[0]);
        assert_eq!(TubeType::morph(9.0), TUBE_TYPES[9]);
        assert_eq!(TubeType::morph(3.0), TUBE_TYPES[3]);
        let mid = TubeType::morph(0.5);
        assert!(mid.mu < TUBE_TYPES[0].mu && mid.mu > TUBE_TYPES[1].mu);
    }

    #[test]
    fn test_silence_is_exactly_silent() {
        let mut tube = TubePreamp::new();
        tube.update_parameters(&[(TubePreamp::DRIVE, 1.0), (TubePreamp::BIAS, 0.8)]);
        tube.prepare(SR, 256);
        let out = run_mono(&mut tube, &vec![0.0; 4096]);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_latency_follows_rate() {
        let mut tube = TubePreamp::new();
        tube.prepare(44_100.0, 64);
        assert_eq!(tube.oversampling(), 8);
        assert_eq!(tube.latency_samples(), 222);
        tube.prepare(192_000.0, 64);
        assert_eq!(tube.oversampling(), 4);
        assert_eq!(tube.latency_samples(), 191);
    }

    #[test]
    fn test_dry_is_latency_aligned() {
        let mut tube = TubePreamp::new();
        tube.update_parameters(&[(TubePreamp::MIX, 0.0)]);
        tube.prepare(SR, 256);
        let input = sine(440.0, 0.5, 2048);
        let out = run_mono(&mut tube, &input);
        let lat = tube.latency_samples();
        for n in lat..input.len() {
            assert!((out[n] - input[n - lat]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_drive_makes_waveform_asymmetric() {
        let mut tube = TubePreamp::new();
        tube.update_parameters(&[(TubePreamp::DRIVE, 0.7)]);
        tube.prepare(SR, 256);
        let out = run_mono(&mut tube, &sine(220.0, 0.3, 9600));
        let tail = &out[4800..];
        let max = tail.iter().copied().fold(f32::MIN, f32::max);
        let min = tail.iter().copied().fold(f32::MAX, f32::min);
        assert!(max > 0.05 && min < -0.05);
        assert!((max + min).abs() > 0.05 * (max - min), "max {max} min {min}");
    }

    #[test]
    fn test_cathode_corner_is_ten_radians_per_second() {
        let mut tube = TubePreamp::new();
        tube.prepare(SR, 256);
        let rate = SR * OVERSAMPLING as f32;
        let expected = 1.0 - expf(-10.0 / rate);
        assert!((tube.op.cathode_alpha - expected).abs() < 1e-9);
        assert!(tube.op.cathode_alpha > 2.5e-5 && tube.op.cathode_alpha < 2.7e-5);
    }

    #[test]
    fn test_output_ceiling() {
        let mut tube = TubePreamp::new();
        tube.update_parameters(&[
            (TubePreamp::DRIVE, 1.0),
            (TubePreamp::OUTPUT, 1.0),
            (TubePreamp::LOW_BOOST, 1.0),
            (TubePreamp::HIGH_BOOST, 1.0),
        ]);
        tube.prepare(SR, 256);
        let out = run_mono(&mut tube, &sine(100.0, 1.0, 4800));
        assert!(out.iter().all(|s| s.abs() <= CEILING));
    }

    #[test]
    fn test_noise_is_off_by_default() {
        let mut tube = TubePreamp::new();
        tube.prepare(SR, 256);
        assert_eq!(tube.noise_level, 0.0);
        tube.update_parameters(&[(TubePreamp::NOISE, 1.0)]);
        tube.snap_parameters();
        assert!((tube.noise_level - 1e-3).abs() < 1e-5);
        let out = run_mono(&mut tube, &vec![0.0; 2048]);
        let peak = out.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.0 && peak < 0.05);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut tube = TubePreamp::new();
        tube.prepare(SR, 256);
        run_mono(&mut tube, &sine(1000.0, 0.8, 2048));
        tube.reset();
        let mut nonzero = 0;
        tube.inspect_state(&mut |s| {
            if s != 0.0 {
                nonzero += 1;
            }
        });
        assert_eq!(nonzero, 0);
    }
}
