//! Bit-depth and sample-rate reduction.
//!
//! Each channel runs a zero-order hold clocked at `fs · (0.1 + 0.9·rate)`.
//! Whenever the hold captures a new sample it is quantized to `bits` of
//! resolution:
//!
//! ```text
//! L = 2^(bits - 1)
//! y = clamp(floor(x·L + 0.5), -L, L - 1) / L
//! ```
//!
//! so the output lives on the grid `k · 2/2^bits` with exactly `2^bits`
//! levels. Optional TPDF dither of ±q/2 is added before rounding.
//!
//! The crusher runs at the base rate by default, which keeps the output on
//! the quantization grid. [`BitCrusher::with_oversampling`] moves the hold
//! and quantizer into an oversampled domain for a cleaner (band-limited)
//! rendition, at the cost of grid-exact levels and some latency.

use libm::floorf;
use tonewell_core::{
    AudioBlock, DelayLine, Engine, NoiseGen, Oversampler, ParamBank, ParamDescriptor,
    ParamMapping, ParamUnit, SmoothedParam, db_to_linear, wet_dry_mix,
};

use crate::CONTROL_INTERVAL;

/// Parameter table, in index order.
pub static PARAMS: [ParamDescriptor; 5] = [
    ParamDescriptor::new(
        0,
        "Bits",
        "Bits",
        ParamUnit::Bits,
        0.5,
        ParamMapping::Linear {
            min: 2.0,
            max: 16.0,
        },
    ),
    ParamDescriptor::new(
        1,
        "Rate",
        "Rate",
        ParamUnit::Percent,
        1.0,
        ParamMapping::Linear {
            min: 10.0,
            max: 100.0,
        },
    ),
    ParamDescriptor::new(
        2,
        "Dither",
        "Dith",
        ParamUnit::Percent,
        0.0,
        ParamMapping::PERCENT,
    ),
    ParamDescriptor::output(3, 12.0),
    ParamDescriptor::mix(4, 1.0),
];

/// Round `x` to the nearest of `2·levels` steps spanning `[-1, 1)`.
///
/// `levels` is `2^(bits - 1)`.
///
/// # Example
///
/// ```rust
/// use tonewell_effects::bitcrusher::quantize;
///
/// assert_eq!(quantize(0.3, 4.0), 0.25);
/// assert_eq!(quantize(1.0, 4.0), 0.75);
/// assert_eq!(quantize(-1.0, 4.0), -1.0);
/// ```
#[inline]
pub fn quantize(x: f32, levels: f32) -> f32 {
    floorf(x * levels + 0.5).clamp(-levels, levels - 1.0) / levels
}

#[derive(Debug, Clone)]
struct Channel {
    oversampler: Oversampler,
    dry: DelayLine,
    held: f32,
    phase: f32,
    noise: NoiseGen,
}

impl Channel {
    fn new(factor: usize, seed: u32) -> Self {
        Self {
            oversampler: Oversampler::new(factor),
            dry: DelayLine::new(1),
            held: 0.0,
            phase: 1.0,
            noise: NoiseGen::new(seed),
        }
    }

    fn reset(&mut self) {
        self.oversampler.reset();
        self.dry.mute();
        self.held = 0.0;
        self.phase = 1.0;
        self.noise.reseed();
    }

    #[inline]
    fn crush(&mut self, x: f32, q: &Quantizer) -> f32 {
        let Self {
            oversampler,
            held,
            phase,
            noise,
            ..
        } = self;
        oversampler.process_sample(x, |v| {
            if *phase >= 1.0 {
                *phase -= 1.0;
                let dither = if q.dither > 0.0 {
                    noise.next_tpdf() * q.dither * 0.5 / q.levels
                } else {
                    0.0
                };
                *held = quantize(v + dither, q.levels);
            }
            *phase += q.step;
            *held
        })
    }
}

/// Control-rate quantizer settings.
#[derive(Debug, Clone, Copy)]
struct Quantizer {
    levels: f32,
    step: f32,
    dither: f32,
}

/// Bit crusher with zero-order-hold rate reduction.
///
/// ## Parameter Indices
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Bits | 2–16, rounded to whole bits | 9 |
/// | 1 | Rate | 10–100% of the host rate | 100% |
/// | 2 | Dither | 0–100% of ±q/2 TPDF | 0% |
/// | 3 | Output | −12–+12 dB | 0 dB |
/// | 4 | Mix | 0–100% | 100% |
#[derive(Debug, Clone)]
pub struct BitCrusher {
    params: ParamBank,
    sample_rate: f32,
    channels: [Channel; 2],
    latency: usize,

    bits: SmoothedParam,
    rate: SmoothedParam,
    dither: SmoothedParam,
    output: SmoothedParam,
    mix: SmoothedParam,

    quantizer: Quantizer,
    snap_pending: bool,
}

impl BitCrusher {
    /// Factory identifier.
    pub const ID: u16 = 4;

    /// Bit depth.
    pub const BITS: usize = 0;
    /// Hold rate as a fraction of the host rate.
    pub const RATE: usize = 1;
    /// Dither amount.
    pub const DITHER: usize = 2;
    /// Output trim.
    pub const OUTPUT: usize = 3;
    /// Dry/wet mix.
    pub const MIX: usize = 4;

    /// Create a crusher running at the host rate.
    pub fn new() -> Self {
        Self::with_oversampling(1)
    }

    /// Create a crusher whose hold and quantizer run `factor`× oversampled.
    pub fn with_oversampling(factor: usize) -> Self {
        let params = ParamBank::new(&PARAMS);
        let sp = |index| SmoothedParam::new(&params, index);
        let mut crusher = Self {
            sample_rate: 48_000.0,
            channels: [
                Channel::new(factor, 0x6C07_8965),
                Channel::new(factor, 0x2F6B_4A1D),
            ],
            latency: 0,
            bits: sp(Self::BITS),
            rate: sp(Self::RATE),
            dither: sp(Self::DITHER),
            output: sp(Self::OUTPUT),
            mix: sp(Self::MIX),
            quantizer: Quantizer {
                levels: 256.0,
                step: 1.0,
                dither: 0.0,
            },
            snap_pending: true,
            params,
        };
        crusher.prepare(48_000.0, 512);
        crusher
    }

    /// Oversampling factor in effect.
    pub fn oversampling(&self) -> usize {
        self.channels[0].oversampler.factor()
    }

    /// Whole bit depth currently applied.
    pub fn bit_depth(&self) -> u32 {
        libm::roundf(PARAMS[Self::BITS].to_physical(self.bits.get())) as u32
    }

    fn smoothed(&mut self) -> [&mut SmoothedParam; 5] {
        [
            &mut self.bits,
            &mut self.rate,
            &mut self.dither,
            &mut self.output,
            &mut self.mix,
        ]
    }

    fn apply_control(&mut self) {
        let bits = self.bit_depth().clamp(2, 16);
        let fraction = PARAMS[Self::RATE].to_physical(self.rate.get()) / 100.0;
        self.quantizer = Quantizer {
            levels: (1u32 << (bits - 1)) as f32,
            step: fraction / self.oversampling() as f32,
            dither: self.dither.get(),
        };
    }

    fn update_control(&mut self, n: usize) {
        self.bits.skip(n);
        self.rate.skip(n);
        self.dither.skip(n);
        self.apply_control();
    }

    #[inline]
    fn tick(&mut self, l: f32, r: f32) -> (f32, f32) {
        let gain = db_to_linear(PARAMS[Self::OUTPUT].to_physical(self.output.next()));
        let mix = self.mix.next();
        let q = self.quantizer;
        let latency = self.latency;
        let run = |ch: &mut Channel, x: f32| {
            ch.dry.write(x);
            let dry = ch.dry.read_int(latency);
            wet_dry_mix(dry, ch.crush(x, &q) * gain, mix)
        };
        let [left, right] = &mut self.channels;
        (run(left, l), run(right, r))
    }
}

impl Default for BitCrusher {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for BitCrusher {
    fn name(&self) -> &'static str {
        "Bit Crusher"
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
        for ch in &mut self.channels {
            ch.dry.resize(self.latency + 1);
            ch.reset();
        }
        let sr = self.sample_rate;
        for p in self.smoothed() {
            p.prepare(sr);
        }
        self.apply_control();
        self.snap_pending = true;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            sample_rate,
            oversampling = self.oversampling(),
            latency = self.latency,
            "bit crusher prepared"
        );
    }

    fn process(&mut self, block: &mut AudioBlock<'_>) {
        if core::mem::take(&mut self.snap_pending) {
            self.snap_parameters();
        }
        let frames = block.frames();
        let mut start = 0;
        while start < frames {
            let n = (frames - start).min(CONTROL_INTERVAL);
            self.update_control(n);
            block.process_stereo_range(start..start + n, |l, r| self.tick(l, r));
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
        self.apply_control();
    }

    fn inspect_state(&self, visit: &mut dyn FnMut(f32)) {
        for ch in &self.channels {
            ch.oversampler.inspect(visit);
            visit(ch.held);
            for &s in ch.dry.as_slice() {
                visit(s);
            }
        }
    }
}
