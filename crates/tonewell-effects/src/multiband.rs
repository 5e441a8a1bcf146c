//! Three-band saturator.
//!
//! Two Linkwitz-Riley crossovers split the signal into low, mid and high
//! bands, each band is driven into its own waveshaper, and the bands are
//! summed back:
//!
//! ```text
//!        ┌─ LP4(f_lo) ─────────────── shape_lo ─┐
//! in ─ xo┤            ┌─ LP4(f_hi) ─ shape_mid ─┼─ Σ ─ output ─ mix
//!        └─ x - LP4 ─ ┤                         │
//!                     └─ rest - LP4 ─ shape_hi ─┘
//! ```
//!
//! The highpass side of each split is the complement `x - LP4(x)`, so the
//! three bands sum back to the input up to rounding. With every drive at
//! zero the saturator is transparent.
//!
//! Per band, `y = lerp(x, shape((1 + 9·drive) · x), drive)`. The shape
//! parameter glides through tanh, cubic soft clip, asymmetric tube curve and
//! a unit-threshold folder.

use tonewell_core::{
    AudioBlock, Engine, Lr4, ParamBank, ParamDescriptor, ParamMapping, ParamUnit, SmoothedParam,
    cubic_clip, db_to_linear, fold, lerp, soft_clip, tube_curve, wet_dry_mix,
};

use crate::CONTROL_INTERVAL;

/// Number of selectable band shapes.
pub const SHAPE_COUNT: usize = 4;

/// Band waveshaper `index`: tanh, cubic, tube, fold.
#[inline]
pub fn shape(index: usize, x: f32) -> f32 {
    match index {
        0 => soft_clip(x),
        1 => cubic_clip(x),
        2 => tube_curve(x),
        _ => fold(x, 1.0),
    }
}

/// Shape at a continuous position in `0..=3`, blending neighbours.
#[inline]
pub fn shape_at(position: f32, x: f32) -> f32 {
    let last = (SHAPE_COUNT - 1) as f32;
    let pos = position.clamp(0.0, last);
    let i = pos as usize;
    let frac = pos - i as f32;
    if frac == 0.0 || i + 1 >= SHAPE_COUNT {
        shape(i, x)
    } else {
        lerp(shape(i, x), shape(i + 1, x), frac)
    }
}

/// Parameter table, in index order.
pub static PARAMS: [ParamDescriptor; 10] = [
    ParamDescriptor::new(
        0,
        "Low Crossover",
        "LoX",
        ParamUnit::Hertz,
        0.5,
        ParamMapping::Exponential {
            min: 40.0,
            max: 1000.0,
        },
    ),
    ParamDescriptor::new(
        1,
        "High Crossover",
        "HiX",
        ParamUnit::Hertz,
        0.5,
        ParamMapping::Exponential {
            min: 1000.0,
            max: 12_000.0,
        },
    ),
    ParamDescriptor::new(
        2,
        "Low Drive",
        "LoDrv",
        ParamUnit::Percent,
        0.3,
        ParamMapping::PERCENT,
    ),
    ParamDescriptor::new(
        3,
        "Mid Drive",
        "MidDrv",
        ParamUnit::Percent,
        0.3,
        ParamMapping::PERCENT,
    ),
    ParamDescriptor::new(
        4,
        "High Drive",
        "HiDrv",
        ParamUnit::Percent,
        0.3,
        ParamMapping::PERCENT,
    ),
    ParamDescriptor::new(
        5,
        "Low Shape",
        "LoShp",
        ParamUnit::Choice,
        0.0,
        ParamMapping::Stepped { count: 4 },
    ),
    ParamDescriptor::new(
        6,
        "Mid Shape",
        "MidShp",
        ParamUnit::Choice,
        0.0,
        ParamMapping::Stepped { count: 4 },
    ),
    ParamDescriptor::new(
        7,
        "High Shape",
        "HiShp",
        ParamUnit::Choice,
        0.0,
        ParamMapping::Stepped { count: 4 },
    ),
    ParamDescriptor::output(8, 12.0),
    ParamDescriptor::mix(9, 1.0),
];

/// Crossover pair for one channel.
#[derive(Debug, Clone)]
struct Splitter {
    low: Lr4,
    high: Lr4,
}

impl Splitter {
    fn new(sample_rate: f32) -> Self {
        Self {
            low: Lr4::new(200.0, sample_rate),
            high: Lr4::new(3464.0, sample_rate),
        }
    }

    #[inline]
    fn split(&mut self, x: f32) -> [f32; 3] {
        let (low, rest) = self.low.split_complementary(x);
        let (mid, high) = self.high.split_complementary(rest);
        [low, mid, high]
    }
}

/// Three-band LR4 saturator.
///
/// ## Parameter Indices
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Low Crossover | 40–1000 Hz | 200 Hz |
/// | 1 | High Crossover | 1–12 kHz, at least twice the low crossover | 3.46 kHz |
/// | 2–4 | Low/Mid/High Drive | 0–100% | 30% |
/// | 5–7 | Low/Mid/High Shape | tanh, cubic, tube, fold | tanh |
/// | 8 | Output | −12–+12 dB | 0 dB |
/// | 9 | Mix | 0–100% | 100% |
#[derive(Debug, Clone)]
pub struct MultibandSaturator {
    params: ParamBank,
    sample_rate: f32,
    splitters: [Splitter; 2],

    low_freq: SmoothedParam,
    high_freq: SmoothedParam,
    drives: [SmoothedParam; 3],
    shapes: [SmoothedParam; 3],
    output: SmoothedParam,
    mix: SmoothedParam,

    shape_pos: [f32; 3],
    snap_pending: bool,
}

impl MultibandSaturator {
    /// Factory identifier.
    pub const ID: u16 = 3;

    /// Low/mid crossover.
    pub const LOW_FREQ: usize = 0;
    /// Mid/high crossover.
    pub const HIGH_FREQ: usize = 1;
    /// Low band drive.
    pub const LOW_DRIVE: usize = 2;
    /// Mid band drive.
    pub const MID_DRIVE: usize = 3;
    /// High band drive.
    pub const HIGH_DRIVE: usize = 4;
    /// Low band shape.
    pub const LOW_SHAPE: usize = 5;
    /// Mid band shape.
    pub const MID_SHAPE: usize = 6;
    /// High band shape.
    pub const HIGH_SHAPE: usize = 7;
    /// Output trim.
    pub const OUTPUT: usize = 8;
    /// Dry/wet mix.
    pub const MIX: usize = 9;

    /// Create a saturator with default parameters.
    pub fn new() -> Self {
        let params = ParamBank::new(&PARAMS);
        let sp = |index| SmoothedParam::new(&params, index);
        let mut sat = Self {
            sample_rate: 48_000.0,
            splitters: [Splitter::new(48_000.0), Splitter::new(48_000.0)],
            low_freq: sp(Self::LOW_FREQ),
            high_freq: sp(Self::HIGH_FREQ),
            drives: [
                sp(Self::LOW_DRIVE),
                sp(Self::MID_DRIVE),
                sp(Self::HIGH_DRIVE),
            ],
            shapes: [
                sp(Self::LOW_SHAPE),
                sp(Self::MID_SHAPE),
                sp(Self::HIGH_SHAPE),
            ],
            output: sp(Self::OUTPUT),
            mix: sp(Self::MIX),
            shape_pos: [0.0; 3],
            snap_pending: true,
            params,
        };
        sat.apply_control();
        sat
    }

    /// Current crossover frequencies `(low, high)` in Hz.
    pub fn crossovers(&self) -> (f32, f32) {
        (
            self.splitters[0].low.frequency(),
            self.splitters[0].high.frequency(),
        )
    }

    fn all_params(&mut self) -> [&mut SmoothedParam; 10] {
        let [d0, d1, d2] = &mut self.drives;
        let [s0, s1, s2] = &mut self.shapes;
        [
            &mut self.low_freq,
            &mut self.high_freq,
            d0,
            d1,
            d2,
            s0,
            s1,
            s2,
            &mut self.output,
            &mut self.mix,
        ]
    }

    fn apply_control(&mut self) {
        let nyquist_guard = 0.45 * self.sample_rate;
        let low = PARAMS[Self::LOW_FREQ]
            .to_physical(self.low_freq.get())
            .min(nyquist_guard);
        let high = PARAMS[Self::HIGH_FREQ]
            .to_physical(self.high_freq.get())
            .max(2.0 * low)
            .min(nyquist_guard);
        for s in &mut self.splitters {
            s.low.set_frequency(low);
            s.high.set_frequency(high);
        }
        let last = (SHAPE_COUNT - 1) as f32;
        for (pos, p) in self.shape_pos.iter_mut().zip(&self.shapes) {
            *pos = p.get() * last;
        }
    }

    fn update_control(&mut self, n: usize) {
        self.low_freq.skip(n);
        self.high_freq.skip(n);
        for p in &mut self.shapes {
            p.skip(n);
        }
        self.apply_control();
    }

    #[inline]
    fn tick(&mut self, l: f32, r: f32) -> (f32, f32) {
        let drives = [
            self.drives[0].next(),
            self.drives[1].next(),
            self.drives[2].next(),
        ];
        let gain = db_to_linear(PARAMS[Self::OUTPUT].to_physical(self.output.next()));
        let mix = self.mix.next();
        let shape_pos = self.shape_pos;

        let band = |splitter: &mut Splitter, x: f32| {
            let bands = splitter.split(x);
            let mut sum = 0.0;
            for ((&b, &drive), &pos) in bands.iter().zip(&drives).zip(&shape_pos) {
                sum += lerp(b, shape_at(pos, (1.0 + 9.0 * drive) * b), drive);
            }
            wet_dry_mix(x, sum * gain, mix)
        };
        let [left, right] = &mut self.splitters;
        (band(left, l), band(right, r))
    }
}

impl Default for MultibandSaturator {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for MultibandSaturator {
    fn name(&self) -> &'static str {
        "Multiband Saturator"
    }

    fn engine_id(&self) -> u16 {
        Self::ID
    }

    fn prepare(&mut self, sample_rate: f32, _max_block_size: usize) {
        self.sample_rate = sample_rate.max(1.0);
        let sr = self.sample_rate;
        for s in &mut self.splitters {
            s.low.set_sample_rate(sr);
            s.high.set_sample_rate(sr);
            s.low.reset();
            s.high.reset();
        }
        for p in self.all_params() {
            p.prepare(sr);
        }
        self.apply_control();
        self.snap_pending = true;

        #[cfg(feature = "tracing")]
        tracing::debug!(sample_rate, "multiband saturator prepared");
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
        for s in &mut self.splitters {
            s.low.reset();
            s.high.reset();
        }
    }

    fn params(&self) -> &ParamBank {
        &self.params
    }

    fn snap_parameters(&mut self) {
        for p in self.all_params() {
            p.snap();
        }
        self.apply_control();
    }

    fn inspect_state(&self, visit: &mut dyn FnMut(f32)) {
        for s in &self.splitters {
            s.low.inspect(visit);
            s.high.inspect(visit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    const SR: f32 = 48_000.0;

    fn run_stereo(e: &mut MultibandSaturator, input: &[f32]) -> Vec<f32> {
        let mut out = Vec::with_capacity(input.len());
        for chunk in input.chunks(128) {
            let mut data = vec![0.0; chunk.len() * 2];
            data[..chunk.len()].copy_from_slice(chunk);
            data[chunk.len()..].copy_from_slice(chunk);
            e.process(&mut AudioBlock::new(&mut data, 2));
            out.extend_from_slice(&data[..chunk.len()]);
        }
        out
    }

    fn noise(len: usize) -> Vec<f32> {
        let mut g = tonewell_core::NoiseGen::new(7);
        (0..len).map(|_| 0.5 * g.next_bipolar()).collect()
    }

    #[test]
    fn test_zero_drive_reconstructs_input() {
        let mut e = MultibandSaturator::new();
        e.prepare(SR, 128);
        e.update_parameters(&[
            (MultibandSaturator::LOW_DRIVE, 0.0),
            (MultibandSaturator::MID_DRIVE, 0.0),
            (MultibandSaturator::HIGH_DRIVE, 0.0),
        ]);
        let input = noise(4096);
        let out = run_stereo(&mut e, &input);
        for (a, b) in input.iter().zip(&out) {
            assert!((a - b).abs() < 1e-5, "{a} vs {b}");
        }
    }

    #[test]
    fn test_drive_saturates() {
        let mut e = MultibandSaturator::new();
        e.prepare(SR, 128);
        e.update_parameters(&[
            (MultibandSaturator::LOW_DRIVE, 1.0),
            (MultibandSaturator::MID_DRIVE, 1.0),
            (MultibandSaturator::HIGH_DRIVE, 1.0),
        ]);
        let input: Vec<f32> = (0..4800)
            .map(|i| 0.9 * libm::sinf(core::f32::consts::TAU * 100.0 * i as f32 / SR))
            .collect();
        let out = run_stereo(&mut e, &input);
        let peak = out[2400..].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        // tanh bounds each band; three bands can stack but stay well under 3
        assert!(peak > 0.5 && peak < 3.0, "peak {peak}");
        let diff: f32 = input.iter().zip(&out).map(|(a, b)| (a - b).abs()).sum();
        assert!(diff > 10.0);
    }

    #[test]
    fn test_shape_morph_endpoints() {
        for x in [-2.0f32, -0.3, 0.0, 0.7, 1.9] {
            assert_eq!(shape_at(0.0, x), soft_clip(x));
            assert_eq!(shape_at(1.0, x), cubic_clip(x));
            assert_eq!(shape_at(2.0, x), tube_curve(x));
            assert_eq!(shape_at(3.0, x), fold(x, 1.0));
            let mid = shape_at(0.5, x);
            let (a, b) = (soft_clip(x), cubic_clip(x));
            assert!(mid >= a.min(b) - 1e-6 && mid <= a.max(b) + 1e-6);
        }
    }

    #[test]
    fn test_crossovers_stay_ordered() {
        let mut e = MultibandSaturator::new();
        e.update_parameters(&[
            (MultibandSaturator::LOW_FREQ, 1.0),
            (MultibandSaturator::HIGH_FREQ, 0.0),
        ]);
        e.prepare(SR, 128);
        e.snap_parameters();
        let (low, high) = e.crossovers();
        assert!((low - 1000.0).abs() < 0.5);
        assert!((high - 2000.0).abs() < 1.0);
    }

    #[test]
    fn test_reset_clears_filters() {
        let mut e = MultibandSaturator::new();
        e.prepare(SR, 128);
        run_stereo(&mut e, &noise(1024));
        e.reset();
        let mut nonzero = 0;
        e.inspect_state(&mut |s| {
            if s != 0.0 {
                nonzero += 1;
            }
        });
        assert_eq!(nonzero, 0);
    }
}
