//! Schroeder/Moorer plate reverb.
//!
//! Per channel, eight damped feedback combs run in parallel and feed four
//! allpass diffusers in series:
//!
//! ```text
//!              ┌─ comb ×8 (parallel, damped) ─┐
//! in ─ predelay┤                              ├─ Σ/8 ─ AP ─ AP ─ AP ─ AP ─┐
//!              └─ early taps (Moorer) ────────┼───────────────────────────┤
//!                                             └─ lowcut ─ highcut ─ width ┴─ mix ─ out
//! ```
//!
//! Putting the allpasses after the combs instead of inside their loops keeps
//! comb coloration from being multiplied by allpass coloration, which is what
//! makes the late tail dense and smooth.
//!
//! Decay follows the first comb: `RT60 ≈ -3 · L₀ / (fs · log10(g))`. Every
//! other comb gets `g^(Lᵢ/L₀)` so all eight lose the same energy per second
//! and no single comb is left ringing at the end of the tail. Comb
//! input is scaled by `√(1 - g²)` so that tail energy stays roughly constant
//! as `size` changes; in freeze (`g = 1`) this also mutes the input and the
//! held tail plays back unchanged at half gain.
//!
//! Reference: Schroeder, "Natural Sounding Artificial Reverberation" (1962);
//! Moorer, "About This Reverberation Business" (1979).

use libm::{powf, roundf, sqrtf};
use tonewell_core::{
    AllpassFilter, AudioBlock, CC_SUSTAIN, CombFilter, DelayLine, Engine, MidiEvent, OnePole,
    OnePoleHighpass, ParamBank, ParamDescriptor, ParamMapping, ParamUnit, SmoothedParam, Smoother,
    mono_sum, wet_dry_mix,
};

use crate::CONTROL_INTERVAL;

/// Comb loop lengths at 44.1 kHz. Mutually prime to avoid stacked resonances.
const COMB_TUNINGS_44K: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];

/// Allpass delays at 44.1 kHz.
const ALLPASS_TUNINGS_44K: [usize; 4] = [556, 441, 341, 225];

/// Extra samples on every right-channel delay (at 44.1 kHz).
const STEREO_SPREAD_44K: usize = 23;

/// Reference sample rate for tuning constants.
const REFERENCE_RATE: f32 = 44_100.0;

/// Maximum pre-delay in seconds.
const MAX_PREDELAY_S: f32 = 0.2;

/// Moorer's early reflection pattern: `(time in seconds, gain)`.
const EARLY_TAPS: [(f32, f32); 18] = [
    (0.0043, 0.841),
    (0.0215, 0.504),
    (0.0225, 0.491),
    (0.0268, 0.379),
    (0.0270, 0.380),
    (0.0298, 0.346),
    (0.0458, 0.289),
    (0.0485, 0.272),
    (0.0572, 0.192),
    (0.0587, 0.193),
    (0.0595, 0.217),
    (0.0612, 0.181),
    (0.0707, 0.180),
    (0.0708, 0.181),
    (0.0726, 0.176),
    (0.0741, 0.142),
    (0.0753, 0.167),
    (0.0797, 0.134),
];

/// Scale delay times from reference rate to target rate.
fn scale_to_rate(samples: usize, target_rate: f32) -> usize {
    (roundf(samples as f32 * target_rate / REFERENCE_RATE) as usize).max(1)
}

/// Parameter table, in index order.
pub static PARAMS: [ParamDescriptor; 10] = [
    ParamDescriptor::mix(0, 0.3),
    ParamDescriptor::new(
        1,
        "Size",
        "Size",
        ParamUnit::Percent,
        0.5,
        ParamMapping::PERCENT,
    ),
    ParamDescriptor::new(
        2,
        "Damping",
        "Damp",
        ParamUnit::Percent,
        0.5,
        ParamMapping::PERCENT,
    ),
    ParamDescriptor::new(
        3,
        "Pre-Delay",
        "PreDly",
        ParamUnit::Milliseconds,
        0.0,
        ParamMapping::Linear {
            min: 0.0,
            max: 200.0,
        },
    ),
    ParamDescriptor::new(
        4,
        "Width",
        "Width",
        ParamUnit::Percent,
        1.0,
        ParamMapping::PERCENT,
    ),
    ParamDescriptor::new(
        5,
        "Freeze",
        "Freeze",
        ParamUnit::Toggle,
        0.0,
        ParamMapping::Toggle,
    ),
    ParamDescriptor::new(
        6,
        "Low Cut",
        "LoCut",
        ParamUnit::Hertz,
        0.0,
        ParamMapping::Exponential {
            min: 20.0,
            max: 500.0,
        },
    ),
    ParamDescriptor::new(
        7,
        "High Cut",
        "HiCut",
        ParamUnit::Hertz,
        1.0,
        ParamMapping::Exponential {
            min: 1000.0,
            max: 20_000.0,
        },
    ),
    ParamDescriptor::new(
        8,
        "Early",
        "Early",
        ParamUnit::Percent,
        0.0,
        ParamMapping::PERCENT,
    ),
    ParamDescriptor::new(
        9,
        "Diffusion",
        "Diff",
        ParamUnit::Percent,
        0.5,
        ParamMapping::PERCENT,
    ),
];

/// One channel of the late network.
#[derive(Debug, Clone)]
struct Tank {
    combs: [CombFilter; 8],
    allpasses: [AllpassFilter; 4],
    lowcut: OnePoleHighpass,
    highcut: OnePole,
    early_taps: [usize; EARLY_TAPS.len()],
}

impl Tank {
    fn new(sample_rate: f32, spread: usize) -> Self {
        let combs = core::array::from_fn(|i| {
            CombFilter::new(scale_to_rate(COMB_TUNINGS_44K[i] + spread, sample_rate))
        });
        let allpasses = core::array::from_fn(|i| {
            AllpassFilter::new(scale_to_rate(ALLPASS_TUNINGS_44K[i] + spread, sample_rate))
        });
        let spread_s = spread as f32 / REFERENCE_RATE;
        let early_taps =
            core::array::from_fn(|i| roundf((EARLY_TAPS[i].0 + spread_s) * sample_rate) as usize);
        Self {
            combs,
            allpasses,
            lowcut: OnePoleHighpass::new(sample_rate, 20.0),
            highcut: OnePole::new(sample_rate, 20_000.0),
            early_taps,
        }
    }

    fn set_loop(&mut self, feedback: f32, damping: f32, diffusion: f32) {
        let reference = self.combs[0].length() as f32;
        for c in &mut self.combs {
            c.set_feedback(powf(feedback, c.length() as f32 / reference));
            c.set_damping(damping);
        }
        for ap in &mut self.allpasses {
            ap.set_feedback(diffusion);
        }
    }

    #[inline]
    fn late(&mut self, x: f32) -> f32 {
        let mut acc = 0.0;
        for c in &mut self.combs {
            acc += c.process(x);
        }
        let mut y = acc * 0.125;
        for ap in &mut self.allpasses {
            y = ap.process(y);
        }
        y
    }

    #[inline]
    fn early(&self, line: &DelayLine) -> f32 {
        let mut acc = 0.0;
        for (&d, &(_, gain)) in self.early_taps.iter().zip(EARLY_TAPS.iter()) {
            acc += line.read_int(d) * gain;
        }
        acc
    }

    fn reset(&mut self) {
        for c in &mut self.combs {
            c.reset();
        }
        for ap in &mut self.allpasses {
            ap.reset();
        }
        self.lowcut.reset();
        self.highcut.reset();
    }

    fn inspect(&self, visit: &mut dyn FnMut(f32)) {
        for c in &self.combs {
            c.inspect(visit);
        }
        for ap in &self.allpasses {
            ap.inspect(visit);
        }
        visit(self.lowcut.state());
        visit(self.highcut.state());
    }
}

/// Stereo plate reverb.
///
/// ## Parameter Indices
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Mix | 0–100% | 30% |
/// | 1 | Size | 0–100% (`g = 0.28 + 0.64·p`) | 50% |
/// | 2 | Damping | 0–100% (`d = 0.4·p`) | 50% |
/// | 3 | Pre-Delay | 0–200 ms | 0 ms |
/// | 4 | Width | 0–100% (0% swaps L and R, 50% is mono) | 100% |
/// | 5 | Freeze | off/on | off |
/// | 6 | Low Cut | 20–500 Hz | 20 Hz |
/// | 7 | High Cut | 1–20 kHz | 20 kHz |
/// | 8 | Early | 0–100% | 0% |
/// | 9 | Diffusion | 0–100% (allpass `g = 0.5 + 0.2·p`) | 50% |
///
/// MIDI CC 64 (sustain) drives Freeze: pedal down freezes the tail.
///
/// # Example
///
/// ```rust
/// use tonewell_core::{AudioBlock, Engine};
/// use tonewell_effects::PlateReverb;
///
/// let mut reverb = PlateReverb::new();
/// reverb.prepare(44_100.0, 64);
/// reverb.update_parameters(&[(PlateReverb::MIX, 1.0)]);
///
/// let mut data = [0.0f32; 128];
/// reverb.process(&mut AudioBlock::new(&mut data, 2));
/// assert!(data.iter().all(|&s| s == 0.0));
/// ```
#[derive(Debug, Clone)]
pub struct PlateReverb {
    params: ParamBank,
    sample_rate: f32,

    left: Tank,
    right: Tank,
    predelay_line: DelayLine,
    early_line: DelayLine,
    max_predelay: f32,
    early_norm: f32,

    // Per-sample smoothed
    mix: SmoothedParam,
    width: SmoothedParam,
    predelay: SmoothedParam,

    // Control-rate smoothed
    size: SmoothedParam,
    damping: SmoothedParam,
    diffusion: SmoothedParam,
    low_cut: SmoothedParam,
    high_cut: SmoothedParam,
    early: SmoothedParam,

    // Loop coefficients glide on their own so freeze transitions are smooth
    feedback: Smoother,
    damp: Smoother,
    wet_gain: Smoother,
    input_gain: f32,
    early_gain: f32,
    frozen: bool,
    snap_pending: bool,
}

impl PlateReverb {
    /// Factory identifier.
    pub const ID: u16 = 1;

    /// Dry/wet mix.
    pub const MIX: usize = 0;
    /// Room size (comb feedback).
    pub const SIZE: usize = 1;
    /// High-frequency damping in the comb loops.
    pub const DAMPING: usize = 2;
    /// Pre-delay.
    pub const PREDELAY: usize = 3;
    /// Stereo width.
    pub const WIDTH: usize = 4;
    /// Freeze toggle.
    pub const FREEZE: usize = 5;
    /// Wet low cut.
    pub const LOW_CUT: usize = 6;
    /// Wet high cut.
    pub const HIGH_CUT: usize = 7;
    /// Early reflection level.
    pub const EARLY: usize = 8;
    /// Allpass diffusion.
    pub const DIFFUSION: usize = 9;

    /// Create a reverb with default parameters, tuned for 44.1 kHz until
    /// [`prepare`](Engine::prepare) is called.
    pub fn new() -> Self {
        let params = ParamBank::new(&PARAMS);
        let mut reverb = Self {
            left: Tank::new(REFERENCE_RATE, 0),
            right: Tank::new(REFERENCE_RATE, STEREO_SPREAD_44K),
            predelay_line: DelayLine::new(1),
            early_line: DelayLine::new(1),
            max_predelay: 0.0,
            early_norm: 1.0 / EARLY_TAPS.iter().map(|&(_, g)| g).sum::<f32>(),
            mix: SmoothedParam::new(&params, Self::MIX),
            width: SmoothedParam::new(&params, Self::WIDTH),
            predelay: SmoothedParam::new(&params, Self::PREDELAY),
            size: SmoothedParam::new(&params, Self::SIZE),
            damping: SmoothedParam::new(&params, Self::DAMPING),
            diffusion: SmoothedParam::new(&params, Self::DIFFUSION),
            low_cut: SmoothedParam::new(&params, Self::LOW_CUT),
            high_cut: SmoothedParam::new(&params, Self::HIGH_CUT),
            early: SmoothedParam::new(&params, Self::EARLY),
            feedback: Smoother::new(0.0),
            damp: Smoother::new(0.0),
            wet_gain: Smoother::new(1.0),
            input_gain: 0.0,
            early_gain: 0.0,
            frozen: false,
            snap_pending: true,
            params,
            sample_rate: REFERENCE_RATE,
        };
        reverb.allocate(REFERENCE_RATE);
        reverb.snap_parameters();
        reverb
    }

    /// Returns `true` while the tail is frozen.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn allocate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.left = Tank::new(sample_rate, 0);
        self.right = Tank::new(sample_rate, STEREO_SPREAD_44K);
        self.max_predelay = roundf(MAX_PREDELAY_S * sample_rate);
        self.predelay_line.resize(self.max_predelay as usize + 1);
        let longest = self.right.early_taps.iter().copied().max().unwrap_or(0);
        self.early_line.resize(longest + 1);
    }

    /// Loop targets for the current freeze state: `(g, d, wet gain)`.
    fn loop_targets(&self, size: f32, damping: f32) -> (f32, f32, f32) {
        if self.frozen {
            (1.0, 0.0, 0.5)
        } else {
            (0.28 + 0.64 * size, 0.4 * damping, 1.0)
        }
    }

    fn apply_loop(&mut self, g: f32, d: f32) {
        let diffusion = 0.5 + 0.2 * self.diffusion.get();
        self.left.set_loop(g, d, diffusion);
        self.right.set_loop(g, d, diffusion);
        self.input_gain = sqrtf((1.0 - g * g).max(0.0));

        let low = PARAMS[Self::LOW_CUT].to_physical(self.low_cut.get());
        let high = PARAMS[Self::HIGH_CUT].to_physical(self.high_cut.get());
        for tank in [&mut self.left, &mut self.right] {
            tank.lowcut.set_frequency(low);
            tank.highcut.set_frequency(high);
        }
        self.early_gain = self.early.get() * self.early_norm;
    }

    /// Advance control-rate state by `n` frames.
    fn update_control(&mut self, n: usize) {
        self.frozen = self.params.get(Self::FREEZE).unwrap_or(0.0) > 0.5;
        let size = self.size.skip(n);
        let damping = self.damping.skip(n);
        self.diffusion.skip(n);
        self.low_cut.skip(n);
        self.high_cut.skip(n);
        self.early.skip(n);

        let (g, d, _) = self.loop_targets(size, damping);
        let g = self.feedback.skip(g, n);
        let d = self.damp.skip(d, n);
        self.apply_loop(g, d);
    }

    #[inline]
    fn tick(&mut self, l: f32, r: f32) -> (f32, f32) {
        let mix = self.mix.next();
        let width = self.width.next();
        let delay = self.predelay.next() * self.max_predelay;
        let wet_target = if self.frozen { 0.5 } else { 1.0 };
        let wet_gain = self.wet_gain.next(wet_target);

        self.predelay_line.write(mono_sum(l, r));
        let x = self.predelay_line.read_frac(delay);
        self.early_line.write(x);

        let input = x * self.input_gain;
        let mut wet_l = self.left.late(input);
        let mut wet_r = self.right.late(input);
        if self.early_gain > 0.0 {
            wet_l += self.left.early(&self.early_line) * self.early_gain;
            wet_r += self.right.early(&self.early_line) * self.early_gain;
        }

        let wet_l = self.left.highcut.process(self.left.lowcut.process(wet_l)) * wet_gain;
        let wet_r = self.right.highcut.process(self.right.lowcut.process(wet_r)) * wet_gain;

        let out_l = wet_l * width + wet_r * (1.0 - width);
        let out_r = wet_r * width + wet_l * (1.0 - width);
        (wet_dry_mix(l, out_l, mix), wet_dry_mix(r, out_r, mix))
    }
}

impl Default for PlateReverb {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for PlateReverb {
    fn name(&self) -> &'static str {
        "Plate Reverb"
    }

    fn engine_id(&self) -> u16 {
        Self::ID
    }

    fn prepare(&mut self, sample_rate: f32, _max_block_size: usize) {
        let sample_rate = sample_rate.max(1.0);
        self.allocate(sample_rate);
        for p in [
            &mut self.mix,
            &mut self.width,
            &mut self.predelay,
            &mut self.size,
            &mut self.damping,
            &mut self.diffusion,
            &mut self.low_cut,
            &mut self.high_cut,
            &mut self.early,
        ] {
            p.prepare(sample_rate);
        }
        self.feedback.prepare(sample_rate);
        self.damp.prepare(sample_rate);
        self.wet_gain.prepare(sample_rate);
        self.snap_parameters();
        self.snap_pending = true;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            sample_rate,
            first_comb = self.left.combs[0].length(),
            max_predelay = self.max_predelay,
            "plate reverb prepared"
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
        self.left.reset();
        self.right.reset();
        self.predelay_line.mute();
        self.early_line.mute();
    }

    fn params(&self) -> &ParamBank {
        &self.params
    }

    fn process_midi(&mut self, events: &[MidiEvent]) {
        for ev in events {
            if let Some((CC_SUSTAIN, value)) = ev.as_control_change() {
                let on = if value >= 64 { 1.0 } else { 0.0 };
                self.params.set(Self::FREEZE, on);
            }
        }
    }

    fn snap_parameters(&mut self) {
        for p in [
            &mut self.mix,
            &mut self.width,
            &mut self.predelay,
            &mut self.size,
            &mut self.damping,
            &mut self.diffusion,
            &mut self.low_cut,
            &mut self.high_cut,
            &mut self.early,
        ] {
            p.snap();
        }
        self.frozen = self.params.get(Self::FREEZE).unwrap_or(0.0) > 0.5;
        let (g, d, wet) = self.loop_targets(self.size.get(), self.damping.get());
        self.feedback.snap(g);
        self.damp.snap(d);
        self.wet_gain.snap(wet);
        self.apply_loop(g, d);
    }

    fn inspect_state(&self, visit: &mut dyn FnMut(f32)) {
        self.left.inspect(visit);
        self.right.inspect(visit);
        for &s in self.predelay_line.as_slice() {
            visit(s);
        }
        for &s in self.early_line.as_slice() {
            visit(s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    const SR: f32 = 44_100.0;

    fn run(reverb: &mut PlateReverb, input: &[f32], block: usize) -> Vec<f32> {
        // mono-in, left-out convenience over stereo blocks
        let mut out = Vec::with_capacity(input.len());
        for chunk in input.chunks(block) {
            let mut data = vec![0.0; chunk.len() * 2];
            data[..chunk.len()].copy_from_slice(chunk);
            data[chunk.len()..].copy_from_slice(chunk);
            reverb.process(&mut AudioBlock::new(&mut data, 2));
            out.extend_from_slice(&data[..chunk.len()]);
        }
        out
    }

    fn impulse(len: usize) -> Vec<f32> {
        let mut x = vec![0.0; len];
        x[0] = 1.0;
        x
    }

    fn energy(x: &[f32]) -> f32 {
        x.iter().map(|s| s * s).sum()
    }

    #[test]
    fn test_mix_zero_is_dry() {
        let mut r = PlateReverb::new();
        r.prepare(SR, 256);
        r.update_parameters(&[(PlateReverb::MIX, 0.0), (PlateReverb::SIZE, 1.0)]);
        let input: Vec<f32> = (0..2048).map(|i| libm::sinf(i as f32 * 0.05) * 0.7).collect();
        let out = run(&mut r, &input, 256);
        for (a, b) in input.iter().zip(&out) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_tail_decays() {
        let mut r = PlateReverb::new();
        r.prepare(SR, 512);
        r.update_parameters(&[(PlateReverb::MIX, 1.0)]);
        let out = run(&mut r, &impulse(SR as usize * 3), 512);
        let early = energy(&out[4410..8820]);
        let late = energy(&out[4410 * 5..4410 * 6]);
        assert!(early > 0.0);
        assert!(late < early * 0.5, "late {late} early {early}");
    }

    #[test]
    fn test_larger_size_rings_longer() {
        let tail = |size: f32| {
            let mut r = PlateReverb::new();
            r.prepare(SR, 512);
            r.update_parameters(&[(PlateReverb::MIX, 1.0), (PlateReverb::SIZE, size)]);
            let out = run(&mut r, &impulse(SR as usize * 2), 512);
            energy(&out[SR as usize..])
        };
        assert!(tail(0.9) > tail(0.2) * 4.0);
    }

    #[test]
    fn test_predelay_shifts_onset() {
        let onset = |predelay: f32| {
            let mut r = PlateReverb::new();
            r.prepare(SR, 512);
            r.update_parameters(&[
                (PlateReverb::MIX, 1.0),
                (PlateReverb::EARLY, 1.0),
                (PlateReverb::PREDELAY, predelay),
            ]);
            let out = run(&mut r, &impulse(8192), 512);
            out.iter().position(|s| s.abs() > 1e-6).unwrap()
        };
        let first_tap = roundf(EARLY_TAPS[0].0 * SR) as usize;
        assert_eq!(onset(0.0), first_tap);
        let shifted = onset(0.5);
        assert!(shifted.abs_diff(first_tap + 4410) <= 1, "onset {shifted}");
    }

    #[test]
    fn test_freeze_sustains_tail() {
        let mut r = PlateReverb::new();
        r.prepare(SR, 512);
        r.update_parameters(&[(PlateReverb::MIX, 1.0), (PlateReverb::DAMPING, 0.0)]);
        let burst: Vec<f32> = (0..4096).map(|i| if i % 7 == 0 { 0.5 } else { -0.1 }).collect();
        run(&mut r, &burst, 512);
        r.update_parameters(&[(PlateReverb::FREEZE, 1.0)]);
        let held = run(&mut r, &vec![0.0; SR as usize * 2], 512);
        assert!(r.is_frozen());
        let first = energy(&held[4410..8820]);
        let last = energy(&held[held.len() - 4410..]);
        assert!(last > first * 0.8, "first {first} last {last}");
    }

    #[test]
    fn test_frozen_input_is_muted() {
        let mut r = PlateReverb::new();
        r.update_parameters(&[(PlateReverb::MIX, 1.0), (PlateReverb::FREEZE, 1.0)]);
        r.prepare(SR, 512);
        let out = run(&mut r, &impulse(4096), 512);
        assert!(out.iter().all(|&s| s.abs() < 1e-6));
    }

    #[test]
    fn test_sustain_pedal_toggles_freeze() {
        let mut r = PlateReverb::new();
        r.process_midi(&[MidiEvent::control_change(0, 0, CC_SUSTAIN, 127)]);
        assert_eq!(r.params().get(PlateReverb::FREEZE), Some(1.0));
        r.process_midi(&[MidiEvent::control_change(0, 0, 7, 0)]);
        assert_eq!(r.params().get(PlateReverb::FREEZE), Some(1.0));
        r.process_midi(&[MidiEvent::control_change(0, 0, CC_SUSTAIN, 0)]);
        assert_eq!(r.params().get(PlateReverb::FREEZE), Some(0.0));
    }

    /// Run a left-only impulse through planar 512-frame blocks.
    fn run_left_impulse(width: f32) -> Vec<f32> {
        let mut r = PlateReverb::new();
        r.prepare(SR, 512);
        r.update_parameters(&[(PlateReverb::MIX, 1.0), (PlateReverb::WIDTH, width)]);
        let mut data = vec![0.0; 8192];
        data[0] = 1.0;
        for chunk in data.chunks_mut(1024) {
            r.process(&mut AudioBlock::new(chunk, 2));
        }
        data
    }

    #[test]
    fn test_half_width_is_mono() {
        let data = run_left_impulse(0.5);
        for chunk in data.chunks(1024) {
            let (l, rr) = chunk.split_at(512);
            for (a, b) in l.iter().zip(rr) {
                assert!((a - b).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_zero_width_swaps_channels() {
        let wide = run_left_impulse(1.0);
        let swapped = run_left_impulse(0.0);
        assert!(energy(&wide) > 0.0);
        for (w, s) in wide.chunks(1024).zip(swapped.chunks(1024)) {
            let (wl, wr) = w.split_at(512);
            let (sl, sr) = s.split_at(512);
            assert_eq!(sl, wr);
            assert_eq!(sr, wl);
        }
        // the two tanks are tuned apart, so the swap is audible
        assert_ne!(&wide[..512], &wide[512..1024]);
    }

    #[test]
    fn test_combs_share_one_decay_rate() {
        let mut r = PlateReverb::new();
        r.prepare(SR, 512);
        r.update_parameters(&[(PlateReverb::SIZE, 1.0), (PlateReverb::DAMPING, 0.0)]);
        r.snap_parameters();
        let tank = &r.left;
        let l0 = tank.combs[0].length() as f32;
        let rate0 = libm::logf(tank.combs[0].feedback()) / l0;
        assert!((tank.combs[0].feedback() - 0.92).abs() < 1e-6);
        for c in &tank.combs[1..] {
            let rate = libm::logf(c.feedback()) / c.length() as f32;
            assert!((rate - rate0).abs() < 1e-3 * rate0.abs(), "{rate} vs {rate0}");
            assert!(c.feedback() < tank.combs[0].feedback());
        }
    }

    #[test]
    fn test_delays_scale_with_rate() {
        let mut r = PlateReverb::new();
        r.prepare(88_200.0, 512);
        assert_eq!(r.left.combs[0].length(), 2232);
        assert_eq!(r.right.combs[0].length(), 2278);
        assert_eq!(r.predelay_line.capacity(), 17_641);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut r = PlateReverb::new();
        r.prepare(SR, 512);
        run(&mut r, &impulse(2048), 512);
        r.reset();
        let mut nonzero = 0;
        r.inspect_state(&mut |s| {
            if s != 0.0 {
                nonzero += 1;
            }
        });
        assert_eq!(nonzero, 0);
    }
}
