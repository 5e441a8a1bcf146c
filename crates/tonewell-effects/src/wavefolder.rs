//! Reflective wave folder.
//!
//! Samples beyond ±t are reflected back into range until they fit, the
//! triangle-wave closed form of
//!
//! ```text
//! while x >  t { x =  2t - x }
//! while x < -t { x = -2t - x }
//! ```
//!
//! The threshold shrinks as the fold amount grows, `t = 1 - 0.9·fold`, and
//! the result is divided by `t` so that the folded signal keeps roughly the
//! input's level.
//!
//! Asymmetry shifts the signal by `o = 0.5·asym·t` before folding and removes
//! the shift's own image afterwards:
//!
//! ```text
//! y = (F(x + o, t) - F(o, t)) / t
//! ```
//!
//! Positive half-waves therefore hit the threshold earlier than negative
//! ones, which adds even harmonics while silence stays silent.
//!
//! Folding is the harshest aliasing source in the crate, so the stage runs
//! 8× oversampled and the dry path is delayed to match.

use tonewell_core::{
    AudioBlock, DelayLine, Engine, Oversampler, ParamBank, ParamDescriptor, ParamMapping,
    ParamUnit, SmoothedParam, db_to_linear, fold, wet_dry_mix,
};

/// Oversampling factor requested at construction.
pub const OVERSAMPLING: usize = 8;

/// Parameter table, in index order.
pub static PARAMS: [ParamDescriptor; 4] = [
    ParamDescriptor::new(
        0,
        "Fold",
        "Fold",
        ParamUnit::Percent,
        0.5,
        ParamMapping::PERCENT,
    ),
    ParamDescriptor::new(
        1,
        "Asymmetry",
        "Asym",
        ParamUnit::Percent,
        0.0,
        ParamMapping::PERCENT,
    ),
    ParamDescriptor::output(2, 12.0),
    ParamDescriptor::mix(3, 1.0),
];

/// Fold threshold for a normalized fold amount.
#[inline]
pub fn threshold(amount: f32) -> f32 {
    1.0 - 0.9 * amount.clamp(0.0, 1.0)
}

/// Offset-compensated, level-normalized fold.
///
/// # Example
///
/// ```rust
/// use tonewell_effects::wavefolder::fold_asymmetric;
///
/// // below threshold the folder is transparent
/// assert_eq!(fold_asymmetric(0.25, 0.5, 0.0), 0.5);
/// // silence stays silent with any offset
/// assert_eq!(fold_asymmetric(0.0, 0.5, 0.2), 0.0);
/// ```
#[inline]
pub fn fold_asymmetric(x: f32, t: f32, offset: f32) -> f32 {
    (fold(x + offset, t) - fold(offset, t)) / t
}

#[derive(Debug, Clone)]
struct Channel {
    oversampler: Oversampler,
    dry: DelayLine,
}

impl Channel {
    fn new() -> Self {
        Self {
            oversampler: Oversampler::new(OVERSAMPLING),
            dry: DelayLine::new(1),
        }
    }

    fn reset(&mut self) {
        self.oversampler.reset();
        self.dry.mute();
    }
}

/// Oversampled wave folder with asymmetric offset.
///
/// ## Parameter Indices
///
/// | Index | Name | Range | Default |
/// |-------|------|-------|---------|
/// | 0 | Fold | 0–100% (`t = 1 − 0.9·p`) | 50% |
/// | 1 | Asymmetry | 0–100% (`o = 0.5·p·t`) | 0% |
/// | 2 | Output | −12–+12 dB | 0 dB |
/// | 3 | Mix | 0–100% | 100% |
#[derive(Debug, Clone)]
pub struct WaveFolder {
    params: ParamBank,
    sample_rate: f32,
    channels: [Channel; 2],
    latency: usize,

    amount: SmoothedParam,
    asymmetry: SmoothedParam,
    output: SmoothedParam,
    mix: SmoothedParam,

    snap_pending: bool,
}

impl WaveFolder {
    /// Factory identifier.
    pub const ID: u16 = 5;

    /// Fold amount.
    pub const FOLD: usize = 0;
    /// Positive-side offset.
    pub const ASYMMETRY: usize = 1;
    /// Output trim.
    pub const OUTPUT: usize = 2;
    /// Dry/wet mix.
    pub const MIX: usize = 3;

    /// Create a folder with default parameters.
    pub fn new() -> Self {
        let params = ParamBank::new(&PARAMS);
        let sp = |index| SmoothedParam::new(&params, index);
        let mut folder = Self {
            sample_rate: 48_000.0,
            channels: [Channel::new(), Channel::new()],
            latency: 0,
            amount: sp(Self::FOLD),
            asymmetry: sp(Self::ASYMMETRY),
            output: sp(Self::OUTPUT),
            mix: sp(Self::MIX),
            snap_pending: true,
            params,
        };
        folder.prepare(48_000.0, 512);
        folder
    }

    /// Oversampling factor in effect.
    pub fn oversampling(&self) -> usize {
        self.channels[0].oversampler.factor()
    }

    fn smoothed(&mut self) -> [&mut SmoothedParam; 4] {
        [
            &mut self.amount,
            &mut self.asymmetry,
            &mut self.output,
            &mut self.mix,
        ]
    }

    #[inline]
    fn tick(&mut self, l: f32, r: f32) -> (f32, f32) {
        let t = threshold(self.amount.next());
        let offset = 0.5 * self.asymmetry.next() * t;
        let gain = db_to_linear(PARAMS[Self::OUTPUT].to_physical(self.output.next()));
        let mix = self.mix.next();
        let latency = self.latency;

        let run = |ch: &mut Channel, x: f32| {
            ch.dry.write(x);
            let dry = ch.dry.read_int(latency);
            let wet = ch
                .oversampler
                .process_sample(x, |v| fold_asymmetric(v, t, offset));
            wet_dry_mix(dry, wet * gain, mix)
        };
        let [left, right] = &mut self.channels;
        (run(left, l), run(right, r))
    }
}

impl Default for WaveFolder {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for WaveFolder {
    fn name(&self) -> &'static str {
        "Wave Folder"
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
        self.snap_pending = true;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            sample_rate,
            oversampling = self.oversampling(),
            latency = self.latency,
            "wave folder prepared"
        );
    }

    fn process(&mut self, block: &mut AudioBlock<'_>) {
        if core::mem::take(&mut self.snap_pending) {
            self.snap_parameters();
        }
        let frames = block.frames();
        block.process_stereo_range(0..frames, |l, r| self.tick(l, r));
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
    }

    fn inspect_state(&self, visit: &mut dyn FnMut(f32)) {
        for ch in &self.channels {
            ch.oversampler.inspect(visit);
            for &s in ch.dry.as_slice() {
                visit(s);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::f32::consts::TAU;

    const SR: f32 = 44_100.0;

    fn run_mono(e: &mut WaveFolder, input: &[f32]) -> Vec<f32> {
        let mut out = input.to_vec();
        for chunk in out.chunks_mut(128) {
            e.process(&mut AudioBlock::new(chunk, 1));
        }
        out
    }

    fn sine(freq: f32, amp: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amp * libm::sinf(TAU * freq * i as f32 / SR))
            .collect()
    }

    #[test]
    fn test_fold_asymmetric_matches_reflection_loop() {
        let reflect = |mut x: f32, t: f32| {
            while x > t || x < -t {
                if x > t {
                    x = 2.0 * t - x;
                } else {
                    x = -2.0 * t - x;
                }
            }
            x
        };
        for &x in &[-2.3f32, -0.9, -0.1, 0.0, 0.35, 0.8, 1.7, 3.1] {
            for &t in &[0.1f32, 0.28, 0.55, 1.0] {
                let expected = reflect(x, t) / t;
                assert!((fold_asymmetric(x, t, 0.0) - expected).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_latency_and_silence() {
        let mut e = WaveFolder::new();
        e.update_parameters(&[(WaveFolder::FOLD, 1.0), (WaveFolder::ASYMMETRY, 1.0)]);
        e.prepare(SR, 128);
        assert_eq!(e.oversampling(), 8);
        assert_eq!(e.latency_samples(), 222);
        let out = run_mono(&mut e, &vec![0.0; 2048]);
        assert!(out.iter().all(|&y| y == 0.0));
    }

    #[test]
    fn test_below_threshold_is_transparent() {
        let mut e = WaveFolder::new();
        e.update_parameters(&[(WaveFolder::FOLD, 0.0)]);
        e.prepare(SR, 128);
        let input = sine(500.0, 0.5, 4096);
        let out = run_mono(&mut e, &input);
        let lat = e.latency_samples();
        // 8x group delay is 222.25 samples; allow the quarter-sample skew
        for n in 1024..input.len() {
            assert!((out[n] - input[n - lat]).abs() < 0.02, "n {n}");
        }
    }

    #[test]
    fn test_folding_adds_turning_points() {
        let mut e = WaveFolder::new();
        e.update_parameters(&[(WaveFolder::FOLD, 0.8)]);
        e.prepare(SR, 128);
        let out = run_mono(&mut e, &sine(1000.0, 1.0, 4410));
        let tail = &out[441..];
        let mut turns = 0;
        for w in tail.windows(3) {
            let (d0, d1) = (w[1] - w[0], w[2] - w[1]);
            if d0.signum() != d1.signum() && w[1].abs() > 0.6 {
                turns += 1;
            }
        }
        // an unfolded 1 kHz sine turns twice per 44.1 samples
        let per_period = turns as f32 * 441.0 / tail.len() as f32;
        assert!(per_period > 40.0, "{per_period} turns per 441 samples");
    }

    #[test]
    fn test_asymmetry_skews_waveform() {
        let mut e = WaveFolder::new();
        e.update_parameters(&[(WaveFolder::FOLD, 0.5), (WaveFolder::ASYMMETRY, 1.0)]);
        e.prepare(SR, 128);
        let out = run_mono(&mut e, &sine(220.0, 0.5, 8192));
        let tail = &out[2048..];
        let max = tail.iter().copied().fold(f32::MIN, f32::max);
        let min = tail.iter().copied().fold(f32::MAX, f32::min);
        assert!((max + min).abs() > 0.2, "max {max} min {min}");
    }

    #[test]
    fn test_dry_is_latency_aligned() {
        let mut e = WaveFolder::new();
        e.update_parameters(&[(WaveFolder::MIX, 0.0)]);
        e.prepare(SR, 128);
        let input = sine(440.0, 0.9, 2048);
        let out = run_mono(&mut e, &input);
        let lat = e.latency_samples();
        for n in lat..input.len() {
            assert_eq!(out[n], input[n - lat]);
        }
    }

    #[test]
    fn test_reset_clears_state() {
        let mut e = WaveFolder::new();
        e.prepare(SR, 128);
        run_mono(&mut e, &sine(300.0, 1.0, 1024));
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
