//! Linkwitz-Riley 4th-order band splitting.
//!
//! An LR4 lowpass is two identical Butterworth (Q = 1/√2) biquads in
//! series, and likewise for the highpass. At the shared cutoff both are
//! -6 dB, and their sum is an allpass: flat magnitude, but a phase
//! rotation of up to 360°.
//!
//! Two ways to split are offered:
//!
//! - [`Lr4::split`] returns the classic `(LP4, HP4)` pair.
//! - [`Lr4::split_complementary`] returns `(LP4, x - LP4)`. The upper band
//!   is no longer a textbook highpass (it has a small bump near the cutoff)
//!   but `low + high == x` holds sample-for-sample, which is what a
//!   multiband processor needs when every band is left untouched.
//!
//! # Reference
//!
//! S. Linkwitz, "Active Crossover Networks for Noncoincident Drivers",
//! JAES vol. 24, 1976.

use core::f32::consts::FRAC_1_SQRT_2;

use crate::biquad::{Biquad, BiquadCoeffs, BiquadKind};

/// Fourth-order Linkwitz-Riley crossover at a single frequency.
#[derive(Debug, Clone)]
pub struct Lr4 {
    lowpass: [Biquad; 2],
    highpass: [Biquad; 2],
    frequency: f32,
    sample_rate: f32,
}

impl Lr4 {
    /// Create a crossover at `frequency` Hz.
    pub fn new(frequency: f32, sample_rate: f32) -> Self {
        let mut xo = Self {
            lowpass: [Biquad::new(), Biquad::new()],
            highpass: [Biquad::new(), Biquad::new()],
            frequency,
            sample_rate,
        };
        xo.redesign();
        xo
    }

    /// Move the crossover point. State is kept so sweeps stay continuous.
    pub fn set_frequency(&mut self, frequency: f32) {
        if frequency != self.frequency {
            self.frequency = frequency;
            self.redesign();
        }
    }

    /// Change the sample rate and redesign.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.redesign();
    }

    /// Crossover frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    fn redesign(&mut self) {
        let lp = BiquadCoeffs::design(
            BiquadKind::Lowpass,
            self.frequency,
            FRAC_1_SQRT_2,
            0.0,
            self.sample_rate,
        );
        let hp = BiquadCoeffs::design(
            BiquadKind::Highpass,
            self.frequency,
            FRAC_1_SQRT_2,
            0.0,
            self.sample_rate,
        );
        for s in &mut self.lowpass {
            s.set_coeffs(lp);
        }
        for s in &mut self.highpass {
            s.set_coeffs(hp);
        }
    }

    /// Lowpass branch only.
    #[inline]
    pub fn lowpass(&mut self, x: f32) -> f32 {
        let y = self.lowpass[0].process(x);
        self.lowpass[1].process(y)
    }

    /// Classic split into `(LP4, HP4)`; the sum is an allpass of `x`.
    #[inline]
    pub fn split(&mut self, x: f32) -> (f32, f32) {
        let low = self.lowpass(x);
        let h = self.highpass[0].process(x);
        let high = self.highpass[1].process(h);
        (low, high)
    }

    /// Split into `(LP4, x - LP4)`; the sum reconstructs `x` exactly.
    ///
    /// Only the lowpass sections are advanced.
    #[inline]
    pub fn split_complementary(&mut self, x: f32) -> (f32, f32) {
        let low = self.lowpass(x);
        (low, x - low)
    }

    /// Clear all filter memory.
    pub fn reset(&mut self) {
        for s in self.lowpass.iter_mut().chain(self.highpass.iter_mut()) {
            s.reset();
        }
    }

    /// Visit every state word.
    pub fn inspect(&self, f: &mut dyn FnMut(f32)) {
        for s in self.lowpass.iter().chain(self.highpass.iter()) {
            let [a, b] = s.state();
            f(a);
            f(b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: f32 = 48_000.0;

    fn sine_gain(xo: &mut Lr4, freq: f32, pick: impl Fn((f32, f32)) -> f32) -> f32 {
        xo.reset();
        let mut peak = 0.0f32;
        let n = (FS * 0.5) as usize;
        for i in 0..n {
            let x = (core::f32::consts::TAU * freq * i as f32 / FS).sin();
            let y = pick(xo.split(x));
            if i > n / 2 {
                peak = peak.max(y.abs());
            }
        }
        peak
    }

    #[test]
    fn test_bands_are_minus_6db_at_cutoff() {
        let mut xo = Lr4::new(1000.0, FS);
        let low = sine_gain(&mut xo, 1000.0, |(l, _)| l);
        let high = sine_gain(&mut xo, 1000.0, |(_, h)| h);
        assert!((low - 0.5).abs() < 0.01, "low {low}");
        assert!((high - 0.5).abs() < 0.01, "high {high}");
    }

    #[test]
    fn test_sum_is_flat() {
        let mut xo = Lr4::new(800.0, FS);
        for &f in &[50.0, 400.0, 800.0, 1600.0, 8000.0] {
            let g = sine_gain(&mut xo, f, |(l, h)| l + h);
            assert!((g - 1.0).abs() < 0.01, "sum gain {g} at {f} Hz");
        }
    }

    #[test]
    fn test_complementary_reconstructs_input() {
        let mut xo = Lr4::new(300.0, FS);
        for i in 0..10_000 {
            let x = ((i * 7919) % 2000) as f32 / 1000.0 - 1.0;
            let (l, h) = xo.split_complementary(x);
            assert!((l + h - x).abs() <= 1e-6);
        }
    }

    #[test]
    fn test_slopes() {
        let mut xo = Lr4::new(1000.0, FS);
        // Two octaves away a 24 dB/oct slope is down roughly 48 dB.
        let low_at_4k = sine_gain(&mut xo, 4000.0, |(l, _)| l);
        let high_at_250 = sine_gain(&mut xo, 250.0, |(_, h)| h);
        assert!(low_at_4k < 0.01, "{low_at_4k}");
        assert!(high_at_250 < 0.01, "{high_at_250}");
    }
}
