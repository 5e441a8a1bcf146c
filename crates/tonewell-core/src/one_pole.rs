//! One-pole filters for tone shaping, damping and DC tracking.
//!
//! ```text
//! lowpass:   y += α (x - y)
//! highpass:  s += α (x - s);  y = x - s
//! ```
//!
//! with `α = 1 - exp(-2π fc / fs)`. Both roll off at 6 dB/octave, have zero
//! latency and cost one multiply-add per sample.
//!
//! # Reference
//!
//! Julius O. Smith III, "Introduction to Digital Filters with Audio Applications",
//! Section: One-Pole Filter.

use crate::math::flush_denormal;
use libm::expf;

/// Smoothing factor `α = 1 - exp(-2π fc / fs)` for a one-pole section.
///
/// The cutoff is clamped to `(0, 0.49 fs]`; a non-positive cutoff yields
/// `α = 0` (filter frozen).
#[inline]
pub fn one_pole_alpha(freq_hz: f32, sample_rate: f32) -> f32 {
    if freq_hz <= 0.0 || sample_rate <= 0.0 {
        return 0.0;
    }
    let fc = freq_hz.min(sample_rate * 0.49);
    1.0 - expf(-core::f32::consts::TAU * fc / sample_rate)
}

/// One-pole (6 dB/oct) lowpass.
///
/// # Example
///
/// ```rust
/// use tonewell_core::OnePole;
///
/// let mut lp = OnePole::new(48000.0, 4000.0);
/// let filtered = lp.process(1.0);
/// assert!(filtered < 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct OnePole {
    state: f32,
    alpha: f32,
    sample_rate: f32,
    freq: f32,
}

impl OnePole {
    /// Create a lowpass with cutoff `freq_hz`.
    pub fn new(sample_rate: f32, freq_hz: f32) -> Self {
        Self {
            state: 0.0,
            alpha: one_pole_alpha(freq_hz, sample_rate),
            sample_rate,
            freq: freq_hz,
        }
    }

    /// Change the cutoff frequency.
    pub fn set_frequency(&mut self, freq_hz: f32) {
        self.freq = freq_hz;
        self.alpha = one_pole_alpha(freq_hz, self.sample_rate);
    }

    /// Change the sample rate, keeping the cutoff in Hz.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.alpha = one_pole_alpha(self.freq, sample_rate);
    }

    /// Cutoff frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.freq
    }

    /// Filter one sample.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        self.state = flush_denormal(self.state + self.alpha * (x - self.state));
        self.state
    }

    /// Clear the filter memory.
    pub fn reset(&mut self) {
        self.state = 0.0;
    }

    /// Filter memory.
    pub fn state(&self) -> f32 {
        self.state
    }
}

/// One-pole (6 dB/oct) highpass: the input minus its lowpassed self.
#[derive(Debug, Clone)]
pub struct OnePoleHighpass {
    lowpass: OnePole,
}

impl OnePoleHighpass {
    /// Create a highpass with cutoff `freq_hz`.
    pub fn new(sample_rate: f32, freq_hz: f32) -> Self {
        Self {
            lowpass: OnePole::new(sample_rate, freq_hz),
        }
    }

    /// Change the cutoff frequency.
    pub fn set_frequency(&mut self, freq_hz: f32) {
        self.lowpass.set_frequency(freq_hz);
    }

    /// Change the sample rate, keeping the cutoff in Hz.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.lowpass.set_sample_rate(sample_rate);
    }

    /// Filter one sample.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        x - self.lowpass.process(x)
    }

    /// Clear the filter memory.
    pub fn reset(&mut self) {
        self.lowpass.reset();
    }

    /// Filter memory.
    pub fn state(&self) -> f32 {
        self.lowpass.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowpass_dc_gain_unity() {
        let mut lp = OnePole::new(48_000.0, 1000.0);
        let mut y = 0.0;
        for _ in 0..48_000 {
            y = lp.process(1.0);
        }
        assert!((y - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let mut hp = OnePoleHighpass::new(48_000.0, 20.0);
        let mut y = 1.0;
        for _ in 0..96_000 {
            y = hp.process(1.0);
        }
        assert!(y.abs() < 1e-3, "residual {y}");
    }

    #[test]
    fn test_alpha_formula() {
        let a = one_pole_alpha(1000.0, 48_000.0);
        let expected = 1.0 - (-core::f32::consts::TAU * 1000.0 / 48_000.0).exp();
        assert!((a - expected).abs() < 1e-6);
        assert_eq!(one_pole_alpha(0.0, 48_000.0), 0.0);
    }

    #[test]
    fn test_state_decays_to_exact_zero() {
        let mut lp = OnePole::new(48_000.0, 5000.0);
        lp.process(1.0);
        for _ in 0..100_000 {
            lp.process(0.0);
        }
        assert_eq!(lp.state(), 0.0);
    }
}
