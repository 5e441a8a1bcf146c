//! Biquad (bi-quadratic) filter.
//!
//! Second-order IIR section in transposed direct form II:
//!
//! ```text
//! y  = b0 x + s1
//! s1 = b1 x - a1 y + s2
//! s2 = b2 x - a2 y
//! ```
//!
//! Coefficients follow the RBJ Audio EQ Cookbook and are computed in `f64`
//! before being narrowed, which keeps low-frequency sections accurate.
//! Coefficient updates happen between samples only; callers that sweep a
//! cutoff should drive it from a smoothed parameter.

use core::f64::consts::PI;
use libm::{cos, pow, sin, sqrt};

use crate::math::flush_denormal;

/// Filter response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiquadKind {
    /// 12 dB/oct lowpass.
    Lowpass,
    /// 12 dB/oct highpass.
    Highpass,
    /// Bandpass with 0 dB peak gain.
    Bandpass,
    /// Band reject.
    Notch,
    /// Peaking EQ bell.
    Peak,
    /// Low shelf.
    LowShelf,
    /// High shelf.
    HighShelf,
}

/// Normalized biquad coefficients (`a0 == 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    /// Feedforward taps.
    pub b0: f32,
    /// Feedforward taps.
    pub b1: f32,
    /// Feedforward taps.
    pub b2: f32,
    /// Feedback taps.
    pub a1: f32,
    /// Feedback taps.
    pub a2: f32,
}

impl BiquadCoeffs {
    /// Identity section.
    pub const PASSTHROUGH: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Design a section with the RBJ cookbook formulas.
    ///
    /// `freq` is clamped to `[1 Hz, 0.49 fs]` and `q` to at least 0.01.
    /// `gain_db` only affects [`BiquadKind::Peak`] and the shelves.
    pub fn design(kind: BiquadKind, freq: f32, q: f32, gain_db: f32, sample_rate: f32) -> Self {
        let fs = f64::from(sample_rate.max(1.0));
        let f = f64::from(freq).clamp(1.0, fs * 0.49);
        let q = f64::from(q).max(0.01);
        let w0 = 2.0 * PI * f / fs;
        let (cw, sw) = (cos(w0), sin(w0));
        let alpha = sw / (2.0 * q);
        let a = pow(10.0, f64::from(gain_db) / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match kind {
            BiquadKind::Lowpass => {
                let b = (1.0 - cw) / 2.0;
                (b, 1.0 - cw, b, 1.0 + alpha, -2.0 * cw, 1.0 - alpha)
            }
            BiquadKind::Highpass => {
                let b = (1.0 + cw) / 2.0;
                (b, -(1.0 + cw), b, 1.0 + alpha, -2.0 * cw, 1.0 - alpha)
            }
            BiquadKind::Bandpass => (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cw, 1.0 - alpha),
            BiquadKind::Notch => (1.0, -2.0 * cw, 1.0, 1.0 + alpha, -2.0 * cw, 1.0 - alpha),
            BiquadKind::Peak => (
                1.0 + alpha * a,
                -2.0 * cw,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cw,
                1.0 - alpha / a,
            ),
            BiquadKind::LowShelf => {
                let k = 2.0 * sqrt(a) * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cw + k),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cw),
                    a * ((a + 1.0) - (a - 1.0) * cw - k),
                    (a + 1.0) + (a - 1.0) * cw + k,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cw),
                    (a + 1.0) + (a - 1.0) * cw - k,
                )
            }
            BiquadKind::HighShelf => {
                let k = 2.0 * sqrt(a) * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cw + k),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cw),
                    a * ((a + 1.0) + (a - 1.0) * cw - k),
                    (a + 1.0) - (a - 1.0) * cw + k,
                    2.0 * ((a - 1.0) - (a + 1.0) * cw),
                    (a + 1.0) - (a - 1.0) * cw - k,
                )
            }
        };

        Self {
            b0: (b0 / a0) as f32,
            b1: (b1 / a0) as f32,
            b2: (b2 / a0) as f32,
            a1: (a1 / a0) as f32,
            a2: (a2 / a0) as f32,
        }
    }

    /// Magnitude response at `freq` Hz.
    pub fn magnitude(&self, freq: f32, sample_rate: f32) -> f32 {
        let w = 2.0 * PI * f64::from(freq) / f64::from(sample_rate);
        let (c1, s1) = (cos(w), sin(w));
        let (c2, s2) = (cos(2.0 * w), sin(2.0 * w));
        let (b0, b1, b2) = (f64::from(self.b0), f64::from(self.b1), f64::from(self.b2));
        let (a1, a2) = (f64::from(self.a1), f64::from(self.a2));
        let num_re = b0 + b1 * c1 + b2 * c2;
        let num_im = -(b1 * s1 + b2 * s2);
        let den_re = 1.0 + a1 * c1 + a2 * c2;
        let den_im = -(a1 * s1 + a2 * s2);
        sqrt((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)) as f32
    }
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::PASSTHROUGH
    }
}

/// Transposed direct form II biquad section.
///
/// # Example
///
/// ```rust
/// use tonewell_core::{Biquad, BiquadKind};
///
/// let mut lp = Biquad::new();
/// lp.design(BiquadKind::Lowpass, 1000.0, 0.707, 0.0, 48000.0);
/// let y = lp.process(1.0);
/// assert!(y > 0.0 && y < 1.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Biquad {
    coeffs: BiquadCoeffs,
    s1: f32,
    s2: f32,
}

impl Biquad {
    /// Create a passthrough section.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a section with the given coefficients.
    pub fn with_coeffs(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            s1: 0.0,
            s2: 0.0,
        }
    }

    /// Replace the coefficients, keeping the state.
    #[inline]
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }

    /// Redesign in place (see [`BiquadCoeffs::design`]).
    pub fn design(&mut self, kind: BiquadKind, freq: f32, q: f32, gain_db: f32, sample_rate: f32) {
        self.coeffs = BiquadCoeffs::design(kind, freq, q, gain_db, sample_rate);
    }

    /// Current coefficients.
    pub fn coeffs(&self) -> BiquadCoeffs {
        self.coeffs
    }

    /// Filter one sample.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let c = &self.coeffs;
        let y = c.b0 * x + self.s1;
        self.s1 = flush_denormal(c.b1 * x - c.a1 * y + self.s2);
        self.s2 = flush_denormal(c.b2 * x - c.a2 * y);
        y
    }

    /// Clear the filter memory.
    pub fn reset(&mut self) {
        self.s1 = 0.0;
        self.s2 = 0.0;
    }

    /// Filter memory `[s1, s2]`.
    pub fn state(&self) -> [f32; 2] {
        [self.s1, self.s2]
    }
}
