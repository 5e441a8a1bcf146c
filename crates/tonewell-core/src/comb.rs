//! Damped feedback comb filter for Schroeder-style reverbs.
//!
//! ```text
//! y        = buffer[n - L]
//! fb_state = y (1 - d) + fb_state d
//! buffer[n] = x + fb_state g
//! ```
//!
//! The one-pole lowpass in the loop makes high frequencies die out faster
//! than lows, the way air and wall absorption do. With `d = 0` and `g = 1`
//! the loop is lossless (freeze).

use crate::delay::DelayLine;
use crate::math::flush_denormal;

/// Feedback comb filter with in-loop damping.
///
/// # Example
///
/// ```rust
/// use tonewell_core::CombFilter;
///
/// let mut comb = CombFilter::new(4);
/// comb.set_feedback(0.5);
/// comb.set_damping(0.0);
///
/// let out: Vec<f32> = (0..9).map(|n| comb.process(if n == 0 { 1.0 } else { 0.0 })).collect();
/// assert_eq!(out[4], 1.0);
/// assert_eq!(out[8], 0.5);
/// ```
#[derive(Debug, Clone)]
pub struct CombFilter {
    line: DelayLine,
    feedback: f32,
    damping: f32,
    fb_state: f32,
}

impl CombFilter {
    /// Create a comb with a loop length of `length` samples.
    pub fn new(length: usize) -> Self {
        Self {
            line: DelayLine::new(length),
            feedback: 0.5,
            damping: 0.0,
            fb_state: 0.0,
        }
    }

    /// Loop length in samples.
    pub fn length(&self) -> usize {
        self.line.capacity()
    }

    /// Feedback gain `g` (clamped to `[0, 1]`).
    #[inline]
    pub fn set_feedback(&mut self, g: f32) {
        self.feedback = g.clamp(0.0, 1.0);
    }

    /// Current feedback gain.
    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    /// Damping `d` (clamped to `[0, 1)`).
    #[inline]
    pub fn set_damping(&mut self, d: f32) {
        self.damping = d.clamp(0.0, 0.999);
    }

    /// Feed one sample, return the delayed output.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let slot = self.line.head_mut();
        let y = *slot;
        self.fb_state = flush_denormal(y * (1.0 - self.damping) + self.fb_state * self.damping);
        *slot = flush_denormal(x + self.fb_state * self.feedback);
        self.line.advance();
        y
    }

    /// Clear the loop.
    pub fn reset(&mut self) {
        self.line.mute();
        self.fb_state = 0.0;
    }

    /// Visit every state word.
    pub fn inspect(&self, f: &mut dyn FnMut(f32)) {
        f(self.fb_state);
        for &s in self.line.as_slice() {
            f(s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decay_rate_matches_feedback() {
        let mut comb = CombFilter::new(10);
        comb.set_feedback(0.8);
        comb.set_damping(0.0);
        let out: Vec<f32> = (0..40)
            .map(|n| comb.process(if n == 0 { 1.0 } else { 0.0 }))
            .collect();
        assert_eq!(out[10], 1.0);
        assert!((out[20] - 0.8).abs() < 1e-6);
        assert!((out[30] - 0.64).abs() < 1e-6);
    }

    #[test]
    fn test_damping_lowers_energy() {
        let energy = |d: f32| {
            let mut comb = CombFilter::new(50);
            comb.set_feedback(0.9);
            comb.set_damping(d);
            (0..5000)
                .map(|n| comb.process(if n == 0 { 1.0 } else { 0.0 }))
                .map(|y| y * y)
                .sum::<f32>()
        };
        assert!(energy(0.4) < energy(0.0));
    }

    #[test]
    fn test_freeze_is_lossless() {
        let mut comb = CombFilter::new(8);
        comb.set_feedback(1.0);
        comb.set_damping(0.0);
        for n in 0..8 {
            comb.process(if n == 0 { 1.0 } else { 0.0 });
        }
        let mut last = 0.0;
        for _ in 0..1000 {
            let y = comb.process(0.0);
            if y != 0.0 {
                last = y;
            }
        }
        assert_eq!(last, 1.0);
    }

    #[test]
    fn test_no_subnormals_after_long_silence() {
        let mut comb = CombFilter::new(37);
        comb.set_feedback(0.7);
        comb.set_damping(0.3);
        comb.process(1.0);
        for _ in 0..200_000 {
            comb.process(0.0);
        }
        comb.inspect(&mut |s| assert!(s == 0.0 || s.abs() >= f32::MIN_POSITIVE));
    }
}
