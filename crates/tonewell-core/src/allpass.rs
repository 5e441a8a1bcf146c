//! Schroeder allpass diffuser.
//!
//! ```text
//! w = x + g · buffer[n - M]
//! y = -g · w + buffer[n - M]
//! buffer[n] = w
//! ```
//!
//! Transfer function `(-g + z^-M) / (1 - g z^-M)`: unit magnitude at every
//! frequency, so cascading several smears reflections in time without
//! colouring the spectrum.

use crate::delay::DelayLine;
use crate::math::flush_denormal;

/// Schroeder allpass filter.
///
/// # Example
///
/// ```rust
/// use tonewell_core::AllpassFilter;
///
/// let mut ap = AllpassFilter::new(3);
/// ap.set_feedback(0.5);
/// assert_eq!(ap.process(1.0), -0.5);
/// ```
#[derive(Debug, Clone)]
pub struct AllpassFilter {
    line: DelayLine,
    feedback: f32,
}

impl AllpassFilter {
    /// Create an allpass with a delay of `length` samples.
    pub fn new(length: usize) -> Self {
        Self {
            line: DelayLine::new(length),
            feedback: 0.5,
        }
    }

    /// Feedback coefficient `g` (clamped to `[-0.95, 0.95]`).
    #[inline]
    pub fn set_feedback(&mut self, g: f32) {
        self.feedback = g.clamp(-0.95, 0.95);
    }

    /// Process one sample.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let g = self.feedback;
        let slot = self.line.head_mut();
        let delayed = *slot;
        let w = flush_denormal(x + g * delayed);
        *slot = w;
        self.line.advance();
        flush_denormal(-g * w + delayed)
    }

    /// Clear the buffer.
    pub fn reset(&mut self) {
        self.line.mute();
    }

    /// Visit every state word.
    pub fn inspect(&self, f: &mut dyn FnMut(f32)) {
        for &s in self.line.as_slice() {
            f(s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impulse_energy_is_preserved() {
        let mut ap = AllpassFilter::new(23);
        ap.set_feedback(0.6);
        let energy: f32 = (0..20_000)
            .map(|n| ap.process(if n == 0 { 1.0 } else { 0.0 }))
            .map(|y| y * y)
            .sum();
        assert!((energy - 1.0).abs() < 1e-4, "energy {energy}");
    }

    #[test]
    fn test_impulse_response_head() {
        let mut ap = AllpassFilter::new(4);
        ap.set_feedback(0.5);
        let h: Vec<f32> = (0..9)
            .map(|n| ap.process(if n == 0 { 1.0 } else { 0.0 }))
            .collect();
        assert_eq!(h[0], -0.5);
        assert!((h[4] - 0.75).abs() < 1e-6);
        assert!((h[8] - 0.375).abs() < 1e-6);
    }

    #[test]
    fn test_reset_clears() {
        let mut ap = AllpassFilter::new(5);
        ap.process(1.0);
        ap.reset();
        assert!((0..20).all(|_| ap.process(0.0) == 0.0));
    }
}
