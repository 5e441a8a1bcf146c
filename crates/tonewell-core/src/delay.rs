//! Fixed-capacity circular delay line.
//!
//! Capacity is chosen at `prepare` time to cover the longest delay an
//! engine can request at that sample rate, and the buffer never reallocates
//! afterwards.
//!
//! # Tap convention
//!
//! Taps are measured from the most recently written sample:
//! `read_int(0)` is the last value passed to [`DelayLine::write`],
//! `read_int(1)` the one before it, and so on up to `capacity - 1`.
//! A feedback structure that reads *before* writing therefore gets a delay
//! of `d + 1` samples from `read_int(d)`.
//!
//! | Use | Capacity | Read |
//! |-----|----------|------|
//! | Comb / allpass of length `L` | `L` | `read_int(L - 1)` before write |
//! | Pre-delay up to `D` samples | `D + 1` | `read_frac(d)` after write |
//! | Modulated (chorus, pitch) | max + 2 | `read_frac(d)` |

use alloc::vec;
use alloc::vec::Vec;

/// Circular buffer with integer and linearly interpolated taps.
///
/// # Example
///
/// ```rust
/// use tonewell_core::DelayLine;
///
/// let mut line = DelayLine::new(8);
/// for x in [1.0, 2.0, 3.0] {
///     line.write(x);
/// }
/// assert_eq!(line.read_int(0), 3.0);
/// assert_eq!(line.read_int(2), 1.0);
/// assert_eq!(line.read_frac(0.5), 2.5);
/// ```
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    /// Allocate a zeroed line holding `capacity` samples (at least 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(1)],
            write_pos: 0,
        }
    }

    /// Reallocate to a new capacity and clear. Not real-time safe.
    pub fn resize(&mut self, capacity: usize) {
        self.buffer = vec![0.0; capacity.max(1)];
        self.write_pos = 0;
    }

    /// Capacity in samples.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Store `x` and advance the write head.
    #[inline]
    pub fn write(&mut self, x: f32) {
        self.buffer[self.write_pos] = x;
        self.write_pos += 1;
        if self.write_pos == self.buffer.len() {
            self.write_pos = 0;
        }
    }

    /// Sample `d` positions behind the most recent write.
    ///
    /// `d` is clamped to `capacity - 1`.
    #[inline]
    pub fn read_int(&self, d: usize) -> f32 {
        let n = self.buffer.len();
        let d = d.min(n - 1);
        // write_pos - 1 - d, wrapped without a signed intermediate
        let idx = (self.write_pos + n - 1 - d) % n;
        self.buffer[idx]
    }

    /// Linearly interpolated tap at fractional distance `d`.
    ///
    /// `d` is clamped to `[0, capacity - 1]`.
    #[inline]
    pub fn read_frac(&self, d: f32) -> f32 {
        let max = (self.buffer.len() - 1) as f32;
        let d = if d.is_finite() { d.clamp(0.0, max) } else { 0.0 };
        let whole = d as usize;
        let frac = d - whole as f32;
        let a = self.read_int(whole);
        if frac == 0.0 {
            return a;
        }
        let b = self.read_int(whole + 1);
        a + (b - a) * frac
    }

    /// Zero the buffer and rewind the write head.
    pub fn mute(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    /// Raw storage, for state inspection.
    pub fn as_slice(&self) -> &[f32] {
        &self.buffer
    }

    /// Mutable access to the slot the next write will land in.
    ///
    /// Lets feedback structures read the oldest sample and overwrite it in
    /// place (`read_int(capacity - 1)` and this slot are the same cell).
    #[inline]
    pub(crate) fn head_mut(&mut self) -> &mut f32 {
        &mut self.buffer[self.write_pos]
    }

    /// Advance the write head without storing (pairs with [`head_mut`](Self::head_mut)).
    #[inline]
    pub(crate) fn advance(&mut self) {
        self.write_pos += 1;
        if self.write_pos == self.buffer.len() {
            self.write_pos = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_taps() {
        let mut line = DelayLine::new(4);
        for i in 1..=6 {
            line.write(i as f32);
        }
        // Holds 3, 4, 5, 6
        assert_eq!(line.read_int(0), 6.0);
        assert_eq!(line.read_int(3), 3.0);
        // Clamped to capacity - 1
        assert_eq!(line.read_int(10), 3.0);
    }

    #[test]
    fn test_feedback_read_before_write_delays_by_capacity() {
        let len = 5;
        let mut line = DelayLine::new(len);
        let mut out = Vec::new();
        for n in 0..12 {
            let y = line.read_int(len - 1);
            out.push(y);
            line.write(if n == 0 { 1.0 } else { 0.0 });
        }
        assert_eq!(out[len], 1.0);
        assert_eq!(out.iter().filter(|&&v| v != 0.0).count(), 1);
    }

    #[test]
    fn test_head_matches_oldest_tap() {
        let mut line = DelayLine::new(3);
        line.write(1.0);
        line.write(2.0);
        line.write(3.0);
        assert_eq!(line.read_int(2), 1.0);
        assert_eq!(*line.head_mut(), 1.0);
        *line.head_mut() = 9.0;
        line.advance();
        assert_eq!(line.read_int(0), 9.0);
    }

    #[test]
    fn test_fractional_interpolation() {
        let mut line = DelayLine::new(8);
        line.write(0.0);
        line.write(1.0);
        assert!((line.read_frac(0.25) - 0.75).abs() < 1e-6);
        assert_eq!(line.read_frac(f32::NAN), 1.0);
        assert_eq!(line.read_frac(-3.0), 1.0);
    }

    #[test]
    fn test_mute() {
        let mut line = DelayLine::new(4);
        line.write(1.0);
        line.mute();
        assert!(line.as_slice().iter().all(|&s| s == 0.0));
        assert_eq!(line.read_int(0), 0.0);
    }
}
