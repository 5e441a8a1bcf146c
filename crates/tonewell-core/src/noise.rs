//! Deterministic noise sources.
//!
//! A 32-bit linear congruential generator (Numerical Recipes constants) is
//! plenty for dither and analog noise modeling, costs one multiply-add per
//! draw and, unlike a system RNG, can be reseeded on `reset()` so that
//! processing stays reproducible.

/// Seed used when an engine does not pick its own.
pub const DEFAULT_SEED: u32 = 0x2545_F491;

/// Linear congruential noise generator.
#[derive(Debug, Clone)]
pub struct NoiseGen {
    state: u32,
    seed: u32,
}

impl NoiseGen {
    /// Create a generator with the given seed.
    pub const fn new(seed: u32) -> Self {
        Self { state: seed, seed }
    }

    /// Restart the sequence from the construction seed.
    pub fn reseed(&mut self) {
        self.state = self.seed;
    }

    #[inline]
    fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(1_664_525)
            .wrapping_add(1_013_904_223);
        self.state
    }

    /// Uniform value in `[0, 1)` built from the upper 16 bits.
    #[inline]
    pub fn next_unipolar(&mut self) -> f32 {
        (self.next_u32() >> 16) as f32 / 65536.0
    }

    /// Uniform value in `[-1, 1)`.
    #[inline]
    pub fn next_bipolar(&mut self) -> f32 {
        self.next_unipolar() * 2.0 - 1.0
    }

    /// Triangular-PDF value in `[-1, 1)`: the difference of two uniforms.
    #[inline]
    pub fn next_tpdf(&mut self) -> f32 {
        self.next_unipolar() - self.next_unipolar()
    }
}

impl Default for NoiseGen {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}
