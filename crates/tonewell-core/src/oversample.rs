//! Cascaded 2× polyphase oversampling with a linear-phase Kaiser FIR.
//!
//! Nonlinear stages generate harmonics far above the base Nyquist; run at
//! the base rate those harmonics fold back into the audible band. The
//! [`Oversampler`] runs a caller-supplied per-sample closure at `N×` the
//! base rate instead:
//!
//! ```text
//! x ─▶ ↑2 ─▶ ↑2 ─▶ ↑2 ─▶ f(·) ─▶ ↓2 ─▶ ↓2 ─▶ ↓2 ─▶ y        (N = 8)
//! ```
//!
//! Every stage uses the same 256-tap windowed-sinc lowpass (Kaiser window,
//! β ≈ 10.06, cutoff at a quarter of the stage's high rate). Because each
//! stage only doubles the rate, the cutoff always sits at that stage's own
//! low-rate Nyquist, and the fixed filter length buys a much deeper
//! stopband than a single `N×` filter would: passband ripple stays below
//! 10⁻⁵ and rejection exceeds 100 dB from 0.53× the stage's low rate.
//!
//! - **Upsampling** is polyphase: the zero-stuffed samples are never
//!   multiplied, each output phase uses the even or odd half of the taps,
//!   and the result is scaled by 2.
//! - **Downsampling** filters the high-rate stream and keeps the second of
//!   every pair of samples.
//!
//! Up to four stages (16×) are supported. If `sample_rate × factor` would
//! exceed [`MAX_INTERNAL_RATE`], the factor is halved until it fits.
//!
//! ## Usage
//!
//! ```rust
//! use tonewell_core::Oversampler;
//! use tonewell_core::math::hard_clip;
//!
//! let mut os = Oversampler::new(8);
//! os.prepare(48_000.0);
//! assert_eq!(os.factor(), 8);
//!
//! let y = os.process_sample(0.9, |v| hard_clip(v, 0.5));
//! assert!(y.is_finite());
//! assert_eq!(os.latency_samples(), 222);
//! ```

use alloc::vec;
use alloc::vec::Vec;
use core::f64::consts::PI;

/// Number of FIR taps per stage.
pub const FIR_TAPS: usize = 256;

/// Highest supported factor (four 2× stages).
pub const MAX_FACTOR: usize = 16;

/// Highest internal rate an oversampler will run at, in Hz.
pub const MAX_INTERNAL_RATE: f32 = 768_000.0;

/// Kaiser β for roughly 100 dB of stopband rejection.
const KAISER_BETA: f64 = 10.06;

/// Group delay of one up/down stage pair, in samples at that stage's low
/// rate. The two FIRs contribute `255` high-rate samples and keeping the
/// odd phase of the decimator removes one.
const STAGE_DELAY: f32 = 127.0;

const HALF_TAPS: usize = FIR_TAPS / 2;

/// Zeroth-order modified Bessel function of the first kind.
fn bessel_i0(x: f64) -> f64 {
    let mut sum = 1.0;
    let mut term = 1.0;
    let half = x / 2.0;
    let mut k = 1.0;
    loop {
        term *= (half / k) * (half / k);
        sum += term;
        if term < sum * 1e-12 {
            return sum;
        }
        k += 1.0;
    }
}

/// Design the half-band anti-imaging / anti-aliasing lowpass.
///
/// Windowed sinc with cutoff at 0.25 cycles/sample, normalized to unity
/// DC gain.
pub fn design_halfband_fir() -> Vec<f32> {
    let centre = (FIR_TAPS - 1) as f64 / 2.0;
    let norm = bessel_i0(KAISER_BETA);
    let mut taps: Vec<f64> = (0..FIR_TAPS)
        .map(|n| {
            let m = n as f64 - centre;
            let arg = 0.5 * m;
            let sinc = if arg == 0.0 {
                1.0
            } else {
                libm::sin(PI * arg) / (PI * arg)
            };
            let r = 2.0 * n as f64 / (FIR_TAPS - 1) as f64 - 1.0;
            let window = bessel_i0(KAISER_BETA * libm::sqrt((1.0 - r * r).max(0.0))) / norm;
            0.5 * sinc * window
        })
        .collect();
    let dc: f64 = taps.iter().sum();
    for t in &mut taps {
        *t /= dc;
    }
    taps.into_iter().map(|t| t as f32).collect()
}

/// History buffer stored twice so the newest `len` samples are always one
/// contiguous slice, newest first.
#[derive(Debug, Clone)]
struct History {
    buf: Vec<f32>,
    pos: usize,
    len: usize,
}

impl History {
    fn new(len: usize) -> Self {
        Self {
            buf: vec![0.0; 2 * len],
            pos: 0,
            len,
        }
    }

    #[inline]
    fn push(&mut self, x: f32) {
        self.pos = if self.pos == 0 { self.len - 1 } else { self.pos - 1 };
        self.buf[self.pos] = x;
        self.buf[self.pos + self.len] = x;
    }

    #[inline]
    fn window(&self) -> &[f32] {
        &self.buf[self.pos..self.pos + self.len]
    }

    fn clear(&mut self) {
        self.buf.fill(0.0);
        self.pos = 0;
    }
}

#[inline]
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// One 2× up/down stage pair.
#[derive(Debug, Clone)]
struct Stage {
    up: History,
    down: History,
}

impl Stage {
    fn new() -> Self {
        Self {
            up: History::new(HALF_TAPS),
            down: History::new(FIR_TAPS),
        }
    }

    /// One low-rate sample in, two high-rate samples out.
    #[inline]
    fn upsample(&mut self, x: f32, even: &[f32], odd: &[f32]) -> (f32, f32) {
        self.up.push(x);
        let w = self.up.window();
        (2.0 * dot(even, w), 2.0 * dot(odd, w))
    }

    /// Two high-rate samples in, one low-rate sample out.
    #[inline]
    fn downsample(&mut self, a: f32, b: f32, taps: &[f32]) -> f32 {
        self.down.push(a);
        self.down.push(b);
        dot(taps, self.down.window())
    }

    fn reset(&mut self) {
        self.up.clear();
        self.down.clear();
    }
}

/// Integer-factor oversampler built from cascaded 2× stages.
#[derive(Debug, Clone)]
pub struct Oversampler {
    taps: Vec<f32>,
    even: Vec<f32>,
    odd: Vec<f32>,
    stages: Vec<Stage>,
    requested: usize,
    factor: usize,
    scratch: Vec<f32>,
    spare: Vec<f32>,
}

impl Oversampler {
    /// Create an oversampler asking for `factor`×.
    ///
    /// The factor is rounded down to a power of two in `1..=16`. Buffers
    /// are allocated by [`prepare`](Self::prepare).
    pub fn new(factor: usize) -> Self {
        let requested = normalize_factor(factor);
        Self {
            taps: Vec::new(),
            even: Vec::new(),
            odd: Vec::new(),
            stages: Vec::new(),
            requested,
            factor: 1,
            scratch: vec![0.0; 1],
            spare: vec![0.0; 1],
        }
    }

    /// Design the filter and allocate stage state for `sample_rate`.
    ///
    /// Reduces the factor when the internal rate would exceed
    /// [`MAX_INTERNAL_RATE`]. Never fails.
    pub fn prepare(&mut self, sample_rate: f32) {
        let mut factor = self.requested;
        while factor > 1 && sample_rate * factor as f32 > MAX_INTERNAL_RATE {
            factor /= 2;
        }
        #[cfg(feature = "tracing")]
        if factor != self.requested {
            tracing::debug!(
                requested = self.requested,
                factor,
                sample_rate,
                "oversampling factor reduced to stay under the internal rate limit"
            );
        }
        self.factor = factor;

        if self.taps.is_empty() {
            self.taps = design_halfband_fir();
            self.even = self.taps.iter().step_by(2).copied().collect();
            self.odd = self.taps.iter().skip(1).step_by(2).copied().collect();
        }
        let stages = factor.trailing_zeros() as usize;
        self.stages = (0..stages).map(|_| Stage::new()).collect();
        self.scratch = vec![0.0; factor];
        self.spare = vec![0.0; factor];
    }

    /// Factor asked for at construction.
    pub fn requested_factor(&self) -> usize {
        self.requested
    }

    /// Factor in effect after `prepare`.
    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Latency in base-rate samples, rounded to the nearest integer.
    pub fn latency_samples(&self) -> usize {
        let mut total = 0.0f32;
        let mut scale = 1.0f32;
        for _ in &self.stages {
            total += STAGE_DELAY * scale;
            scale *= 0.5;
        }
        libm::roundf(total) as usize
    }

    /// Run `f` on `factor` high-rate samples derived from `x` and return
    /// the decimated result.
    ///
    /// With a factor of 1 this is exactly `f(x)`.
    #[inline]
    pub fn process_sample(&mut self, x: f32, mut f: impl FnMut(f32) -> f32) -> f32 {
        if self.stages.is_empty() {
            return f(x);
        }

        // Interpolate: the active run doubles after each stage.
        self.scratch[0] = x;
        let mut len = 1;
        for stage in &mut self.stages {
            for i in 0..len {
                let (a, b) = stage.upsample(self.scratch[i], &self.even, &self.odd);
                self.spare[2 * i] = a;
                self.spare[2 * i + 1] = b;
            }
            len *= 2;
            core::mem::swap(&mut self.scratch, &mut self.spare);
        }

        for s in &mut self.scratch[..len] {
            *s = f(*s);
        }

        // Decimate in place: slot i is written only after slots 2i, 2i+1 are read.
        for stage in self.stages.iter_mut().rev() {
            len /= 2;
            for i in 0..len {
                let y = stage.downsample(self.scratch[2 * i], self.scratch[2 * i + 1], &self.taps);
                self.scratch[i] = y;
            }
        }
        self.scratch[0]
    }

    /// Clear all filter histories.
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
        self.scratch.fill(0.0);
        self.spare.fill(0.0);
    }

    /// Visit every state word.
    pub fn inspect(&self, f: &mut dyn FnMut(f32)) {
        for stage in &self.stages {
            for &s in stage.up.buf.iter().chain(stage.down.buf.iter()) {
                f(s);
            }
        }
    }
}

fn normalize_factor(factor: usize) -> usize {
    let clamped = factor.clamp(1, MAX_FACTOR);
    // Largest power of two not above the request.
    1 << (usize::BITS - 1 - clamped.leading_zeros())
}
