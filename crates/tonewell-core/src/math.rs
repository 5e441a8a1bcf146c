//! Mathematical utility functions for DSP.
//!
//! Everything here is allocation-free, branch-light and `no_std` friendly.
//!
//! # Level Conversions
//!
//! - [`db_to_linear`] / [`linear_to_db`] - Convert between dB and linear gain
//!
//! # Waveshaping
//!
//! | Function | Character | Harmonics | Bounded to |
//! |----------|-----------|-----------|------------|
//! | [`soft_clip`] | Smooth, warm | Odd | (-1, 1) |
//! | [`cubic_clip`] | Gentle knee, hard ceiling | Odd (low order) | \[-1, 1\] |
//! | [`hard_clip`] | Harsh, buzzy | Odd (many) | \[-t, t\] |
//! | [`tube_curve`] | Asymmetric | Even + Odd | (-1.2, 0.8) |
//! | [`fold`] | Metallic, synthy | Dense | \[-t, t\] |
//!
//! # Safety Net
//!
//! - [`flush_denormal`] - applied on every IIR state store
//! - [`sanitize`] - applied to every engine output sample

use libm::{expf, fmodf, logf, tanhf};

/// Largest magnitude an engine is allowed to emit.
///
/// Output samples are clamped just inside ±4 so that the "no explosion"
/// bound holds even when a user drives every gain stage to its maximum.
pub const SAFE_PEAK: f32 = 3.99;

/// Convert decibels to linear gain.
///
/// # Example
/// ```rust
/// use tonewell_core::db_to_linear;
///
/// assert!((db_to_linear(0.0) - 1.0).abs() < 0.001);
/// assert!((db_to_linear(-6.02) - 0.5).abs() < 0.01);
/// ```
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    // 10^(dB/20) = e^(dB * ln(10)/20)
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    expf(db * FACTOR)
}

/// Convert linear gain to decibels.
///
/// Inputs at or below 1e-10 report -200 dB instead of negative infinity.
///
/// # Example
/// ```rust
/// use tonewell_core::linear_to_db;
///
/// assert!((linear_to_db(1.0) - 0.0).abs() < 0.001);
/// assert!((linear_to_db(0.5) - (-6.02)).abs() < 0.01);
/// ```
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    const FACTOR: f32 = 20.0 / core::f32::consts::LN_10;
    logf(linear.max(1e-10)) * FACTOR
}

/// Soft clip using hyperbolic tangent.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    tanhf(x)
}

/// Cubic soft clipper: `1.5 (x - x³/3)` inside ±1, flat outside.
///
/// Reaches the ceiling with zero slope, so the knee is smooth but the
/// output never exceeds ±1.
#[inline]
pub fn cubic_clip(x: f32) -> f32 {
    let x = x.clamp(-1.0, 1.0);
    1.5 * (x - x * x * x / 3.0)
}

/// Hard clip to ±threshold.
///
/// # Arguments
/// * `x` - Input sample
/// * `threshold` - Clipping threshold
#[inline]
pub fn hard_clip(x: f32, threshold: f32) -> f32 {
    x.clamp(-threshold, threshold)
}

/// Asymmetric tube-style curve.
///
/// A biased `tanh` with the bias subtracted again, so `tube_curve(0) == 0`
/// while positive and negative excursions saturate at different levels.
/// The asymmetry is what produces the second harmonic.
#[inline]
pub fn tube_curve(x: f32) -> f32 {
    const BIAS: f32 = 0.2;
    // exact zero at x = 0
    tanhf(x + BIAS) - tanhf(BIAS)
}

/// Reflect `x` back into `[-threshold, threshold]` until it is in range.
///
/// Equivalent to repeatedly applying `x = 2t - x` above `t` and
/// `x = -2t - x` below `-t`, computed in closed form so the cost does not
/// depend on how far out of range the input is.
///
/// Returns 0 for a non-positive threshold.
///
/// # Example
/// ```rust
/// use tonewell_core::math::fold;
///
/// assert!((fold(0.7, 0.5) - 0.3).abs() < 1e-6);
/// assert!((fold(-1.3, 0.5) - 0.3).abs() < 1e-6);
/// assert_eq!(fold(0.2, 0.5), 0.2);
/// ```
#[inline]
pub fn fold(x: f32, threshold: f32) -> f32 {
    if threshold <= 0.0 {
        return 0.0;
    }
    if x.abs() <= threshold {
        return x;
    }
    // Triangle wave of period 4t, shifted so that [-t, t] maps to itself.
    let width = 2.0 * threshold;
    let period = 2.0 * width;
    let mut m = fmodf(x + threshold, period);
    if m < 0.0 {
        m += period;
    }
    if m > width {
        m = period - m;
    }
    m - threshold
}

/// Linear interpolation between two values.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Flush near-subnormal floats to zero.
///
/// Values below 1e-20 are replaced with zero, well before the IEEE 754
/// subnormal range (< 1.18e-38) begins. Apply on every store into a
/// recursive state variable.
///
/// Reference: IEEE 754-2008, Section 3.4 (Subnormal numbers)
#[allow(clippy::inline_always)]
#[inline(always)]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1e-20 { 0.0 } else { x }
}

/// Replace non-finite values with zero and clamp to [`SAFE_PEAK`].
#[inline]
pub fn sanitize(x: f32) -> f32 {
    if x.is_finite() {
        x.clamp(-SAFE_PEAK, SAFE_PEAK)
    } else {
        0.0
    }
}

/// Crossfade between dry and wet signals.
///
/// Written as `dry * (1 - mix) + wet * mix` so that `mix == 0.0` returns
/// `dry` bit-exactly (and `mix == 1.0` returns `wet`), even when the wet
/// signal is large.
///
/// # Arguments
/// * `dry` - Unprocessed signal
/// * `wet` - Processed signal
/// * `mix` - Blend factor in \[0.0, 1.0\]: 0.0 = all dry, 1.0 = all wet
#[inline]
pub fn wet_dry_mix(dry: f32, wet: f32, mix: f32) -> f32 {
    dry * (1.0 - mix) + wet * mix
}

/// Sum stereo to mono (average).
#[inline]
pub fn mono_sum(left: f32, right: f32) -> f32 {
    (left + right) * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_linear_roundtrip() {
        let original = 0.5;
        let back = db_to_linear(linear_to_db(original));
        assert!((original - back).abs() < 1e-5);
    }

    #[test]
    fn test_linear_to_db_floor() {
        assert!(linear_to_db(0.0) <= -199.0);
    }

    #[test]
    fn test_cubic_clip_bounds() {
        assert_eq!(cubic_clip(0.0), 0.0);
        assert!((cubic_clip(1.0) - 1.0).abs() < 1e-6);
        assert!((cubic_clip(50.0) - 1.0).abs() < 1e-6);
        assert!((cubic_clip(-50.0) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_tube_curve_is_asymmetric() {
        assert_eq!(tube_curve(0.0), 0.0);
        let pos = tube_curve(3.0);
        let neg = tube_curve(-3.0);
        assert!(pos > 0.0 && neg < 0.0);
        assert!(neg.abs() > pos.abs(), "negative half should saturate later");
    }

    #[test]
    fn test_fold_matches_iterative_reflection() {
        fn iterative(mut x: f32, t: f32) -> f32 {
            for _ in 0..1000 {
                if x > t {
                    x = 2.0 * t - x;
                } else if x < -t {
                    x = -2.0 * t - x;
                } else {
                    break;
                }
            }
            x
        }
        for i in -400..=400 {
            let x = i as f32 * 0.037;
            for &t in &[0.1_f32, 0.25, 0.5, 1.0] {
                let a = fold(x, t);
                let b = iterative(x, t);
                assert!((a - b).abs() < 1e-4, "x={x} t={t}: {a} vs {b}");
                assert!(a.abs() <= t + 1e-6);
            }
        }
    }

    #[test]
    fn test_fold_zero_threshold() {
        assert_eq!(fold(0.5, 0.0), 0.0);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize(f32::NAN), 0.0);
        assert_eq!(sanitize(f32::INFINITY), 0.0);
        assert_eq!(sanitize(f32::NEG_INFINITY), 0.0);
        assert_eq!(sanitize(100.0), SAFE_PEAK);
        assert_eq!(sanitize(-100.0), -SAFE_PEAK);
        assert_eq!(sanitize(0.25), 0.25);
    }

    #[test]
    fn test_wet_dry_mix_endpoints_exact() {
        let dry = 0.123_456_7;
        let wet = 3.75;
        assert_eq!(wet_dry_mix(dry, wet, 0.0), dry);
        assert_eq!(wet_dry_mix(dry, wet, 1.0), wet);
        assert!((wet_dry_mix(0.0, 1.0, 0.25) - 0.25).abs() < 1e-7);
    }

    #[test]
    fn test_flush_denormal() {
        assert_eq!(flush_denormal(1.0), 1.0);
        assert_eq!(flush_denormal(-0.5), -0.5);
        assert_eq!(flush_denormal(1e-10), 1e-10);
        assert_eq!(flush_denormal(1e-21), 0.0);
        assert_eq!(flush_denormal(-1e-21), 0.0);
        assert_eq!(flush_denormal(1e-38), 0.0);
        assert_eq!(flush_denormal(0.0), 0.0);
    }
}
