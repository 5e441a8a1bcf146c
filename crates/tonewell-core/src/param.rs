//! Lock-free parameter targets with audio-thread smoothing.
//!
//! A parameter is split in two halves that live on different threads:
//!
//! - [`ParamCell`]: the *target*, an `f32` bit-cast into an `AtomicU32`.
//!   Any thread may store into it; stores are clamped to `[0, 1]`.
//! - [`Smoother`]: the *current* value, owned by the audio thread, which
//!   glides toward the target with a one-pole lowpass.
//!
//! [`ParamBank`] groups an engine's cells behind an `Arc` so control
//! threads can hold a cheap clone of it without retaining any pointer into
//! the engine. [`SmoothedParam`] pairs a bank slot with its smoother.
//!
//! ## Usage
//!
//! ```rust
//! use tonewell_core::{ParamBank, ParamDescriptor, SmoothedParam};
//!
//! static TABLE: [ParamDescriptor; 1] = [ParamDescriptor::mix(0, 1.0)];
//!
//! let bank = ParamBank::new(&TABLE);
//! let mut mix = SmoothedParam::new(&bank, 0);
//! mix.prepare(48_000.0);
//!
//! // Control thread
//! let remote = bank.clone();
//! remote.update(&[(0, 0.0), (7, 0.5)]); // index 7 is ignored
//!
//! // Audio thread: glides from 1.0 toward 0.0 over ~20 ms
//! let first = mix.next();
//! assert!(first < 1.0 && first > 0.9);
//! ```

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::math::flush_denormal;
use crate::param_info::ParamDescriptor;
use libm::expf;

/// Default smoothing time constant in milliseconds.
pub const DEFAULT_SMOOTHING_MS: f32 = 20.0;

/// Distance below which a smoother snaps onto its target.
const SNAP_EPSILON: f32 = 1e-6;

/// Atomic normalized parameter target.
///
/// Relaxed ordering is sufficient: there is a single scalar per cell, so
/// reads are never torn, and the smoother absorbs any staleness.
#[derive(Debug)]
pub struct ParamCell(AtomicU32);

impl ParamCell {
    /// Create a cell holding `value` (clamped to `[0, 1]`).
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(clamp_unit(value).to_bits()))
    }

    /// Store a new target. NaN is ignored.
    #[inline]
    pub fn set(&self, value: f32) {
        if value.is_nan() {
            return;
        }
        self.0.store(clamp_unit(value).to_bits(), Ordering::Relaxed);
    }

    /// Load the current target.
    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

#[inline]
fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Shared table of parameter targets for one engine instance.
///
/// Cloning is cheap (an `Arc` bump) and every clone addresses the same cells.
#[derive(Debug, Clone)]
pub struct ParamBank {
    cells: Arc<[ParamCell]>,
    descriptors: &'static [ParamDescriptor],
}

impl ParamBank {
    /// Allocate one cell per descriptor, initialised to its default.
    pub fn new(descriptors: &'static [ParamDescriptor]) -> Self {
        let cells: Arc<[ParamCell]> = descriptors
            .iter()
            .map(|d| ParamCell::new(d.default))
            .collect();
        Self { cells, descriptors }
    }

    /// Number of parameters.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if the bank has no parameters.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Descriptor table this bank was built from.
    pub fn descriptors(&self) -> &'static [ParamDescriptor] {
        self.descriptors
    }

    /// Current target of parameter `index`, or `None` if out of range.
    #[inline]
    pub fn get(&self, index: usize) -> Option<f32> {
        self.cells.get(index).map(ParamCell::get)
    }

    /// Set one target. Unknown indices are ignored.
    #[inline]
    pub fn set(&self, index: usize, value: f32) {
        if let Some(cell) = self.cells.get(index) {
            cell.set(value);
        }
    }

    /// Apply a batch of `(index, normalized value)` writes.
    pub fn update(&self, values: &[(usize, f32)]) {
        for &(index, value) in values {
            self.set(index, value);
        }
    }

    /// Restore every target to its descriptor default.
    pub fn reset_to_defaults(&self) {
        for (cell, desc) in self.cells.iter().zip(self.descriptors) {
            cell.set(desc.default);
        }
    }

    /// Visit every target in index order.
    pub fn for_each_target(&self, mut f: impl FnMut(usize, f32)) {
        for (i, cell) in self.cells.iter().enumerate() {
            f(i, cell.get());
        }
    }

    #[inline]
    pub(crate) fn cell(&self, index: usize) -> Option<&ParamCell> {
        self.cells.get(index)
    }
}

/// One-pole glide toward a target value. Audio-thread only.
///
/// `coeff = exp(-2π fc / fs)` with `fc = 1000 / (2π ms)`, which reduces to
/// `exp(-1000 / (ms fs))`. Per sample:
/// `current = target + (current - target) * coeff`.
#[derive(Debug, Clone)]
pub struct Smoother {
    current: f32,
    coeff: f32,
    smoothing_ms: f32,
}

impl Smoother {
    /// Create a smoother resting at `initial` with no smoothing until
    /// [`prepare`](Self::prepare) is called.
    pub const fn new(initial: f32) -> Self {
        Self {
            current: initial,
            coeff: 0.0,
            smoothing_ms: DEFAULT_SMOOTHING_MS,
        }
    }

    /// Change the time constant (takes effect on the next `prepare`).
    pub fn with_smoothing_ms(mut self, ms: f32) -> Self {
        self.smoothing_ms = ms;
        self
    }

    /// Derive the coefficient for `sample_rate`.
    pub fn prepare(&mut self, sample_rate: f32) {
        self.coeff = if self.smoothing_ms <= 0.0 || sample_rate <= 0.0 {
            0.0
        } else {
            expf(-1000.0 / (self.smoothing_ms * sample_rate))
        };
    }

    /// Advance one sample toward `target` and return the new current value.
    #[inline]
    pub fn next(&mut self, target: f32) -> f32 {
        let diff = self.current - target;
        self.current = if diff.abs() < SNAP_EPSILON {
            target
        } else {
            flush_denormal(target + diff * self.coeff)
        };
        self.current
    }

    /// Advance `n` samples at once (closed form of `n` calls to [`next`](Self::next)).
    pub fn skip(&mut self, target: f32, n: usize) -> f32 {
        let decay = libm::powf(self.coeff, n as f32);
        let diff = (self.current - target) * decay;
        self.current = if diff.abs() < SNAP_EPSILON {
            target
        } else {
            flush_denormal(target + diff)
        };
        self.current
    }

    /// Jump straight to `value`.
    #[inline]
    pub fn snap(&mut self, value: f32) {
        self.current = value;
    }

    /// Current value without advancing.
    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    /// Smoothing coefficient derived at prepare time.
    pub fn coeff(&self) -> f32 {
        self.coeff
    }
}

/// A bank slot plus the audio-thread smoother that follows it.
#[derive(Debug, Clone)]
pub struct SmoothedParam {
    bank: ParamBank,
    index: usize,
    smoother: Smoother,
}

impl SmoothedParam {
    /// Follow parameter `index` of `bank`, starting at its current target.
    pub fn new(bank: &ParamBank, index: usize) -> Self {
        let initial = bank.get(index).unwrap_or(0.0);
        Self {
            bank: bank.clone(),
            index,
            smoother: Smoother::new(initial),
        }
    }

    /// Derive the smoothing coefficient and snap to the target.
    pub fn prepare(&mut self, sample_rate: f32) {
        self.smoother.prepare(sample_rate);
        self.snap();
    }

    /// Current target (atomic load).
    #[inline]
    pub fn target(&self) -> f32 {
        self.bank.cell(self.index).map_or(0.0, ParamCell::get)
    }

    /// Advance one sample and return the smoothed normalized value.
    #[inline]
    pub fn next(&mut self) -> f32 {
        let target = self.target();
        self.smoother.next(target)
    }

    /// Advance `n` samples at once (control-rate updates).
    #[inline]
    pub fn skip(&mut self, n: usize) -> f32 {
        let target = self.target();
        self.smoother.skip(target, n)
    }

    /// Current smoothed value without advancing.
    #[inline]
    pub fn get(&self) -> f32 {
        self.smoother.get()
    }

    /// Move the smoothed value onto the target.
    pub fn snap(&mut self) {
        let target = self.target();
        self.smoother.snap(target);
    }
}
