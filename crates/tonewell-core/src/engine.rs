//! The engine contract and the audio block it operates on.
//!
//! Every effect is an [`Engine`]: a self-contained DSP unit that owns its
//! state, is prepared once per configuration and then processes blocks in
//! place on a single real-time thread.
//!
//! ## Lifecycle
//!
//! ```text
//! new() ─▶ prepare(sr, max_block) ─▶ process(block)* ─▶ drop
//!                ▲                        │
//!                └──── prepare / reset ◀──┘
//! ```
//!
//! - `prepare` may allocate; it sizes every buffer for `max_block` frames at
//!   the given rate and snaps smoothers onto their targets.
//! - `process`, `reset`, `set_transport_info` and `process_midi` never
//!   allocate, lock or fail. Non-finite output is replaced with zero and
//!   magnitudes are clamped to [`SAFE_PEAK`](crate::math::SAFE_PEAK).
//! - Parameter writes go through the engine's [`ParamBank`]. Control threads
//!   keep a clone from [`Engine::param_handle`] and never touch the engine.
//!
//! ## Design Decisions
//!
//! - **Trait objects at the seam**: hosts hold `Box<dyn Engine>`; the sample
//!   loops inside each engine are monomorphic, so dispatch happens once per
//!   block rather than once per sample.
//! - **Planar blocks**: an [`AudioBlock`] stores channels back to back, which
//!   keeps per-channel slices contiguous.

use alloc::vec::Vec;
use core::ops::Range;

use crate::math::sanitize;
use crate::param::ParamBank;
use crate::state::{self, StateError};
use crate::transport::{MidiEvent, Transport};

/// A rectangular block of planar `f32` samples, mutable in place.
///
/// Channel `c` occupies `data[c * frames .. (c + 1) * frames]`. Channel 0 is
/// left and channel 1 right when stereo.
///
/// # Example
///
/// ```rust
/// use tonewell_core::AudioBlock;
///
/// let mut data = [0.1, 0.2, 0.3, -0.1, -0.2, -0.3];
/// let mut block = AudioBlock::new(&mut data, 2);
/// assert_eq!(block.frames(), 3);
/// block.process_stereo(|l, r| (l * 2.0, r));
/// assert_eq!(block.channel(0), &[0.2, 0.4, 0.6]);
/// ```
#[derive(Debug)]
pub struct AudioBlock<'a> {
    data: &'a mut [f32],
    channels: usize,
    frames: usize,
}

impl<'a> AudioBlock<'a> {
    /// Wrap `data` as `channels` planar channels.
    ///
    /// `channels` is raised to at least 1; trailing samples that do not fill
    /// a whole frame are left out of the block.
    pub fn new(data: &'a mut [f32], channels: usize) -> Self {
        let channels = channels.max(1);
        let frames = data.len() / channels;
        Self {
            data,
            channels,
            frames,
        }
    }

    /// Number of channels.
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of frames per channel.
    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Samples of channel `ch`.
    ///
    /// # Panics
    ///
    /// Panics if `ch >= channels()`.
    #[inline]
    pub fn channel(&self, ch: usize) -> &[f32] {
        &self.data[ch * self.frames..(ch + 1) * self.frames]
    }

    /// Mutable samples of channel `ch`.
    ///
    /// # Panics
    ///
    /// Panics if `ch >= channels()`.
    #[inline]
    pub fn channel_mut(&mut self, ch: usize) -> &mut [f32] {
        &mut self.data[ch * self.frames..(ch + 1) * self.frames]
    }

    /// Left channel and, when present, right channel.
    pub fn stereo_mut(&mut self) -> (&mut [f32], Option<&mut [f32]>) {
        let frames = self.frames;
        let used = &mut self.data[..frames * self.channels];
        if self.channels == 1 {
            (used, None)
        } else {
            let (left, rest) = used.split_at_mut(frames);
            (left, Some(&mut rest[..frames]))
        }
    }

    /// Run a stereo sample function over channels 0 and 1.
    ///
    /// Mono blocks feed the same sample to both inputs and keep the left
    /// output. Channels beyond the second are left untouched. Every written
    /// sample passes through [`sanitize`].
    #[inline]
    pub fn process_stereo(&mut self, f: impl FnMut(f32, f32) -> (f32, f32)) {
        let frames = self.frames;
        self.process_stereo_range(0..frames, f);
    }

    /// [`process_stereo`](Self::process_stereo) restricted to a frame range.
    ///
    /// Engines that update coefficients at control rate call this once per
    /// control period. The range is clipped to the block.
    #[inline]
    pub fn process_stereo_range(
        &mut self,
        range: Range<usize>,
        mut f: impl FnMut(f32, f32) -> (f32, f32),
    ) {
        let end = range.end.min(self.frames);
        let start = range.start.min(end);
        match self.stereo_mut() {
            (left, None) => {
                for s in &mut left[start..end] {
                    let (l, _) = f(*s, *s);
                    *s = sanitize(l);
                }
            }
            (left, Some(right)) => {
                for (l, r) in left[start..end].iter_mut().zip(&mut right[start..end]) {
                    let (yl, yr) = f(*l, *r);
                    *l = sanitize(yl);
                    *r = sanitize(yr);
                }
            }
        }
    }

    /// Zero every sample.
    pub fn clear(&mut self) {
        self.data[..self.frames * self.channels].fill(0.0);
    }

    /// All samples, channel-major.
    pub fn as_slice(&self) -> &[f32] {
        &self.data[..self.frames * self.channels]
    }

    /// All samples, channel-major, mutable.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data[..self.frames * self.channels]
    }
}

/// Uniform contract implemented by every effect engine.
///
/// Object-safe; hosts drive engines as `Box<dyn Engine>`.
///
/// # Example
///
/// ```rust
/// use tonewell_core::{AudioBlock, Engine, ParamBank, ParamDescriptor};
///
/// static PARAMS: [ParamDescriptor; 1] = [ParamDescriptor::output(0, 12.0)];
///
/// struct Silence {
///     params: ParamBank,
/// }
///
/// impl Engine for Silence {
///     fn name(&self) -> &'static str { "Silence" }
///     fn engine_id(&self) -> u16 { 99 }
///     fn prepare(&mut self, _sample_rate: f32, _max_block_size: usize) {}
///     fn process(&mut self, block: &mut AudioBlock<'_>) { block.clear() }
///     fn reset(&mut self) {}
///     fn params(&self) -> &ParamBank { &self.params }
///     fn snap_parameters(&mut self) {}
///     fn inspect_state(&self, _visit: &mut dyn FnMut(f32)) {}
/// }
///
/// let mut e = Silence { params: ParamBank::new(&PARAMS) };
/// e.update_parameters(&[(0, 0.8), (4, 1.0)]);
/// assert_eq!(e.params().get(0), Some(0.8));
/// assert_eq!(e.parameter_name(0), Some("Output"));
/// ```
pub trait Engine: Send {
    /// Display name.
    fn name(&self) -> &'static str;

    /// Factory identifier of this engine type.
    fn engine_id(&self) -> u16;

    /// Size all state for `max_block_size` frames at `sample_rate` Hz.
    ///
    /// May allocate. Always succeeds, degrading (e.g. a lower oversampling
    /// factor) when the requested configuration is out of reach. Smoothers
    /// are snapped onto their targets.
    fn prepare(&mut self, sample_rate: f32, max_block_size: usize);

    /// Transform `block` in place.
    fn process(&mut self, block: &mut AudioBlock<'_>);

    /// Zero all sample-valued state. Parameters are left alone.
    fn reset(&mut self);

    /// The engine's parameter targets.
    fn params(&self) -> &ParamBank;

    /// A handle control threads can keep to write parameters.
    fn param_handle(&self) -> ParamBank {
        self.params().clone()
    }

    /// Write `(index, normalized value)` pairs. Unknown indices are ignored
    /// and values are clamped to `[0, 1]`.
    fn update_parameters(&self, values: &[(usize, f32)]) {
        self.params().update(values);
    }

    /// Number of parameters.
    fn num_parameters(&self) -> usize {
        self.params().len()
    }

    /// Name of parameter `index`.
    fn parameter_name(&self, index: usize) -> Option<&'static str> {
        self.params().descriptors().get(index).map(|d| d.name)
    }

    /// Processing latency in samples, stable between `prepare` calls.
    fn latency_samples(&self) -> usize {
        0
    }

    /// Receive the host transport. Default ignores it.
    fn set_transport_info(&mut self, _transport: &Transport) {}

    /// Receive MIDI for the next block. Default ignores it.
    fn process_midi(&mut self, _events: &[MidiEvent]) {}

    /// Serialize the parameter targets.
    fn get_state(&self) -> Vec<u8> {
        state::encode(self.engine_id(), self.params())
    }

    /// Restore parameter targets from [`get_state`](Self::get_state) output.
    ///
    /// On success the smoothers are snapped so that the restored values
    /// take effect immediately. On error nothing changes.
    fn set_state(&mut self, blob: &[u8]) -> Result<(), StateError> {
        state::decode_into(self.engine_id(), self.params(), blob)?;
        self.snap_parameters();
        Ok(())
    }

    /// Move every smoothed value onto its target.
    fn snap_parameters(&mut self);

    /// Visit every sample-valued state word (filter memories, delay
    /// buffers, oversampler histories).
    fn inspect_state(&self, visit: &mut dyn FnMut(f32));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_layout() {
        let mut data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let block = AudioBlock::new(&mut data, 3);
        assert_eq!(block.frames(), 2);
        assert_eq!(block.channel(2), &[5.0, 6.0]);
        assert_eq!(block.as_slice().len(), 6);
    }

    #[test]
    fn test_zero_channels_treated_as_mono() {
        let mut data = [1.0, 2.0];
        let block = AudioBlock::new(&mut data, 0);
        assert_eq!(block.channels(), 1);
        assert_eq!(block.frames(), 2);
    }

    #[test]
    fn test_process_stereo_mono_block() {
        let mut data = [0.5, -0.5];
        let mut block = AudioBlock::new(&mut data, 1);
        block.process_stereo(|l, r| (l + r, 100.0));
        assert_eq!(data, [1.0, -1.0]);
    }

    #[test]
    fn test_process_stereo_leaves_extra_channels() {
        let mut data = [0.1, 0.2, 0.3, 0.4, 9.0, 9.0];
        let mut block = AudioBlock::new(&mut data, 3);
        block.process_stereo(|l, r| (r, l));
        assert_eq!(data, [0.3, 0.4, 0.1, 0.2, 9.0, 9.0]);
    }

    #[test]
    fn test_process_stereo_range_is_clipped() {
        let mut data = [1.0, 1.0, 1.0, 2.0, 2.0, 2.0];
        let mut block = AudioBlock::new(&mut data, 2);
        block.process_stereo_range(1..10, |l, r| (l * 3.0, r * 3.0));
        assert_eq!(data, [1.0, 3.0, 3.0, 2.0, 6.0, 6.0]);
    }

    #[test]
    fn test_process_stereo_sanitizes() {
        let mut data = [0.0, 0.0];
        let mut block = AudioBlock::new(&mut data, 2);
        block.process_stereo(|_, _| (f32::NAN, 1e9));
        assert_eq!(data[0], 0.0);
        assert_eq!(data[1], crate::math::SAFE_PEAK);
    }
}
