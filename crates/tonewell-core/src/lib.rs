//! Tonewell Core - engine contract and DSP primitives
//!
//! This crate defines what an effect engine is and provides the building
//! blocks engines are assembled from. Everything on the audio path is
//! allocation-free after `prepare`, wait-free, and flushes subnormals on
//! every recursive state store.
//!
//! # Core Abstractions
//!
//! ## Engine Contract
//!
//! - [`Engine`] - Object-safe trait every effect implements
//! - [`AudioBlock`] - Planar multichannel block processed in place
//! - [`Transport`] / [`MidiEvent`] - Host context handed to engines
//! - [`state`] - Opaque parameter blobs for persistence
//!
//! ## Parameters
//!
//! - [`ParamBank`] - Atomic normalized targets shared with control threads
//! - [`SmoothedParam`] / [`Smoother`] - 20 ms one-pole glide on the audio thread
//! - [`ParamDescriptor`] - Static metadata and physical-unit mapping
//!
//! ## Filters
//!
//! - [`OnePole`] / [`OnePoleHighpass`] - 6 dB/oct tone and damping filters
//! - [`Biquad`] - Transposed direct form II with RBJ cookbook designs
//! - [`Lr4`] - Linkwitz-Riley 4th-order band splitter
//! - [`CombFilter`] - Damped feedback comb for reverbs
//! - [`AllpassFilter`] - Schroeder allpass diffuser
//!
//! ## Delay and Resampling
//!
//! - [`DelayLine`] - Circular buffer with integer and fractional taps
//! - [`Oversampler`] - Cascaded 2× Kaiser FIR oversampling up to 16×
//!
//! ## Utilities
//!
//! - Math: [`db_to_linear`], [`linear_to_db`], [`flush_denormal`], [`sanitize`], waveshapers
//! - [`NoiseGen`] - Reseedable LCG noise for dither and analog noise
//!
//! # no_std Support
//!
//! The crate is `no_std` (with `alloc`) when the default `std` feature is
//! disabled:
//!
//! ```toml
//! [dependencies]
//! tonewell-core = { version = "0.1", default-features = false }
//! ```
//!
//! The optional `tracing` feature logs configuration decisions made in
//! `prepare` (never from `process`).
//!
//! # Design Principles
//!
//! - **Real-time safe**: No allocations, locks or failures on the audio path
//! - **No dependencies on std**: Pure `no_std` with `libm` for math
//! - **Object-safe traits**: Hosts chain engines as `Box<dyn Engine>`

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod allpass;
pub mod biquad;
pub mod comb;
pub mod crossover;
pub mod delay;
pub mod engine;
pub mod math;
pub mod noise;
pub mod one_pole;
pub mod oversample;
pub mod param;
pub mod param_info;
pub mod state;
pub mod transport;

// Re-export main types at crate root
pub use allpass::AllpassFilter;
pub use biquad::{Biquad, BiquadCoeffs, BiquadKind};
pub use comb::CombFilter;
pub use crossover::Lr4;
pub use delay::DelayLine;
pub use engine::{AudioBlock, Engine};
pub use math::{
    SAFE_PEAK, cubic_clip, db_to_linear, flush_denormal, fold, hard_clip, lerp, linear_to_db,
    mono_sum, sanitize, soft_clip, tube_curve, wet_dry_mix,
};
pub use noise::NoiseGen;
pub use one_pole::{OnePole, OnePoleHighpass, one_pole_alpha};
pub use oversample::{MAX_INTERNAL_RATE, Oversampler};
pub use param::{DEFAULT_SMOOTHING_MS, ParamBank, ParamCell, SmoothedParam, Smoother};
pub use param_info::{ParamDescriptor, ParamMapping, ParamUnit, find_param};
pub use state::StateError;
pub use transport::{CC_SUSTAIN, MidiEvent, Transport};
