//! Tonewell Effects - effect engines built on tonewell-core
//!
//! Every type here implements [`tonewell_core::Engine`]:
//!
//! - [`Passthrough`] - Identity engine, also the factory's fallback
//! - [`PlateReverb`] - Schroeder/Moorer plate: 8 equal-decay damped combs into 4 allpasses per channel
//! - [`TubePreamp`] - Koren triode with output transformer and passive EQ, 8× oversampled
//! - [`MultibandSaturator`] - Three-band LR4 split with per-band waveshaping
//! - [`BitCrusher`] - Bit-depth quantizer with zero-order-hold rate reduction
//! - [`WaveFolder`] - Reflective folder with asymmetric offset, 8× oversampled
//!
//! ## Example
//!
//! ```rust
//! use tonewell_core::{AudioBlock, Engine};
//! use tonewell_effects::PlateReverb;
//!
//! let mut reverb = PlateReverb::new();
//! reverb.prepare(48_000.0, 256);
//! reverb.update_parameters(&[(PlateReverb::SIZE, 0.8), (PlateReverb::MIX, 0.4)]);
//!
//! let mut data = vec![0.0f32; 512];
//! data[0] = 1.0;
//! data[256] = 1.0;
//! reverb.process(&mut AudioBlock::new(&mut data, 2));
//! assert!(data.iter().all(|s| s.is_finite()));
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod bitcrusher;
pub mod multiband;
pub mod passthrough;
pub mod reverb;
pub mod tube;
pub mod wavefolder;

pub use bitcrusher::BitCrusher;
pub use multiband::MultibandSaturator;
pub use passthrough::Passthrough;
pub use reverb::PlateReverb;
pub use tube::{TUBE_TYPES, TubePreamp, TubeType};
pub use wavefolder::WaveFolder;

/// Frames between coefficient updates for parameters that are not smoothed
/// per sample.
pub(crate) const CONTROL_INTERVAL: usize = 32;
