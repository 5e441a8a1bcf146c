//! Identity engine.
//!
//! Returned by the factory for unknown engine IDs so a host never holds a
//! null slot.

use tonewell_core::{AudioBlock, Engine, ParamBank, ParamDescriptor};

/// Parameter table, in index order.
pub static PARAMS: [ParamDescriptor; 0] = [];

/// Engine whose `process` leaves finite audio untouched.
///
/// Non-finite samples on the stereo pair become zero and peaks are held to
/// the same ceiling every other engine applies.
#[derive(Debug, Clone)]
pub struct Passthrough {
    params: ParamBank,
}

impl Passthrough {
    /// Factory identifier.
    pub const ID: u16 = 0;

    /// Create a passthrough engine.
    pub fn new() -> Self {
        Self {
            params: ParamBank::new(&PARAMS),
        }
    }
}

impl Default for Passthrough {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for Passthrough {
    fn name(&self) -> &'static str {
        "Passthrough"
    }

    fn engine_id(&self) -> u16 {
        Self::ID
    }

    fn prepare(&mut self, _sample_rate: f32, _max_block_size: usize) {}

    fn process(&mut self, block: &mut AudioBlock<'_>) {
        let frames = block.frames();
        block.process_stereo_range(0..frames, |l, r| (l, r));
    }

    fn reset(&mut self) {}

    fn params(&self) -> &ParamBank {
        &self.params
    }

    fn snap_parameters(&mut self) {}

    fn inspect_state(&self, _visit: &mut dyn FnMut(f32)) {}
}
