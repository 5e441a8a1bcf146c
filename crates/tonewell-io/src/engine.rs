//! Slot chain processing engine.

use tonewell_config::{HostConfig, MAX_SLOTS, Preset};
use tonewell_core::{AudioBlock, DelayLine, Engine, Smoother, Transport, wet_dry_mix};
use tonewell_registry::{EngineKind, create_engine};

use crate::{Error, Result};

/// Host-side mix glide time.
const MIX_SMOOTHING_MS: f32 = 10.0;

/// Channels an engine processes. Later channels pass through every slot
/// untouched, bypassing the mix bus.
const ENGINE_CHANNELS: usize = 2;

/// One occupied slot: the engine plus its host-side mix bus.
struct Slot {
    engine: Box<dyn Engine>,
    mix_target: f32,
    mix: Smoother,
    /// Dry copy of the processed channels, channel-major.
    dry: Vec<f32>,
    /// Per-frame mix values for the current block.
    mix_curve: Vec<f32>,
    /// Dry path delayed by the engine's latency, one line per processed channel.
    dry_delay: Vec<DelayLine>,
    latency: usize,
}

impl Slot {
    fn new(engine: Box<dyn Engine>, config: &HostConfig) -> Self {
        let mut slot = Self {
            engine,
            mix_target: 1.0,
            mix: Smoother::new(1.0).with_smoothing_ms(MIX_SMOOTHING_MS),
            dry: Vec::new(),
            mix_curve: Vec::new(),
            dry_delay: Vec::new(),
            latency: 0,
        };
        slot.prepare(config);
        slot
    }

    fn prepare(&mut self, config: &HostConfig) {
        self.engine
            .prepare(config.sample_rate, config.max_block_size);
        self.mix.prepare(config.sample_rate);
        self.mix.snap(self.mix_target);
        self.latency = self.engine.latency_samples();
        self.dry = vec![0.0; config.max_block_size * config.channels.min(ENGINE_CHANNELS)];
        self.mix_curve = vec![0.0; config.max_block_size];
        self.dry_delay = (0..config.channels.min(ENGINE_CHANNELS))
            .map(|_| DelayLine::new(self.latency + 1))
            .collect();
    }

    fn reset(&mut self) {
        self.engine.reset();
        self.mix.snap(self.mix_target);
        for line in &mut self.dry_delay {
            line.mute();
        }
    }

    fn process(&mut self, block: &mut AudioBlock<'_>) {
        let frames = block.frames();
        let channels = block.channels().min(ENGINE_CHANNELS);
        let samples = frames * channels;
        // oversized blocks are a host contract violation; stay correct anyway
        if self.dry.len() < samples {
            self.dry.resize(samples, 0.0);
        }
        if self.mix_curve.len() < frames {
            self.mix_curve.resize(frames, 0.0);
        }

        self.dry[..samples].copy_from_slice(&block.as_slice()[..samples]);
        self.engine.process(block);

        for m in &mut self.mix_curve[..frames] {
            *m = self.mix.next(self.mix_target);
        }

        let latency = self.latency;
        for ch in 0..channels.min(self.dry_delay.len()) {
            let dry = &self.dry[ch * frames..(ch + 1) * frames];
            let line = &mut self.dry_delay[ch];
            let wet = block.channel_mut(ch);
            for ((y, &x), &m) in wet.iter_mut().zip(dry).zip(&self.mix_curve[..frames]) {
                line.write(x);
                *y = wet_dry_mix(line.read_int(latency), *y, m);
            }
        }
    }
}

/// Runs a fixed array of engine slots in series.
///
/// Each slot owns a boxed [`Engine`] and a host-side mix bus that blends the
/// engine's output with its input, delayed by the engine's latency so both
/// paths stay aligned. Empty slots pass audio through.
///
/// All allocation happens in [`prepare`](Self::prepare) and the slot
/// setters; [`process`](Self::process) is real-time safe for blocks up to
/// the configured maximum.
///
/// # Example
///
/// ```rust
/// use tonewell_config::HostConfig;
/// use tonewell_io::ProcessingEngine;
/// use tonewell_registry::EngineKind;
///
/// let mut engine = ProcessingEngine::new(HostConfig::default()).unwrap();
/// engine.set_slot(0, EngineKind::WaveFolder.id()).unwrap();
/// engine.set_slot_mix(0, 0.5).unwrap();
///
/// let mut buffer = vec![0.25f32; 2 * 1024];
/// engine.process_buffer(&mut buffer, 2).unwrap();
/// assert!(buffer.iter().all(|s| s.is_finite()));
/// ```
pub struct ProcessingEngine {
    config: HostConfig,
    slots: Vec<Option<Slot>>,
    transport: Transport,
    /// Planar staging area for interleaved offline buffers.
    scratch: Vec<f32>,
}

impl ProcessingEngine {
    /// Create an empty chain for `config`.
    pub fn new(config: HostConfig) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            sample_rate = config.sample_rate,
            max_block_size = config.max_block_size,
            channels = config.channels,
            "processing engine created"
        );
        Ok(Self {
            scratch: vec![0.0; config.max_block_size * config.channels],
            config,
            slots: (0..MAX_SLOTS).map(|_| None).collect(),
            transport: Transport::default(),
        })
    }

    /// Current host configuration.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Change sample rate and maximum block size, re-preparing every slot.
    pub fn prepare(&mut self, sample_rate: f32, max_block_size: usize) -> Result<()> {
        let config = self
            .config
            .clone()
            .with_sample_rate(sample_rate)
            .with_max_block_size(max_block_size);
        config.validate()?;
        self.config = config;
        self.scratch = vec![0.0; max_block_size * self.config.channels];
        for slot in self.slots.iter_mut().flatten() {
            slot.prepare(&self.config);
        }
        tracing::debug!(
            sample_rate,
            max_block_size,
            latency = self.latency_samples(),
            "processing engine prepared"
        );
        Ok(())
    }

    fn check_slot(index: usize) -> Result<()> {
        if index < MAX_SLOTS {
            Ok(())
        } else {
            Err(Error::SlotOutOfRange {
                slot: index,
                max: MAX_SLOTS,
            })
        }
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut Slot> {
        Self::check_slot(index)?;
        self.slots[index].as_mut().ok_or(Error::EmptySlot(index))
    }

    /// Place a fresh engine with factory ID `id` in `index`, replacing any
    /// engine already there.
    ///
    /// Unknown IDs install a passthrough. Returns the ID actually built.
    pub fn set_slot(&mut self, index: usize, id: u16) -> Result<u16> {
        Self::check_slot(index)?;
        if EngineKind::from_id(id).is_none() {
            tracing::warn!(slot = index, id, "unknown engine id, using passthrough");
        }
        let mut engine = create_engine(id);
        engine.set_transport_info(&self.transport);
        let built = engine.engine_id();
        tracing::info!(slot = index, engine = engine.name(), "slot assigned");
        self.slots[index] = Some(Slot::new(engine, &self.config));
        Ok(built)
    }

    /// Remove the engine in `index`. Returns `false` if the slot was empty.
    pub fn remove_slot(&mut self, index: usize) -> Result<bool> {
        Self::check_slot(index)?;
        let removed = self.slots[index].take().is_some();
        if removed {
            tracing::info!(slot = index, "slot cleared");
        }
        Ok(removed)
    }

    /// Remove every engine.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    /// Replace the whole chain with the slots of `preset`.
    ///
    /// The preset is resolved first; on error the current chain is kept.
    pub fn apply_preset(&mut self, preset: &Preset) -> Result<()> {
        let resolved = preset.resolve()?;
        self.clear();
        for entry in resolved {
            self.set_slot(entry.slot, entry.engine_id)?;
            let slot = self.slot_mut(entry.slot)?;
            slot.engine.update_parameters(&entry.params);
            slot.mix_target = entry.mix;
            slot.mix.snap(entry.mix);
        }
        tracing::info!(preset = %preset.name, slots = self.len(), "preset applied");
        Ok(())
    }

    /// Forward normalized parameter values to the engine in `index`.
    pub fn update_parameters(&mut self, index: usize, values: &[(usize, f32)]) -> Result<()> {
        self.slot_mut(index)?.engine.update_parameters(values);
        Ok(())
    }

    /// Set the host-side wet/dry mix of `index`, clamped to `[0, 1]`.
    ///
    /// The change glides over about ten milliseconds.
    pub fn set_slot_mix(&mut self, index: usize, mix: f32) -> Result<()> {
        let slot = self.slot_mut(index)?;
        if !mix.is_finite() {
            tracing::warn!(slot = index, mix, "ignoring non-finite mix");
            return Ok(());
        }
        slot.mix_target = mix.clamp(0.0, 1.0);
        Ok(())
    }

    /// Current mix target of `index`.
    pub fn slot_mix(&self, index: usize) -> Option<f32> {
        self.slots.get(index)?.as_ref().map(|s| s.mix_target)
    }

    /// Engine in `index`, if any.
    pub fn slot(&self, index: usize) -> Option<&dyn Engine> {
        self.slots
            .get(index)
            .and_then(Option::as_ref)
            .map(|s| s.engine.as_ref())
    }

    /// Serialized parameter state of the engine in `index`.
    pub fn slot_state(&self, index: usize) -> Result<Vec<u8>> {
        Self::check_slot(index)?;
        self.slot(index)
            .map(|e| e.get_state())
            .ok_or(Error::EmptySlot(index))
    }

    /// Restore parameter state into the engine in `index`.
    pub fn restore_slot_state(&mut self, index: usize, blob: &[u8]) -> Result<()> {
        let slot = self.slot_mut(index)?;
        slot.engine.set_state(blob).map_err(|e| {
            tracing::warn!(slot = index, error = %e, "state rejected");
            Error::State(e)
        })
    }

    /// Share transport information with every engine.
    pub fn set_transport(&mut self, transport: &Transport) {
        self.transport = *transport;
        for slot in self.slots.iter_mut().flatten() {
            slot.engine.set_transport_info(transport);
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Returns `true` if no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total latency of the chain in samples.
    pub fn latency_samples(&self) -> usize {
        self.slots.iter().flatten().map(|s| s.latency).sum()
    }

    /// Clear every engine's state and every dry delay.
    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            slot.reset();
        }
    }

    /// Run the chain in place over a planar block.
    pub fn process(&mut self, block: &mut AudioBlock<'_>) {
        for slot in self.slots.iter_mut().flatten() {
            slot.process(block);
        }
    }

    /// Run the chain over an interleaved buffer, `max_block_size` frames at
    /// a time.
    pub fn process_buffer(&mut self, buffer: &mut [f32], channels: usize) -> Result<()> {
        if channels == 0 || buffer.len() % channels != 0 {
            return Err(Error::BufferShape {
                len: buffer.len(),
                channels,
            });
        }
        let chunk_len = self.config.max_block_size * channels;
        if self.scratch.len() < chunk_len {
            self.scratch.resize(chunk_len, 0.0);
        }
        for chunk in buffer.chunks_mut(chunk_len) {
            let frames = chunk.len() / channels;
            let planar = &mut self.scratch[..chunk.len()];
            for (i, frame) in chunk.chunks_exact(channels).enumerate() {
                for (ch, &s) in frame.iter().enumerate() {
                    planar[ch * frames + i] = s;
                }
            }
            let mut block = AudioBlock::new(&mut *planar, channels);
            for slot in self.slots.iter_mut().flatten() {
                slot.process(&mut block);
            }
            for (i, frame) in chunk.chunks_exact_mut(channels).enumerate() {
                for (ch, s) in frame.iter_mut().enumerate() {
                    *s = planar[ch * frames + i];
                }
            }
        }
        Ok(())
    }
}
