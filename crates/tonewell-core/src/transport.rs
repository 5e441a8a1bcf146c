//! Host transport snapshot and MIDI events.
//!
//! The host hands engines a [`Transport`] at block boundaries. Engines treat
//! it as read-only; nothing here advances on its own.

/// Immutable snapshot of the host's musical position.
///
/// # Example
///
/// ```rust
/// use tonewell_core::Transport;
///
/// let t = Transport {
///     tempo_bpm: 120.0,
///     position_quarters: 6.0,
///     ..Transport::default()
/// };
/// assert_eq!(t.samples_per_quarter(48_000.0), 24_000.0);
/// assert_eq!(t.bar_position(), (1, 2.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transport {
    /// Tempo in beats per minute.
    pub tempo_bpm: f64,
    /// Time-signature numerator.
    pub time_sig_numerator: u32,
    /// Time-signature denominator.
    pub time_sig_denominator: u32,
    /// Playhead position in quarter notes.
    pub position_quarters: f64,
    /// Transport is rolling.
    pub playing: bool,
    /// Host is recording.
    pub recording: bool,
    /// Loop playback is enabled.
    pub looping: bool,
    /// Loop start in quarter notes.
    pub loop_start_quarters: f64,
    /// Loop end in quarter notes.
    pub loop_end_quarters: f64,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            tempo_bpm: 120.0,
            time_sig_numerator: 4,
            time_sig_denominator: 4,
            position_quarters: 0.0,
            playing: false,
            recording: false,
            looping: false,
            loop_start_quarters: 0.0,
            loop_end_quarters: 0.0,
        }
    }
}

impl Transport {
    /// Length of a quarter note in samples at `sample_rate`.
    ///
    /// Tempo is floored at 1 BPM.
    pub fn samples_per_quarter(&self, sample_rate: f32) -> f32 {
        (f64::from(sample_rate) * 60.0 / self.tempo_bpm.max(1.0)) as f32
    }

    /// Quarter notes per bar for the current time signature.
    pub fn quarters_per_bar(&self) -> f64 {
        let den = self.time_sig_denominator.max(1);
        f64::from(self.time_sig_numerator.max(1)) * 4.0 / f64::from(den)
    }

    /// Zero-based bar index and the offset into that bar, in quarter notes.
    pub fn bar_position(&self) -> (u64, f64) {
        let per_bar = self.quarters_per_bar();
        let pos = self.position_quarters.max(0.0);
        let bar = libm::floor(pos / per_bar);
        (bar as u64, pos - bar * per_bar)
    }

    /// Returns `true` when looping and the playhead is inside the loop.
    pub fn is_in_loop(&self) -> bool {
        self.looping
            && self.loop_end_quarters > self.loop_start_quarters
            && self.position_quarters >= self.loop_start_quarters
            && self.position_quarters < self.loop_end_quarters
    }
}

/// A short MIDI message scheduled within the current block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    /// Frame offset from the start of the block.
    pub offset: u32,
    /// Raw status and data bytes.
    pub data: [u8; 3],
}

impl MidiEvent {
    /// Control change on `channel` (0-15).
    pub const fn control_change(offset: u32, channel: u8, controller: u8, value: u8) -> Self {
        Self {
            offset,
            data: [0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F],
        }
    }

    /// Status nibble (message type).
    pub const fn kind(&self) -> u8 {
        self.data[0] & 0xF0
    }

    /// MIDI channel (0-15).
    pub const fn channel(&self) -> u8 {
        self.data[0] & 0x0F
    }

    /// `(controller, value)` if this is a control change.
    pub const fn as_control_change(&self) -> Option<(u8, u8)> {
        if self.kind() == 0xB0 {
            Some((self.data[1], self.data[2]))
        } else {
            None
        }
    }
}

/// Sustain pedal controller number.
pub const CC_SUSTAIN: u8 = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_position_in_three_four() {
        let t = Transport {
            time_sig_numerator: 3,
            time_sig_denominator: 4,
            position_quarters: 7.5,
            ..Transport::default()
        };
        assert_eq!(t.quarters_per_bar(), 3.0);
        assert_eq!(t.bar_position(), (2, 1.5));
    }

    #[test]
    fn test_six_eight_bar_length() {
        let t = Transport {
            time_sig_numerator: 6,
            time_sig_denominator: 8,
            ..Transport::default()
        };
        assert_eq!(t.quarters_per_bar(), 3.0);
    }

    #[test]
    fn test_loop_membership() {
        let mut t = Transport {
            looping: true,
            loop_start_quarters: 4.0,
            loop_end_quarters: 8.0,
            position_quarters: 5.0,
            ..Transport::default()
        };
        assert!(t.is_in_loop());
        t.position_quarters = 8.0;
        assert!(!t.is_in_loop());
        t.looping = false;
        t.position_quarters = 5.0;
        assert!(!t.is_in_loop());
    }

    #[test]
    fn test_control_change_roundtrip() {
        let ev = MidiEvent::control_change(12, 3, CC_SUSTAIN, 127);
        assert_eq!(ev.channel(), 3);
        assert_eq!(ev.as_control_change(), Some((64, 127)));
        let note_on = MidiEvent {
            offset: 0,
            data: [0x90, 60, 100],
        };
        assert_eq!(note_on.as_control_change(), None);
    }
}
