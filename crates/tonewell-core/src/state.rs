//! Parameter state blobs for host persistence.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! offset  size  field
//! 0       4     magic  b"TWST"
//! 4       1     version (1)
//! 5       2     engine id (u16)
//! 7       2     value count (u16)
//! 9       4·n   normalized parameter targets (f32)
//! ```
//!
//! Only parameter targets are stored, never DSP state. Decoding is strict
//! about the header and lenient about the count: values beyond the
//! engine's table are ignored and a short table leaves the remaining
//! targets untouched, so blobs survive an engine gaining parameters.

use alloc::vec::Vec;
use core::fmt;

use crate::param::ParamBank;

/// Blob magic.
pub const STATE_MAGIC: [u8; 4] = *b"TWST";

/// Current blob version.
pub const STATE_VERSION: u8 = 1;

const HEADER_LEN: usize = 9;

/// Reasons a state blob is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    /// Fewer bytes than the fixed header.
    TooShort(usize),
    /// The magic bytes do not match.
    BadMagic,
    /// Written by an unknown format version.
    UnsupportedVersion(u8),
    /// The blob belongs to a different engine type.
    EngineMismatch {
        /// ID of the engine asked to load the blob.
        expected: u16,
        /// ID recorded in the blob.
        found: u16,
    },
    /// The header announces more values than the payload holds.
    Truncated {
        /// Values announced by the header.
        declared: usize,
        /// Values actually present.
        available: usize,
    },
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort(n) => write!(f, "state blob too short ({n} bytes)"),
            Self::BadMagic => write!(f, "not a tonewell state blob"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported state version {v}"),
            Self::EngineMismatch { expected, found } => {
                write!(f, "state is for engine {found}, expected engine {expected}")
            }
            Self::Truncated {
                declared,
                available,
            } => write!(f, "state declares {declared} values but holds {available}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for StateError {}

/// Serialize the current targets of `bank` for engine `engine_id`.
pub fn encode(engine_id: u16, bank: &ParamBank) -> Vec<u8> {
    let count = bank.len().min(usize::from(u16::MAX));
    let mut out = Vec::with_capacity(HEADER_LEN + 4 * count);
    out.extend_from_slice(&STATE_MAGIC);
    out.push(STATE_VERSION);
    out.extend_from_slice(&engine_id.to_le_bytes());
    out.extend_from_slice(&(count as u16).to_le_bytes());
    bank.for_each_target(|i, v| {
        if i < count {
            out.extend_from_slice(&v.to_le_bytes());
        }
    });
    out
}

/// Parse `blob` and store its values into `bank`.
///
/// Nothing is written unless the whole blob validates.
pub fn decode_into(engine_id: u16, bank: &ParamBank, blob: &[u8]) -> Result<(), StateError> {
    if blob.len() < HEADER_LEN {
        return Err(StateError::TooShort(blob.len()));
    }
    if blob[..4] != STATE_MAGIC {
        return Err(StateError::BadMagic);
    }
    if blob[4] != STATE_VERSION {
        return Err(StateError::UnsupportedVersion(blob[4]));
    }
    let found = u16::from_le_bytes([blob[5], blob[6]]);
    if found != engine_id {
        return Err(StateError::EngineMismatch {
            expected: engine_id,
            found,
        });
    }
    let declared = usize::from(u16::from_le_bytes([blob[7], blob[8]]));
    let payload = &blob[HEADER_LEN..];
    let available = payload.len() / 4;
    if available < declared {
        return Err(StateError::Truncated {
            declared,
            available,
        });
    }
    for (index, chunk) in payload.chunks_exact(4).take(declared).enumerate() {
        let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        bank.set(index, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param_info::ParamDescriptor;

    static TABLE: [ParamDescriptor; 3] = [
        ParamDescriptor::mix(0, 0.5),
        ParamDescriptor::output(1, 12.0),
        ParamDescriptor::mix(2, 0.25),
    ];

    #[test]
    fn test_roundtrip_restores_targets() {
        let a = ParamBank::new(&TABLE);
        a.update(&[(0, 0.1), (1, 0.9), (2, 0.333)]);
        let blob = encode(7, &a);
        assert_eq!(blob.len(), HEADER_LEN + 12);

        let b = ParamBank::new(&TABLE);
        decode_into(7, &b, &blob).unwrap();
        for i in 0..3 {
            assert_eq!(a.get(i), b.get(i));
        }
    }

    #[test]
    fn test_rejects_wrong_engine() {
        let bank = ParamBank::new(&TABLE);
        let blob = encode(3, &bank);
        assert_eq!(
            decode_into(4, &bank, &blob),
            Err(StateError::EngineMismatch {
                expected: 4,
                found: 3
            })
        );
    }

    #[test]
    fn test_rejects_malformed_headers() {
        let bank = ParamBank::new(&TABLE);
        assert_eq!(decode_into(0, &bank, &[1, 2]), Err(StateError::TooShort(2)));
        let mut blob = encode(0, &bank);
        blob[0] = b'X';
        assert_eq!(decode_into(0, &bank, &blob), Err(StateError::BadMagic));
        let mut blob = encode(0, &bank);
        blob[4] = 9;
        assert_eq!(decode_into(0, &bank, &blob), Err(StateError::UnsupportedVersion(9)));
    }

    #[test]
    fn test_truncated_payload_leaves_bank_untouched() {
        let src = ParamBank::new(&TABLE);
        src.update(&[(0, 1.0)]);
        let mut blob = encode(0, &src);
        blob.truncate(blob.len() - 2);

        let dst = ParamBank::new(&TABLE);
        assert!(matches!(
            decode_into(0, &dst, &blob),
            Err(StateError::Truncated {
                declared: 3,
                available: 2
            })
        ));
        assert_eq!(dst.get(0), Some(0.5));
    }

    #[test]
    fn test_short_table_keeps_remaining_targets() {
        let bank = ParamBank::new(&TABLE);
        let mut blob = Vec::new();
        blob.extend_from_slice(&STATE_MAGIC);
        blob.push(STATE_VERSION);
        blob.extend_from_slice(&0u16.to_le_bytes());
        blob.extend_from_slice(&1u16.to_le_bytes());
        blob.extend_from_slice(&0.75f32.to_le_bytes());
        decode_into(0, &bank, &blob).unwrap();
        assert_eq!(bank.get(0), Some(0.75));
        assert_eq!(bank.get(2), Some(0.25));
    }
}
