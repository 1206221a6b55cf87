//! Wire message model and codec.
//!
//! A `Message` is eight independently owned byte-string fields. On the wire
//! the fields are flat-concatenated in order, each followed by a single NUL
//! terminator; there is no length prefix and no framing beyond the fixed
//! payload size both peers agree on out of band.

use std::fmt;

/// Number of fields in every message.
pub const FIELD_COUNT: usize = 8;

/// Terminator byte appended after each field on the wire.
const TERMINATOR: u8 = 0;

/// Per-field fill markers. Field contents never contain the terminator, so
/// the terminator scan on decode recovers field boundaries exactly.
const FIELD_MARKERS: [u8; FIELD_COUNT] = *b"ABCDEFGH";

/// A fixed eight-field payload message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    fields: [Vec<u8>; FIELD_COUNT],
}

impl Message {
    /// Build a message whose field contents total exactly `payload_size`
    /// bytes.
    ///
    /// The first seven fields each carry `payload_size / 8` bytes of their
    /// marker; the eighth absorbs the remainder. For `payload_size < 8` the
    /// first seven fields are empty and the eighth carries the whole payload.
    pub fn new(payload_size: usize) -> Self {
        let base = payload_size / FIELD_COUNT;
        let remainder = payload_size % FIELD_COUNT;

        let fields = std::array::from_fn(|i| {
            let len = if i == FIELD_COUNT - 1 {
                base + remainder
            } else {
                base
            };
            vec![FIELD_MARKERS[i]; len]
        });

        Self { fields }
    }

    /// Encoded size of a message built from `payload_size`: the payload plus
    /// one terminator per field. Both peers size their buffers from this.
    pub fn wire_len(payload_size: usize) -> usize {
        payload_size + FIELD_COUNT
    }

    /// Encoded size of this message.
    pub fn encoded_len(&self) -> usize {
        self.fields.iter().map(|f| f.len() + 1).sum()
    }

    /// Write the wire encoding into `out`, returning the bytes written.
    ///
    /// The caller must supply at least `encoded_len()` bytes of capacity; a
    /// shorter buffer is rejected up front rather than partially written.
    pub fn encode_into(&self, out: &mut [u8]) -> Result<usize, WireError> {
        let needed = self.encoded_len();
        if out.len() < needed {
            return Err(WireError::BufferTooSmall {
                needed,
                capacity: out.len(),
            });
        }

        let mut offset = 0;
        for field in &self.fields {
            out[offset..offset + field.len()].copy_from_slice(field);
            offset += field.len();
            out[offset] = TERMINATOR;
            offset += 1;
        }
        Ok(offset)
    }

    /// Encode into a freshly allocated, exactly sized buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.encoded_len()];
        self.encode_into(&mut out)
            .expect("buffer sized to encoded_len");
        out
    }

    /// Recover a message from its wire encoding.
    ///
    /// Requires exactly eight terminated fields filling `buf` completely.
    /// The scan never reads past `buf`; truncated or oversized input is an
    /// error, not a wild read.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let mut fields: [Vec<u8>; FIELD_COUNT] = std::array::from_fn(|_| Vec::new());
        let mut offset = 0;

        for (index, field) in fields.iter_mut().enumerate() {
            let rest = &buf[offset..];
            let end = rest
                .iter()
                .position(|&b| b == TERMINATOR)
                .ok_or(WireError::MissingTerminator { field: index })?;
            *field = rest[..end].to_vec();
            offset += end + 1;
        }

        if offset != buf.len() {
            return Err(WireError::TrailingBytes(buf.len() - offset));
        }

        Ok(Self { fields })
    }
}

/// Codec errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Output buffer cannot hold the full encoding.
    BufferTooSmall { needed: usize, capacity: usize },
    /// Input ended before the given field's terminator.
    MissingTerminator { field: usize },
    /// Input continued past the eighth field.
    TrailingBytes(usize),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::BufferTooSmall { needed, capacity } => {
                write!(f, "encode buffer too small: need {needed} bytes, have {capacity}")
            }
            WireError::MissingTerminator { field } => {
                write!(f, "field {field} is not terminated within the buffer")
            }
            WireError::TrailingBytes(extra) => {
                write!(f, "{extra} trailing bytes after the final field")
            }
        }
    }
}

impl std::error::Error for WireError {}
