//! Frame header layout.

use crate::error::{CodecError, CodecResult};
use bytes::{Buf, BufMut};

/// Size of the fixed frame header: payload length (4) + flag (1).
pub const HEADER_SIZE: usize = 5;

/// Flag byte of a live record.
pub const FLAG_LIVE: u8 = 0;

/// Flag byte of a tombstoned record.
pub const FLAG_TOMBSTONE: u8 = 1;

/// The fixed 5-byte header at the start of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Length of the JSON payload in bytes.
    pub payload_len: u32,
    /// Whether the record is logically deleted.
    pub tombstone: bool,
}

impl FrameHeader {
    /// Creates a header for a payload of `payload_len` bytes.
    #[must_use]
    pub const fn new(payload_len: u32, tombstone: bool) -> Self {
        Self {
            payload_len,
            tombstone,
        }
    }

    /// Parses a header from the first [`HEADER_SIZE`] bytes of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::CorruptRecord`] if fewer than five bytes are
    /// available or the flag byte is neither `0` nor `1`.
    pub fn parse(bytes: &[u8]) -> CodecResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(CodecError::corrupt_record(format!(
                "header needs {HEADER_SIZE} bytes, got {}",
                bytes.len()
            )));
        }

        let mut buf = &bytes[..HEADER_SIZE];
        let payload_len = buf.get_u32();
        let tombstone = match buf.get_u8() {
            FLAG_LIVE => false,
            FLAG_TOMBSTONE => true,
            other => {
                return Err(CodecError::corrupt_record(format!(
                    "invalid tombstone flag {other:#04x}"
                )))
            }
        };

        Ok(Self {
            payload_len,
            tombstone,
        })
    }

    /// Writes the header into `buf`.
    pub fn write_to(self, buf: &mut impl BufMut) {
        buf.put_u32(self.payload_len);
        buf.put_u8(self.flag());
    }

    /// Returns the flag byte for this header.
    #[must_use]
    pub const fn flag(self) -> u8 {
        if self.tombstone {
            FLAG_TOMBSTONE
        } else {
            FLAG_LIVE
        }
    }

    /// Total length of the frame this header introduces.
    #[must_use]
    pub const fn frame_len(self) -> u64 {
        HEADER_SIZE as u64 + self.payload_len as u64
    }
}
