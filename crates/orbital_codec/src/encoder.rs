//! Frame encoding.

use crate::error::{CodecError, CodecResult};
use crate::frame::{FrameHeader, HEADER_SIZE};
use bytes::BufMut;
use serde::Serialize;

/// Encodes `document` as a frame with the given tombstone flag.
///
/// # Errors
///
/// Returns [`CodecError::EncodingFailed`] if the document cannot be
/// serialized to JSON (for example a map with non-string keys) or the
/// payload does not fit in a `u32` length.
pub fn encode<T: Serialize + ?Sized>(document: &T, tombstone: bool) -> CodecResult<Vec<u8>> {
    let payload =
        serde_json::to_vec(document).map_err(|e| CodecError::encoding_failed(e.to_string()))?;

    let payload_len = u32::try_from(payload.len()).map_err(|_| {
        CodecError::encoding_failed(format!("payload of {} bytes is too large", payload.len()))
    })?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    FrameHeader::new(payload_len, tombstone).write_to(&mut frame);
    frame.put_slice(&payload);

    Ok(frame)
}

/// Returns a copy of `frame` with only its tombstone flag changed.
///
/// The payload bytes are kept verbatim, so the result always has the same
/// length as the input and can be written back over the original frame.
///
/// # Errors
///
/// Returns [`CodecError::CorruptRecord`] if `frame` is not a complete frame.
pub fn retag(frame: &[u8], tombstone: bool) -> CodecResult<Vec<u8>> {
    let header = FrameHeader::parse(frame)?;
    if header.frame_len() != frame.len() as u64 {
        return Err(CodecError::corrupt_record(format!(
            "header declares {} bytes, frame has {}",
            header.frame_len(),
            frame.len()
        )));
    }

    let mut retagged = Vec::with_capacity(frame.len());
    FrameHeader::new(header.payload_len, tombstone).write_to(&mut retagged);
    retagged.put_slice(&frame[HEADER_SIZE..]);
    Ok(retagged)
}
