//! Frame decoding.

use crate::error::{CodecError, CodecResult};
use crate::frame::{FrameHeader, HEADER_SIZE};
use serde::de::DeserializeOwned;

/// Decodes a complete frame into its document and tombstone flag.
///
/// `bytes` must hold exactly one frame: the header followed by exactly
/// `payload_len` payload bytes.
///
/// # Errors
///
/// Returns [`CodecError::CorruptRecord`] if the header is malformed, the
/// declared length does not match the available bytes, or the payload is
/// not valid JSON for `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<(T, bool)> {
    let header = FrameHeader::parse(bytes)?;
    let available = bytes.len() - HEADER_SIZE;

    if available != header.payload_len as usize {
        return Err(CodecError::corrupt_record(format!(
            "header declares {} payload bytes, {} available",
            header.payload_len, available
        )));
    }

    let document = serde_json::from_slice(&bytes[HEADER_SIZE..])
        .map_err(|e| CodecError::corrupt_record(format!("invalid JSON payload: {e}")))?;

    Ok((document, header.tombstone))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode;
    use serde_json::{json, Value};

    #[test]
    fn truncated_payload_rejected() {
        let frame = encode(&json!({ "id": 1, "val": "a" }), false).unwrap();
        let result: CodecResult<(Value, bool)> = decode(&frame[..frame.len() - 2]);
        assert!(matches!(result, Err(CodecError::CorruptRecord { .. })));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut frame = encode(&json!({ "id": 1 }), false).unwrap();
        frame.push(b' ');
        let result: CodecResult<(Value, bool)> = decode(&frame);
        assert!(matches!(result, Err(CodecError::CorruptRecord { .. })));
    }

    #[test]
    fn invalid_json_rejected() {
        let mut frame = vec![0, 0, 0, 4, 0];
        frame.extend_from_slice(b"{id:");
        let result: CodecResult<(Value, bool)> = decode(&frame);
        assert!(matches!(result, Err(CodecError::CorruptRecord { .. })));
    }

    #[test]
    fn decode_into_typed_struct() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct User {
            id: u32,
            name: String,
        }

        let frame = encode(&json!({ "id": 4, "name": "dana" }), true).unwrap();
        let (user, tombstone): (User, bool) = decode(&frame).unwrap();
        assert_eq!(
            user,
            User {
                id: 4,
                name: "dana".into()
            }
        );
        assert!(tombstone);
    }
}
