//! # OrbitalDB Codec
//!
//! Record frames for OrbitalDB log files.
//!
//! Every document in a log is stored as one frame:
//!
//! ```text
//! | payload_len (4, big-endian u32) | flag (1) | payload (payload_len bytes) |
//! ```
//!
//! - `flag` is `0` for a live record and `1` for a tombstone
//! - `payload` is the document serialized as UTF-8 JSON text
//!
//! The header alone determines the full frame length, so a valid offset
//! always identifies exactly one frame.
//!
//! ## Usage
//!
//! ```
//! use orbital_codec::{decode, encode};
//! use serde_json::{json, Value};
//!
//! let doc = json!({ "id": 1, "val": "a" });
//! let frame = encode(&doc, false).unwrap();
//!
//! let (decoded, tombstone): (Value, bool) = decode(&frame).unwrap();
//! assert_eq!(decoded, doc);
//! assert!(!tombstone);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod frame;

pub use decoder::decode;
pub use encoder::{encode, retag};
pub use error::{CodecError, CodecResult};
pub use frame::{FrameHeader, FLAG_LIVE, FLAG_TOMBSTONE, HEADER_SIZE};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn roundtrip(doc: &Value, tombstone: bool) {
        let frame = encode(doc, tombstone).unwrap();
        let (decoded, flag): (Value, bool) = decode(&frame).unwrap();
        assert_eq!(&decoded, doc);
        assert_eq!(flag, tombstone);
    }

    #[test]
    fn roundtrip_live_document() {
        roundtrip(&json!({ "id": 1, "val": "a" }), false);
    }

    #[test]
    fn roundtrip_tombstone() {
        roundtrip(&json!({ "id": "user-7", "tags": ["x", "y"] }), true);
    }

    #[test]
    fn roundtrip_nested() {
        roundtrip(
            &json!({
                "id": 2,
                "profile": { "name": "Alice", "age": 30, "score": 9.5 },
                "active": true,
                "manager": null
            }),
            false,
        );
    }

    #[test]
    fn roundtrip_unicode() {
        roundtrip(&json!({ "id": 3, "name": "Zoë 🚀" }), false);
    }

    fn json_leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            "[a-zA-Z0-9 _-]{0,16}".prop_map(Value::String),
        ]
    }

    fn json_value() -> impl Strategy<Value = Value> {
        json_leaf().prop_recursive(3, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,8}", inner, 0..6)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(doc in json_value(), tombstone in any::<bool>()) {
            let frame = encode(&doc, tombstone).unwrap();
            let header = FrameHeader::parse(&frame).unwrap();
            prop_assert_eq!(header.frame_len(), frame.len() as u64);

            let (decoded, flag): (Value, bool) = decode(&frame).unwrap();
            prop_assert_eq!(decoded, doc);
            prop_assert_eq!(flag, tombstone);
        }

        #[test]
        fn retag_keeps_length(doc in json_value()) {
            let frame = encode(&doc, false).unwrap();
            let tombstoned = retag(&frame, true).unwrap();
            prop_assert_eq!(tombstoned.len(), frame.len());

            let (decoded, flag): (Value, bool) = decode(&tombstoned).unwrap();
            prop_assert_eq!(decoded, doc);
            prop_assert!(flag);
        }
    }
}
