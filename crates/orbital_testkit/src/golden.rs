//! Golden test utilities for format verification.
//!
//! Pins the exact bytes of the log frame, the index mirror and the
//! journal so an accidental format change fails loudly.

use orbital_core::{DocumentId, JournalEntry, Mutation};
use serde_json::{json, Value};

/// Encodes bytes as hexadecimal string.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decodes hexadecimal string to bytes.
///
/// Whitespace is ignored.
///
/// # Panics
///
/// Panics on anything other than hex digit pairs.
#[must_use]
pub fn hex_decode(hex: &str) -> Vec<u8> {
    let hex = hex.replace([' ', '\n', '\r'], "");
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).expect("Invalid hex"))
        .collect()
}

/// A document and the frame it must encode to.
#[derive(Debug, Clone)]
pub struct FrameVector {
    /// Description of the test case.
    pub description: &'static str,
    /// The document.
    pub document: Value,
    /// Whether the frame is a tombstone.
    pub tombstone: bool,
    /// Expected frame bytes (hex-encoded, spaces between fields).
    pub expected_hex: &'static str,
}

/// Returns the standard frame vectors.
#[must_use]
pub fn frame_vectors() -> Vec<FrameVector> {
    vec![
        FrameVector {
            description: "integer id",
            document: json!({ "id": 1 }),
            tombstone: false,
            expected_hex: "00000008 00 7b226964223a317d",
        },
        FrameVector {
            description: "integer id, deleted",
            document: json!({ "id": 1 }),
            tombstone: true,
            expected_hex: "00000008 01 7b226964223a317d",
        },
        FrameVector {
            description: "keys are written sorted",
            document: json!({ "id": 1, "a": "x" }),
            tombstone: false,
            expected_hex: "00000010 00 7b2261223a2278222c226964223a317d",
        },
        FrameVector {
            description: "string id with a boolean field",
            document: json!({ "id": "a", "n": true }),
            tombstone: false,
            expected_hex: "00000013 00 7b226964223a2261222c226e223a747275657d",
        },
    ]
}

/// Journal entries and their exact on-disk text.
#[must_use]
pub fn journal_vectors() -> Vec<(JournalEntry, &'static str)> {
    let document = crate::fixtures::doc(json!({ "id": 9 }));
    vec![
        (
            JournalEntry {
                mutation: Mutation::Insert {
                    document,
                    offset: 42,
                    frame_len: 13,
                },
            },
            r#"{"mutation":{"op":"insert","document":{"id":9},"offset":42,"frame_len":13}}"#,
        ),
        (
            JournalEntry {
                mutation: Mutation::Delete {
                    id: DocumentId::from("k"),
                    offset: 7,
                },
            },
            r#"{"mutation":{"op":"delete","id":"k","offset":7}}"#,
        ),
        (
            JournalEntry {
                mutation: Mutation::Compact,
            },
            r#"{"mutation":{"op":"compact"}}"#,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{doc, test_config, TestCatalog};
    use orbital_core::Delta;
    use std::fs;

    #[test]
    fn test_hex_roundtrip() {
        let original = vec![0x00, 0x01, 0x7f, 0x80, 0xff];
        assert_eq!(hex_decode(&hex_encode(&original)), original);
        assert_eq!(hex_decode("00 0a\nff"), vec![0x00, 0x0a, 0xff]);
    }

    #[test]
    fn frames_match_vectors() {
        for vector in frame_vectors() {
            let encoded = orbital_codec::encode(&vector.document, vector.tombstone).unwrap();
            assert_eq!(
                hex_encode(&encoded),
                vector.expected_hex.replace(' ', ""),
                "{}",
                vector.description
            );

            let (decoded, tombstone): (Value, bool) = orbital_codec::decode(&encoded).unwrap();
            assert_eq!(decoded, vector.document, "{}", vector.description);
            assert_eq!(tombstone, vector.tombstone, "{}", vector.description);
        }
    }

    #[test]
    fn journal_entries_match_vectors() {
        for (entry, text) in journal_vectors() {
            assert_eq!(serde_json::to_string(&entry).unwrap(), text);
            let parsed: JournalEntry = serde_json::from_str(text).unwrap();
            assert_eq!(parsed, entry);
        }
    }

    #[test]
    fn delta_lines_match_vectors() {
        let set = Delta::Set {
            id: DocumentId::Int(3),
            offset: 40,
        };
        let remove = Delta::Remove {
            id: DocumentId::from("a"),
        };
        assert_eq!(
            serde_json::to_string(&set).unwrap(),
            r#"{"op":"set","id":3,"offset":40}"#
        );
        assert_eq!(
            serde_json::to_string(&remove).unwrap(),
            r#"{"op":"remove","id":"a"}"#
        );
    }

    #[test]
    fn collection_files_match_vectors() {
        let fixture = TestCatalog::with_config(test_config().mirror_checkpoint_every(0));
        {
            let handle = fixture.collection("golden");
            let mut collection = handle.lock();
            collection.insert(doc(json!({ "id": 1, "a": "x" }))).unwrap();
            collection.insert(doc(json!({ "id": 2 }))).unwrap();
            collection.delete(&DocumentId::Int(1)).unwrap();
        }

        let log = fs::read(fixture.log_path("golden")).unwrap();
        assert_eq!(
            hex_encode(&log),
            "00000010017b2261223a2278222c226964223a317d\
             00000008007b226964223a327d"
        );

        let snapshot = fs::read_to_string(fixture.path().join("golden.db.idx")).unwrap();
        assert_eq!(snapshot, "[[2,21]]");
        assert!(!fixture.path().join("golden.db.idx.log").exists());
        assert!(!fixture.path().join("golden.journal").exists());
    }
}
