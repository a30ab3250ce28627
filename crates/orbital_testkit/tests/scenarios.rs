//! End-to-end scenarios through the public collection API.

use orbital_core::{
    CollectionOptions, Document, DocumentId, Index, LogStore, Query, RebuildSource,
};
use orbital_testkit::prelude::*;
use proptest::prelude::*;
use serde_json::json;
use std::fs;

#[test]
fn two_documents_delete_then_compact() {
    let fixture = TestCatalog::new();
    let handle = fixture.collection("pairs");
    let mut pairs = handle.lock();

    pairs.insert(doc(json!({ "id": 1, "val": "a" }))).unwrap();
    pairs.insert(doc(json!({ "id": 2, "val": "b" }))).unwrap();
    pairs.delete(&DocumentId::Int(1)).unwrap();
    let stats = pairs.compact().unwrap();

    assert_eq!(pairs.find_one(&Query::from(1i64)).unwrap(), None);
    assert_eq!(
        pairs.find_one(&Query::from(2i64)).unwrap(),
        Some(doc(json!({ "id": 2, "val": "b" })))
    );
    assert_eq!(stats.live_records, 1);
    assert!(stats.bytes_after <= stats.bytes_before);

    let report = pairs.verify().unwrap();
    assert_eq!(report.frames, 1);
    assert_eq!(report.live_frames, 1);
}

#[test]
fn tombstones_survive_a_rebuild_without_mirror() {
    let mut fixture = TestCatalog::new();
    {
        let handle = fixture.collection("users");
        let mut users = handle.lock();
        for i in 0..10 {
            users.insert(scenarios::numbered_doc(i)).unwrap();
        }
        users.delete(&DocumentId::Int(3)).unwrap();
        assert_eq!(users.get(&DocumentId::Int(3)).unwrap(), None);
    }
    fixture.close();

    let _ = fs::remove_file(fixture.path().join("users.db.idx"));
    let _ = fs::remove_file(fixture.path().join("users.db.idx.log"));

    let log = LogStore::open(&fixture.log_path("users"), false).unwrap();
    let mut index = Index::new::<&str>(&[], None);
    assert_eq!(index.rebuild(&log).unwrap(), RebuildSource::LogScan);
    assert!(!index.contains(&DocumentId::Int(3)));
    assert_eq!(index.len(), 9);
    drop(log);

    fixture.reopen();
    let handle = fixture.collection("users");
    let users = handle.lock();
    assert_eq!(users.get(&DocumentId::Int(3)).unwrap(), None);
    assert_eq!(users.len(), 9);
}

#[test]
fn rebuild_is_idempotent() {
    let fixture = scenarios::populated_catalog(40);
    {
        let handle = fixture.collection("users");
        let mut users = handle.lock();
        for i in (0..40).step_by(3) {
            users.delete(&DocumentId::Int(i)).unwrap();
        }
        users.insert(scenarios::numbered_doc(6)).unwrap();
    }

    let log = LogStore::open(&fixture.log_path("users"), false).unwrap();
    let mut first = Index::new(&["rank"], None);
    let mut second = Index::new(&["rank"], None);
    first.rebuild(&log).unwrap();
    second.rebuild(&log).unwrap();

    assert_eq!(first.entries_by_offset(), second.entries_by_offset());
    for (id, offset) in first.entries_by_offset() {
        let record = log.read_at(offset).unwrap();
        assert!(!record.tombstone);
        assert_eq!(record.id(), Some(id));
    }
}

#[test]
fn secondary_lookup_survives_reopen_and_compaction() {
    let mut fixture = TestCatalog::new();
    let options = || CollectionOptions::new().index_field("email");
    {
        let handle = fixture.catalog().collection_with("people", options()).unwrap();
        let mut people = handle.lock();
        people
            .insert(doc(json!({ "id": "p1", "email": "ada@example.com" })))
            .unwrap();
        people
            .insert(doc(json!({ "id": "p2", "email": "grace@example.com" })))
            .unwrap();
        people.delete(&DocumentId::from("p1")).unwrap();
        people.compact().unwrap();
    }
    fixture.reopen();

    let handle = fixture.catalog().collection_with("people", options()).unwrap();
    let people = handle.lock();
    let by_email = |email: &str| {
        people
            .find_one_value(&json!({ "email": email }))
            .unwrap()
            .map(|d| d["id"].clone())
    };
    assert_eq!(by_email("grace@example.com"), Some(json!("p2")));
    assert_eq!(by_email("ada@example.com"), None);
    assert!(people
        .find_one_value(&json!({ "email": "x", "id": 1 }))
        .is_err());
}

#[test]
fn every_crash_point_is_recovered() {
    for result in CrashRecoveryHarness::run_all() {
        assert!(result.passed, "{:?}: {:?}", result.point, result.error);
        assert_eq!(result.actual_documents, result.expected_documents);
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 4, ..ProptestConfig::default() })]

    #[test]
    fn thousand_inserts_three_hundred_deletes(
        doomed in proptest::sample::subsequence((1..=1000i64).collect::<Vec<_>>(), 300)
    ) {
        let mut fixture = TestCatalog::new();
        {
            let handle = fixture.collection("bulk");
            let mut bulk = handle.lock();
            for i in 1..=1000 {
                bulk.insert(body(i)).unwrap();
            }
            for &i in &doomed {
                prop_assert!(bulk.delete(&DocumentId::Int(i)).unwrap());
            }
            let before = bulk.log_size().unwrap();
            let stats = bulk.compact().unwrap();
            prop_assert_eq!(stats.live_records, 700);
            prop_assert!(stats.bytes_after <= before);
        }
        fixture.reopen();

        let handle = fixture.collection("bulk");
        let bulk = handle.lock();
        prop_assert_eq!(bulk.len(), 700);
        for i in 1..=1000 {
            let found = bulk.get(&DocumentId::Int(i)).unwrap();
            if doomed.binary_search(&i).is_ok() {
                prop_assert_eq!(found, None);
            } else {
                prop_assert_eq!(found, Some(body(i)));
            }
        }
    }
}

fn body(i: i64) -> Document {
    doc(json!({ "id": i, "body": format!("document number {i}"), "even": i % 2 == 0 }))
}
