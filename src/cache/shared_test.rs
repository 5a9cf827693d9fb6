use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use serde_json::json;
use serde_json::Value;

use super::*;
use crate::CacheError;
use crate::Error;

fn new_cache(capacity: usize) -> (tempfile::TempDir, SharedCache<Value>) {
    let temp_dir = tempfile::tempdir().unwrap();
    let cache = SharedCache::create(temp_dir.path().join("segment.seg"), capacity).unwrap();
    (temp_dir, cache)
}

#[test]
fn test_set_then_get_round_trip() {
    let (_dir, cache) = new_cache(1024);

    cache.set("db.url", json!("postgres://db:5432")).unwrap();
    cache.set("limits", json!({"rps": 100, "burst": [1, 2]})).unwrap();

    assert_eq!(cache.get("db.url").unwrap(), Some(json!("postgres://db:5432")));
    assert_eq!(
        cache.get("limits").unwrap(),
        Some(json!({"rps": 100, "burst": [1, 2]}))
    );
    assert_eq!(cache.len().unwrap(), 2);
}

#[test]
fn test_delete_then_contains_is_false() {
    let (_dir, cache) = new_cache(1024);
    cache.set("k", json!(1)).unwrap();

    assert_eq!(cache.delete("k").unwrap(), Some(json!(1)));
    assert!(!cache.contains("k").unwrap());
    assert_eq!(cache.get("k").unwrap(), None);
}

#[test]
fn test_fresh_segment_is_empty() {
    let (_dir, cache) = new_cache(64);

    assert!(cache.is_empty().unwrap());
    assert_eq!(cache.used_bytes().unwrap(), 0);
    assert!(cache.keys().unwrap().is_empty());
}

#[test]
fn test_overflow_fails_and_keeps_previous_state() {
    // {"a":1} is 7 bytes
    let (_dir, cache) = new_cache(16);
    cache.set("a", json!(1)).unwrap();
    let before = cache.used_bytes().unwrap();

    let result = cache.set("big", json!("this value does not fit"));

    match result {
        Err(Error::Cache(CacheError::CapacityExceeded { required, capacity })) => {
            assert_eq!(capacity, 16);
            assert!(required > 16);
        }
        other => panic!("expected CapacityExceeded, got {:?}", other),
    }
    assert_eq!(cache.get("a").unwrap(), Some(json!(1)));
    assert!(!cache.contains("big").unwrap());
    assert_eq!(cache.used_bytes().unwrap(), before);
}

#[test]
fn test_bulk_extend_is_all_or_nothing() {
    let (_dir, cache) = new_cache(32);
    cache.set("keep", json!(true)).unwrap();

    let mut bulk = BTreeMap::new();
    bulk.insert("x".to_string(), json!(1));
    bulk.insert("y".to_string(), json!("a value long enough to overflow"));

    assert!(cache.extend(bulk).is_err());
    assert_eq!(cache.keys().unwrap(), vec!["keep".to_string()]);
}

#[test]
fn test_clear_resets_payload() {
    let (_dir, cache) = new_cache(256);
    cache.set("a", json!(1)).unwrap();
    cache.set("b", json!(2)).unwrap();

    cache.clear().unwrap();

    assert!(cache.is_empty().unwrap());
    assert_eq!(cache.used_bytes().unwrap(), 0);
}

#[test]
fn test_independent_handles_share_contents() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("shared.seg");

    // Two separate mappings of one file behave like two processes
    let writer: SharedCache<Value> = SharedCache::create(&path, 512).unwrap();
    let reader: SharedCache<Value> = SharedCache::open(&path).unwrap();

    writer.set("feature.x", json!(true)).unwrap();
    assert_eq!(reader.get("feature.x").unwrap(), Some(json!(true)));

    reader.delete("feature.x").unwrap();
    assert!(!writer.contains("feature.x").unwrap());
    assert_eq!(reader.capacity(), 512);
}

#[test]
fn test_create_attaches_to_existing_segment() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("shared.seg");

    let first: SharedCache<Value> = SharedCache::create(&path, 128).unwrap();
    first.set("a", json!(1)).unwrap();

    let second: SharedCache<Value> = SharedCache::create(&path, 128).unwrap();
    assert_eq!(second.get("a").unwrap(), Some(json!(1)));

    let mismatched = SharedCache::<Value>::create(&path, 256);
    assert!(matches!(
        mismatched,
        Err(Error::Cache(CacheError::InvalidSegment { .. }))
    ));
}

#[test]
fn test_create_after_last_handle_dropped_starts_empty() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("shared.seg");

    let first: SharedCache<Value> = SharedCache::create(&path, 128).unwrap();
    first.set("a", json!(1)).unwrap();
    let clone = first.clone();
    drop(first);
    // a live clone keeps the contents attached
    let second: SharedCache<Value> = SharedCache::create(&path, 128).unwrap();
    assert_eq!(second.get("a").unwrap(), Some(json!(1)));

    drop(clone);
    drop(second);
    let third: SharedCache<Value> = SharedCache::create(&path, 128).unwrap();
    assert!(!third.contains("a").unwrap());
    assert_eq!(third.used_bytes().unwrap(), 0);
}

#[test]
fn test_open_does_not_discard_contents() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("shared.seg");

    let writer: SharedCache<Value> = SharedCache::create(&path, 128).unwrap();
    writer.set("a", json!(1)).unwrap();
    drop(writer);

    let reader: SharedCache<Value> = SharedCache::open(&path).unwrap();
    assert_eq!(reader.get("a").unwrap(), Some(json!(1)));
}

#[test]
fn test_open_rejects_foreign_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("not_a_segment");
    std::fs::write(&path, vec![b'x'; 64]).unwrap();

    let result = SharedCache::<Value>::open(&path);
    assert!(matches!(result, Err(Error::Cache(CacheError::InvalidSegment { .. }))));
}

#[test]
fn test_open_missing_segment_fails() {
    let temp_dir = tempfile::tempdir().unwrap();

    assert!(SharedCache::<Value>::open(temp_dir.path().join("missing.seg")).is_err());
}

#[test]
fn test_concurrent_writers_do_not_lose_updates() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("contended.seg");
    let first: SharedCache<Value> = SharedCache::create(&path, 8192).unwrap();
    let second: SharedCache<Value> = SharedCache::open(&path).unwrap();
    let handles = Arc::new([first, second]);

    let mut threads = Vec::new();
    for t in 0..4 {
        let handles = handles.clone();
        threads.push(thread::spawn(move || {
            let cache = &handles[t % 2];
            for i in 0..25 {
                cache.set(&format!("t{t}-k{i}"), json!(i)).unwrap();
            }
        }));
    }
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(handles[0].len().unwrap(), 100);
    assert_eq!(handles[1].get("t3-k24").unwrap(), Some(json!(24)));
}

#[test]
fn test_typed_values_round_trip() {
    let temp_dir = tempfile::tempdir().unwrap();
    let cache: SharedCache<crate::NamespaceSnapshot> =
        SharedCache::create(temp_dir.path().join("snapshots.seg"), 1024).unwrap();

    let mut snapshot = crate::NamespaceSnapshot::new();
    snapshot.insert("timeout".to_string(), json!("30"));
    cache.set("application", snapshot.clone()).unwrap();

    assert_eq!(cache.get("application").unwrap(), Some(snapshot));
}
