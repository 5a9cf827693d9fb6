use confsync::SyncEngineBuilder;
use serde_json::json;

use crate::common::cache_file;
use crate::common::client_config;
use crate::common::CollectingListener;

const UNREACHABLE: &str = "http://127.0.0.1:1";

fn seed(
    base_path: &std::path::Path,
    namespace: &str,
    line: &str,
) {
    let path = cache_file(base_path, namespace);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, format!("{line}\n")).unwrap();
}

// # Case 1: service unreachable, cache files present
//
// ## Criterias:
// 1. start() succeeds and serves values from the cache files
// 2. lookups fall back across namespaces in sorted order
// 3. no event is dispatched for restored snapshots
//
#[tokio::test]
async fn test_offline_fallback_case1() {
    let temp_dir = tempfile::tempdir().unwrap();
    seed(temp_dir.path(), "application", r#"{"timeout":"30"}"#);
    seed(temp_dir.path(), "shared.db", r#"{"db.url":"postgres://cached:5432"}"#);

    let listener = CollectingListener::new();
    let engine = SyncEngineBuilder::new(client_config(
        UNREACHABLE,
        temp_dir.path(),
        &["application", "shared.db"],
    ))
    .listener(listener.clone())
    .build()
    .unwrap();

    engine.start().await.unwrap();

    assert_eq!(engine.get("timeout").await, Some(json!("30")));
    assert_eq!(
        engine.get_value("db.url", "application").await,
        Some(json!("postgres://cached:5432"))
    );
    assert_eq!(
        engine.get_value_or("missing", "application", json!(0)).await,
        json!(0)
    );
    assert!(listener.events().is_empty());
}

// # Case 2: service unreachable, cache file corrupt
//
// ## Criterias:
// 1. start() fails
//
#[tokio::test]
async fn test_offline_fallback_case2() {
    let temp_dir = tempfile::tempdir().unwrap();
    seed(temp_dir.path(), "application", "{truncated");

    let config = client_config(UNREACHABLE, temp_dir.path(), &["application"]);
    let engine = SyncEngineBuilder::new(config).build().unwrap();

    assert!(engine.start().await.is_err());
}
