use confsync::KvMap;
use confsync::NamespaceSnapshot;
use confsync::SharedCache;
use confsync::SyncEngineBuilder;
use mockito::Matcher;
use mockito::Server;
use serde_json::json;

use crate::common::client_config;

// # Case 1: snapshots kept in a shared segment
//
// ## Criterias:
// 1. an independent handle on the segment sees what the engine fetched
//
#[tokio::test]
async fn test_shared_segment_case1() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/notifications/v2")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"[{"namespaceName":"application","notificationId":7}]"#)
        .create_async()
        .await;
    server
        .mock("GET", "/configs/billing/default/application")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"configurations":{"feature.x":"on"}}"#)
        .create_async()
        .await;

    let segment_path = temp_dir.path().join("segments/billing.seg");
    let mut config = client_config(&server.url(), temp_dir.path(), &["application"]);
    config.cache.shared.enabled = true;
    config.cache.shared.segment_path = segment_path.clone();
    config.cache.shared.capacity_in_bytes = 4096;

    let engine = SyncEngineBuilder::new(config).build().unwrap();
    engine.start().await.unwrap();

    let other_process: SharedCache<NamespaceSnapshot> = SharedCache::open(&segment_path).unwrap();
    let snapshot = other_process.get("application").unwrap().unwrap();
    assert_eq!(snapshot.get("feature.x"), Some(&json!("on")));
    assert_eq!(other_process.capacity(), 4096);
}
