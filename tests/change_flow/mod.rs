use std::time::Duration;

use confsync::ChangeEvent;
use confsync::ChangeKind;
use confsync::SyncEngineBuilder;
use mockito::Matcher;
use mockito::Server;
use serde_json::json;

use crate::common::cache_file;
use crate::common::client_config;
use crate::common::CollectingListener;
use crate::enable_logger;

// # Case 1: publish, then republish a namespace
//
// ## Criterias:
// 1. start() materializes the first release and reports every key as added
// 2. the background loop picks up the second release
// 3. the listener sees exactly one update and one add for it
// 4. the cache file holds the latest release
//
#[tokio::test]
async fn test_change_flow_case1() {
    enable_logger();
    let temp_dir = tempfile::tempdir().unwrap();
    let mut server = Server::new_async().await;

    let poll_v1 = server
        .mock("GET", "/notifications/v2")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"[{"namespaceName":"application","notificationId":1}]"#)
        .create_async()
        .await;
    let fetch_v1 = server
        .mock("GET", "/configs/billing/default/application")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"configurations":{"timeout":"30"},"releaseKey":"r1"}"#)
        .create_async()
        .await;

    let mut config = client_config(&server.url(), temp_dir.path(), &["application"]);
    config.poll.hot_update = true;
    let listener = CollectingListener::new();
    let engine = SyncEngineBuilder::new(config)
        .listener(listener.clone())
        .build()
        .unwrap();

    engine.start().await.unwrap();
    assert_eq!(
        listener.events(),
        vec![ChangeEvent::new(ChangeKind::Add, "application", "timeout", json!("30"))]
    );
    assert_eq!(engine.get("timeout").await, Some(json!("30")));

    // republish
    fetch_v1.remove_async().await;
    poll_v1.remove_async().await;
    server
        .mock("GET", "/configs/billing/default/application")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"configurations":{"timeout":"45","retries":"3"},"releaseKey":"r2"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/notifications/v2")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"[{"namespaceName":"application","notificationId":2}]"#)
        .create_async()
        .await;

    tokio::time::sleep(Duration::from_millis(500)).await;
    engine.shutdown().await.unwrap();

    assert_eq!(
        listener.events()[1..].to_vec(),
        vec![
            ChangeEvent::new(ChangeKind::Update, "application", "timeout", json!("45")),
            ChangeEvent::new(ChangeKind::Add, "application", "retries", json!("3")),
        ]
    );
    assert_eq!(engine.get("retries").await, Some(json!("3")));

    let on_disk = std::fs::read_to_string(cache_file(temp_dir.path(), "application")).unwrap();
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(on_disk.trim_end()).unwrap(),
        json!({"timeout": "45", "retries": "3"})
    );
}

// # Case 2: service keeps answering 304
//
// ## Criterias:
// 1. start() succeeds without fetching anything
// 2. no event is dispatched
//
#[tokio::test]
async fn test_change_flow_case2() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/notifications/v2")
        .match_query(Matcher::Any)
        .with_status(304)
        .create_async()
        .await;
    let fetch = server
        .mock("GET", Matcher::Regex(r"^/configs/".to_string()))
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let listener = CollectingListener::new();
    let config = client_config(&server.url(), temp_dir.path(), &["application"]);
    let engine = SyncEngineBuilder::new(config)
        .listener(listener.clone())
        .build()
        .unwrap();

    engine.start().await.unwrap();

    assert!(listener.events().is_empty());
    fetch.assert_async().await;
}
