use std::sync::Arc;

use serde_json::json;
use serde_json::Value;
use tracing_test::traced_test;

use super::*;
use crate::test_utils::snapshot;
use crate::test_utils::FailingListener;
use crate::test_utils::RecordingListener;

#[test]
fn test_diff_reports_add_update_delete() {
    let old = snapshot(json!({"a": 1, "b": 2}));
    let new = snapshot(json!({"b": 3, "c": 4}));

    let events = ChangeDispatcher::diff("application", Some(&old), Some(&new));

    assert_eq!(
        events,
        vec![
            ChangeEvent::new(ChangeKind::Delete, "application", "a", json!(1)),
            ChangeEvent::new(ChangeKind::Update, "application", "b", json!(3)),
            ChangeEvent::new(ChangeKind::Add, "application", "c", json!(4)),
        ]
    );
}

#[test]
fn test_diff_identical_snapshots_is_empty() {
    let old = snapshot(json!({"a": {"nested": [1, 2]}, "b": "x"}));
    let new = old.clone();

    assert!(ChangeDispatcher::diff("application", Some(&old), Some(&new)).is_empty());
}

#[test]
fn test_diff_first_observation_adds_every_key() {
    let new = snapshot(json!({"x": 1, "y": 2}));

    let events = ChangeDispatcher::diff("application", None, Some(&new));

    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.kind == ChangeKind::Add));
}

#[test]
fn test_diff_against_missing_new_deletes_every_key() {
    let old = snapshot(json!({"x": 1}));

    let events = ChangeDispatcher::diff("application", Some(&old), None);

    assert_eq!(
        events,
        vec![ChangeEvent::new(ChangeKind::Delete, "application", "x", json!(1))]
    );
}

#[test]
fn test_diff_null_value_is_an_update_not_a_delete() {
    let old = snapshot(json!({"x": 1}));
    let new = snapshot(json!({"x": null}));

    let events = ChangeDispatcher::diff("application", Some(&old), Some(&new));

    assert_eq!(
        events,
        vec![ChangeEvent::new(ChangeKind::Update, "application", "x", Value::Null)]
    );
}

#[test]
fn test_dispatch_delivers_events_in_diff_order() {
    let listener = RecordingListener::new();
    let dispatcher = ChangeDispatcher::new(Some(listener.clone()));
    let old = snapshot(json!({"a": 1}));
    let new = snapshot(json!({"b": 2}));

    let count = dispatcher.dispatch("shared.db", Some(&old), Some(&new));

    assert_eq!(count, 2);
    let events = listener.events();
    assert_eq!(events[0].kind, ChangeKind::Delete);
    assert_eq!(events[1], ChangeEvent::new(ChangeKind::Add, "shared.db", "b", json!(2)));
}

#[test]
fn test_dispatch_without_listener_is_noop() {
    let dispatcher = ChangeDispatcher::default();
    let new = snapshot(json!({"a": 1}));

    assert!(!dispatcher.has_listener());
    assert_eq!(dispatcher.dispatch("application", None, Some(&new)), 0);
}

#[test]
#[traced_test]
fn test_listener_failure_does_not_stop_remaining_events() {
    let listener = FailingListener::new("b");
    let dispatcher = ChangeDispatcher::new(Some(listener.clone()));
    let new = snapshot(json!({"a": 1, "b": 2, "c": 3}));

    dispatcher.dispatch("application", None, Some(&new));

    assert_eq!(listener.seen(), vec!["a", "b", "c"]);
    assert!(logs_contain("change listener failed"));
}

#[test]
#[traced_test]
fn test_panicking_listener_does_not_stop_remaining_events() {
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = seen.clone();
    let listener = move |event: &ChangeEvent| -> Result<(), ListenerError> {
        sink.lock().push(event.key.clone());
        if event.key == "b" {
            panic!("listener blew up on b");
        }
        Ok(())
    };
    let dispatcher = ChangeDispatcher::new(Some(Arc::new(listener)));
    let new = snapshot(json!({"a": 1, "b": 2, "c": 3}));

    assert_eq!(dispatcher.dispatch("application", None, Some(&new)), 3);

    assert_eq!(*seen.lock(), vec!["a", "b", "c"]);
    assert!(logs_contain("panicked: listener blew up on b"));
}

#[test]
fn test_closure_listener() {
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = seen.clone();
    let listener = move |event: &ChangeEvent| -> Result<(), ListenerError> {
        sink.lock().push(format!("{}:{}", event.kind, event.key));
        Ok(())
    };
    let dispatcher = ChangeDispatcher::new(Some(Arc::new(listener)));

    dispatcher.dispatch("application", None, Some(&snapshot(json!({"k": true}))));

    assert_eq!(*seen.lock(), vec!["add:k".to_string()]);
}

#[test]
#[traced_test]
fn test_logging_listener_logs_event() {
    let event = ChangeEvent::new(ChangeKind::Update, "application", "timeout", json!("30"));

    LoggingListener.on_change(&event).unwrap();

    assert!(logs_contain("[application] update timeout"));
}
