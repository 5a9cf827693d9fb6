use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::ChangeDispatcher;
use crate::ChangeEvent;
use crate::ChangeListener;
use crate::DurableNamespaceStore;
use crate::ListenerError;
use crate::MemoryMap;
use crate::NamespaceSnapshot;
use crate::SyncConfig;

pub(crate) const TEST_APP_ID: &str = "billing";

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

/// Snapshot from a JSON object literal
pub(crate) fn snapshot(value: Value) -> NamespaceSnapshot {
    match value {
        Value::Object(map) => map,
        other => panic!("snapshot expects a JSON object, got {other}"),
    }
}

/// Store over a fresh [`MemoryMap`] writing cache files into `cache_dir`
pub(crate) fn memory_store(
    cache_dir: &Path,
    listener: Option<Arc<dyn ChangeListener>>,
) -> DurableNamespaceStore {
    DurableNamespaceStore::new(
        TEST_APP_ID,
        cache_dir,
        Arc::new(MemoryMap::<NamespaceSnapshot>::new()),
        ChangeDispatcher::new(listener),
    )
}

/// Valid config pointing at `config_url` with caches under `base_path`
pub(crate) fn test_config(
    config_url: &str,
    base_path: &Path,
) -> SyncConfig {
    let mut config = SyncConfig::default();
    config.server.config_url = config_url.to_string();
    config.server.app_id = TEST_APP_ID.to_string();
    config.server.ip = "10.0.0.1".to_string();
    config.poll.long_poll_timeout_in_ms = 2_000;
    config.poll.fetch_timeout_in_ms = 1_000;
    config.poll.cycle_interval_in_ms = 50;
    config.cache.base_path = base_path.to_path_buf();
    config.cache.shared.enabled = false;
    config
}

/// Records every event it receives
#[derive(Default)]
pub(crate) struct RecordingListener {
    events: Mutex<Vec<ChangeEvent>>,
}

impl RecordingListener {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().clone()
    }
}

impl ChangeListener for RecordingListener {
    fn on_change(
        &self,
        event: &ChangeEvent,
    ) -> Result<(), ListenerError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Fails on one key and records the keys of all events it was handed
pub(crate) struct FailingListener {
    fail_on: String,
    seen: Mutex<Vec<String>>,
}

impl FailingListener {
    pub(crate) fn new(fail_on: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_on: fail_on.to_string(),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

impl ChangeListener for FailingListener {
    fn on_change(
        &self,
        event: &ChangeEvent,
    ) -> Result<(), ListenerError> {
        self.seen.lock().push(event.key.clone());
        if event.key == self.fail_on {
            return Err(format!("listener rejected {}", event.key).into());
        }
        Ok(())
    }
}
