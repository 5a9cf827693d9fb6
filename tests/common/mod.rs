use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use confsync::ChangeEvent;
use confsync::ChangeListener;
use confsync::ListenerError;
use confsync::SyncConfig;
use parking_lot::Mutex;

pub const APP_ID: &str = "billing";

/// Config for a test client talking to `config_url`, caching under `base_path`
pub fn client_config(
    config_url: &str,
    base_path: &Path,
    namespaces: &[&str],
) -> SyncConfig {
    let mut config = SyncConfig::default();
    config.server.config_url = config_url.to_string();
    config.server.app_id = APP_ID.to_string();
    config.server.ip = "10.0.0.1".to_string();
    config.poll.namespaces = namespaces.iter().map(|ns| ns.to_string()).collect();
    config.poll.long_poll_timeout_in_ms = 2_000;
    config.poll.fetch_timeout_in_ms = 1_000;
    config.poll.cycle_interval_in_ms = 50;
    config.poll.hot_update = false;
    config.cache.base_path = base_path.to_path_buf();
    config.cache.shared.enabled = false;
    config.validate().expect("test config is valid")
}

pub fn cache_file(
    base_path: &Path,
    namespace: &str,
) -> PathBuf {
    base_path
        .join("apollo/cache")
        .join(format!("{APP_ID}_configuration_{namespace}.txt"))
}

/// Listener collecting every event for later inspection
#[derive(Default)]
pub struct CollectingListener {
    events: Mutex<Vec<ChangeEvent>>,
}

impl CollectingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().clone()
    }
}

impl ChangeListener for CollectingListener {
    fn on_change(
        &self,
        event: &ChangeEvent,
    ) -> Result<(), ListenerError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
