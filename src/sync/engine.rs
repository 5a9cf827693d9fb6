use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::async_task::spawn_task;
use crate::constants::DEFAULT_NAMESPACE;
use crate::DurableNamespaceStore;
use crate::NamespaceSnapshot;
use crate::NotificationTracker;
use crate::Poller;
use crate::Result;
use crate::SyncConfig;

/// Keeps local namespace snapshots in sync with the configuration service.
///
/// Created by [`SyncEngineBuilder`](crate::SyncEngineBuilder). After
/// [`start`](Self::start) lookups are served from the local store; with
/// `poll.hot_update` a background task keeps long polling until
/// [`stop`](Self::stop).
pub struct SyncEngine {
    config: SyncConfig,
    tracker: Arc<NotificationTracker>,
    store: Arc<DurableNamespaceStore>,
    poller: Arc<Poller>,
    started: AtomicBool,
    shutdown: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("tracker", &self.tracker)
            .field("running", &self.is_running())
            .finish()
    }
}

impl SyncEngine {
    pub(crate) fn new(
        config: SyncConfig,
        tracker: Arc<NotificationTracker>,
        store: Arc<DurableNamespaceStore>,
        poller: Arc<Poller>,
    ) -> Self {
        Self {
            config,
            tracker,
            store,
            poller,
            started: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Performs the initial long poll and starts background polling.
    ///
    /// When the initial poll makes no progress, every tracked namespace is
    /// loaded from its cache file instead, without dispatching events.
    /// Calling `start` again is a no-op.
    ///
    /// # Errors
    /// A cache file exists but cannot be parsed, or the fallback snapshot
    /// cannot be stored.
    pub async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("sync engine already started");
            return Ok(());
        }

        if !self.poller.long_poll().await {
            warn!("initial long poll failed, loading namespaces from local cache");
            if let Err(e) = self.restore_from_disk() {
                self.started.store(false, Ordering::SeqCst);
                return Err(e);
            }
        }

        if self.config.poll.hot_update {
            self.spawn_background_tasks();
        }
        Ok(())
    }

    fn restore_from_disk(&self) -> Result<()> {
        for namespace in self.tracker.namespaces() {
            let snapshot = self.store.load_from_disk(&namespace)?;
            info!(
                "namespace {} restored from cache ({} keys)",
                namespace,
                snapshot.len()
            );
            self.store.install(&namespace, snapshot)?;
        }
        Ok(())
    }

    fn spawn_background_tasks(&self) {
        let mut handles = self.handles.lock();

        let poller = self.poller.clone();
        let interval = self.config.poll.cycle_interval();
        let shutdown = self.shutdown.clone();
        spawn_task(
            "long_poll_loop",
            move || run_poll_loop(poller, interval, shutdown),
            Some(&mut *handles),
        );

        if let Some(period) = self.config.poll.refresh_interval() {
            let poller = self.poller.clone();
            let shutdown = self.shutdown.clone();
            spawn_task(
                "refresh_loop",
                move || run_refresh_loop(poller, period, shutdown),
                Some(&mut *handles),
            );
        }
    }

    /// Value of `key`, looked up in `namespace` first and then in every other
    /// tracked namespace in sorted order.
    ///
    /// A namespace seen for the first time is registered and long polled
    /// once, so this call may block for up to the long-poll timeout.
    pub async fn get_value(
        &self,
        key: &str,
        namespace: &str,
    ) -> Option<Value> {
        self.ensure_namespace(namespace).await;

        match self.store.lookup(namespace, key) {
            Ok(Some(value)) => return Some(value),
            Ok(None) => {}
            Err(e) => {
                error!("lookup of {}/{} failed: {}", namespace, key, e);
                return None;
            }
        }

        for other in self.tracker.namespaces() {
            if other == namespace {
                continue;
            }
            match self.store.lookup(&other, key) {
                Ok(Some(value)) => {
                    debug!("{} not in {}, served from {}", key, namespace, other);
                    return Some(value);
                }
                Ok(None) => {}
                Err(e) => {
                    error!("lookup of {}/{} failed: {}", other, key, e);
                    return None;
                }
            }
        }
        None
    }

    pub async fn get_value_or(
        &self,
        key: &str,
        namespace: &str,
        default: Value,
    ) -> Value {
        self.get_value(key, namespace).await.unwrap_or(default)
    }

    /// Value of `key` in the `application` namespace
    pub async fn get(
        &self,
        key: &str,
    ) -> Option<Value> {
        self.get_value(key, DEFAULT_NAMESPACE).await
    }

    /// Whole snapshot of `namespace`; empty when unknown or unreadable
    pub async fn get_all(
        &self,
        namespace: &str,
    ) -> NamespaceSnapshot {
        self.ensure_namespace(namespace).await;

        match self.store.get(namespace) {
            Ok(snapshot) => snapshot.unwrap_or_default(),
            Err(e) => {
                error!("reading namespace {} failed: {}", namespace, e);
                NamespaceSnapshot::new()
            }
        }
    }

    /// Tracks `namespace` and long polls once on first sight
    async fn ensure_namespace(
        &self,
        namespace: &str,
    ) {
        if !self.tracker.register(namespace) {
            return;
        }
        debug!("namespace {} now tracked", namespace);

        match self.store.contains(namespace) {
            Ok(true) => {}
            Ok(false) => {
                if let Err(e) = self.store.install(namespace, NamespaceSnapshot::new()) {
                    error!("could not materialize namespace {}: {}", namespace, e);
                    return;
                }
            }
            Err(e) => error!("reading namespace {} failed: {}", namespace, e),
        }
        self.poller.long_poll().await;
    }

    /// Tracked namespaces, sorted
    pub fn namespaces(&self) -> Vec<String> {
        self.tracker.namespaces()
    }

    pub fn store(&self) -> &Arc<DurableNamespaceStore> {
        &self.store
    }

    pub fn tracker(&self) -> &Arc<NotificationTracker> {
        &self.tracker
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.shutdown.is_cancelled()
    }

    /// Asks the background tasks to exit after their current iteration.
    /// Does not wait for them.
    pub fn stop(&self) {
        if !self.shutdown.is_cancelled() {
            info!("stopping sync engine");
        }
        self.shutdown.cancel();
    }

    /// Stops and waits for the background tasks to exit
    pub async fn shutdown(&self) -> Result<()> {
        self.stop();
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            handle.await?;
        }
        Ok(())
    }
}

async fn run_poll_loop(
    poller: Arc<Poller>,
    interval: Duration,
    shutdown: CancellationToken,
) -> Result<()> {
    info!("background long poll started");
    while !shutdown.is_cancelled() {
        poller.long_poll().await;

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    info!("background long poll stopped");
    Ok(())
}

async fn run_refresh_loop(
    poller: Arc<Poller>,
    period: Duration,
    shutdown: CancellationToken,
) -> Result<()> {
    info!("periodic refresh every {:?}", period);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(period) => {}
        }

        let applied = poller.refresh_all().await;
        if applied > 0 {
            info!("refresh applied {} namespaces", applied);
        }
    }
    Ok(())
}
