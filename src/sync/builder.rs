//! Assembles a [`SyncEngine`] from a [`SyncConfig`].
//!
//! Every collaborator has a production default (HTTP transport, shared or
//! in-process snapshot backing chosen by `cache.shared.enabled`, no
//! listener); tests and embedders override them through the setters.
//!
//! ## Example
//! ```ignore
//! let engine = SyncEngineBuilder::new(config)
//!     .listener(Arc::new(LoggingListener))
//!     .build()?;
//! engine.start().await?;
//! ```

use std::sync::Arc;

use tracing::info;

use super::SyncEngine;
use crate::net::resolve_client_ip;
use crate::ChangeDispatcher;
use crate::ChangeListener;
use crate::ConfigTransport;
use crate::DurableNamespaceStore;
use crate::HttpTransport;
use crate::KvMap;
use crate::MemoryMap;
use crate::NamespaceSnapshot;
use crate::NotificationTracker;
use crate::Poller;
use crate::Result;
use crate::SharedCache;
use crate::StorageError;
use crate::SyncConfig;

pub struct SyncEngineBuilder {
    config: SyncConfig,
    transport: Option<Arc<dyn ConfigTransport>>,
    listener: Option<Arc<dyn ChangeListener>>,
    snapshots: Option<Arc<dyn KvMap<NamespaceSnapshot>>>,
}

impl SyncEngineBuilder {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            transport: None,
            listener: None,
            snapshots: None,
        }
    }

    /// Sets a custom transport to the configuration service
    pub fn transport(
        mut self,
        transport: Arc<dyn ConfigTransport>,
    ) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the listener receiving change events
    pub fn listener(
        mut self,
        listener: Arc<dyn ChangeListener>,
    ) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Sets the map holding namespace snapshots
    pub fn snapshots(
        mut self,
        snapshots: Arc<dyn KvMap<NamespaceSnapshot>>,
    ) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    /// Creates the cache directory and any collaborator not set explicitly.
    ///
    /// # Errors
    /// - the cache directory cannot be created
    /// - the shared segment cannot be created or attached
    /// - the HTTP client cannot be built
    pub fn build(self) -> Result<SyncEngine> {
        let config = self.config;
        let cache_dir = config.cache.cache_file_dir();
        std::fs::create_dir_all(&cache_dir).map_err(|e| StorageError::PathError {
            path: cache_dir.clone(),
            source: e,
        })?;

        let snapshots: Arc<dyn KvMap<NamespaceSnapshot>> = match self.snapshots {
            Some(s) => s,
            None if config.cache.shared.enabled => {
                let segment_path = config.cache.segment_path(&config.server.app_id);
                info!("snapshots kept in shared segment {}", segment_path.display());
                Arc::new(SharedCache::<NamespaceSnapshot>::create(
                    &segment_path,
                    config.cache.shared.capacity_in_bytes,
                )?)
            }
            None => Arc::new(MemoryMap::<NamespaceSnapshot>::new()),
        };

        let transport: Arc<dyn ConfigTransport> = match self.transport {
            Some(t) => t,
            None => {
                let ip = resolve_client_ip(&config.server.ip);
                info!("reporting client ip {:?}", ip);
                Arc::new(HttpTransport::new(&config.server, &config.poll, ip)?)
            }
        };

        let store = Arc::new(DurableNamespaceStore::new(
            config.server.app_id.clone(),
            cache_dir,
            snapshots,
            ChangeDispatcher::new(self.listener),
        ));
        let tracker = Arc::new(NotificationTracker::with_namespaces(
            config.poll.namespaces.iter().cloned(),
        ));
        let poller = Arc::new(Poller::new(transport, tracker.clone(), store.clone()));

        Ok(SyncEngine::new(config, tracker, store, poller))
    }
}
