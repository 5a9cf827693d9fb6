use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::constants::CACHE_FILE_EXTENSION;
use crate::constants::CACHE_FILE_INFIX;
use crate::file_io::read_first_line;
use crate::file_io::write_file_atomically;
use crate::metrics::CACHE_FILE_WRITE_METRIC;
use crate::ChangeDispatcher;
use crate::KvMap;
use crate::NamespaceSnapshot;
use crate::Result;
use crate::StorageError;

/// Current snapshot of every namespace, mirrored to one cache file per
/// namespace so a restart without network still has configuration.
///
/// Disk writes are skipped when the serialized snapshot hashes to the value
/// recorded by the previous write.
pub struct DurableNamespaceStore {
    app_id: String,
    cache_dir: PathBuf,
    snapshots: Arc<dyn KvMap<NamespaceSnapshot>>,
    hashes: DashMap<String, String>,
    dispatcher: ChangeDispatcher,
}

impl std::fmt::Debug for DurableNamespaceStore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("DurableNamespaceStore")
            .field("app_id", &self.app_id)
            .field("cache_dir", &self.cache_dir)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

impl DurableNamespaceStore {
    pub fn new(
        app_id: impl Into<String>,
        cache_dir: impl Into<PathBuf>,
        snapshots: Arc<dyn KvMap<NamespaceSnapshot>>,
        dispatcher: ChangeDispatcher,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            cache_dir: cache_dir.into(),
            snapshots,
            hashes: DashMap::new(),
            dispatcher,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// `{cache_dir}/{app_id}_configuration_{namespace}.txt`
    pub fn cache_file_path(
        &self,
        namespace: &str,
    ) -> PathBuf {
        self.cache_dir.join(format!(
            "{}{}{}.{}",
            self.app_id, CACHE_FILE_INFIX, namespace, CACHE_FILE_EXTENSION
        ))
    }

    /// Replaces the snapshot of `namespace`, persists it unless its content
    /// hash is unchanged, and dispatches the diff when `notify` is set.
    ///
    /// # Errors
    /// - the snapshot backing rejects the write (shared cache overflow); the
    ///   previous snapshot and the cache file are left as they were
    /// - the cache file cannot be written; the snapshot is replaced and its
    ///   diff dispatched regardless
    pub fn update(
        &self,
        namespace: &str,
        snapshot: NamespaceSnapshot,
        notify: bool,
    ) -> Result<()> {
        let serialized = serde_json::to_string(&snapshot)?;
        let hash = content_hash(&serialized);

        let old = self.snapshots.get(namespace)?;
        self.snapshots.set(namespace, snapshot.clone())?;

        let persisted = self.persist(namespace, serialized, hash);

        // the new snapshot is live even if the cache file write failed
        if notify {
            self.dispatcher.dispatch(namespace, old.as_ref(), Some(&snapshot));
        }
        persisted
    }

    fn persist(
        &self,
        namespace: &str,
        serialized: String,
        hash: String,
    ) -> Result<()> {
        let unchanged = self
            .hashes
            .get(namespace)
            .map(|recorded| *recorded == hash)
            .unwrap_or(false);
        if unchanged {
            debug!("namespace {} unchanged, cache file write skipped", namespace);
            CACHE_FILE_WRITE_METRIC.with_label_values(&["skipped"]).inc();
            return Ok(());
        }

        let path = self.cache_file_path(namespace);
        let mut line = serialized;
        line.push('\n');
        if let Err(e) = write_file_atomically(&path, line.as_bytes()) {
            warn!("writing cache file {} failed: {}", path.display(), e);
            CACHE_FILE_WRITE_METRIC.with_label_values(&["failed"]).inc();
            return Err(e);
        }
        self.hashes.insert(namespace.to_string(), hash);
        CACHE_FILE_WRITE_METRIC.with_label_values(&["written"]).inc();
        info!("namespace {} written to {}", namespace, path.display());
        Ok(())
    }

    /// Replaces the snapshot of `namespace` in memory only
    pub fn install(
        &self,
        namespace: &str,
        snapshot: NamespaceSnapshot,
    ) -> Result<()> {
        self.snapshots.set(namespace, snapshot)
    }

    /// Parses the cache file of `namespace`.
    ///
    /// # Returns
    /// The stored snapshot, or an empty one when no cache file exists.
    ///
    /// # Errors
    /// `StorageError::CorruptCacheFile` when the first line is not a JSON
    /// object.
    pub fn load_from_disk(
        &self,
        namespace: &str,
    ) -> Result<NamespaceSnapshot> {
        let path = self.cache_file_path(namespace);
        let Some(line) = read_first_line(&path)? else {
            debug!("no cache file for namespace {} at {}", namespace, path.display());
            return Ok(NamespaceSnapshot::new());
        };
        if line.trim().is_empty() {
            warn!("cache file {} is empty", path.display());
            return Ok(NamespaceSnapshot::new());
        }

        serde_json::from_str(&line)
            .map_err(|e| StorageError::CorruptCacheFile { path, source: e }.into())
    }

    pub fn get(
        &self,
        namespace: &str,
    ) -> Result<Option<NamespaceSnapshot>> {
        self.snapshots.get(namespace)
    }

    /// Value of `key` in `namespace`, if both exist
    pub fn lookup(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<Value>> {
        Ok(self
            .snapshots
            .get(namespace)?
            .and_then(|mut snapshot| snapshot.remove(key)))
    }

    pub fn contains(
        &self,
        namespace: &str,
    ) -> Result<bool> {
        self.snapshots.contains(namespace)
    }

    /// Namespaces holding a snapshot, in enumeration order
    pub fn namespaces(&self) -> Result<Vec<String>> {
        self.snapshots.keys()
    }

    pub fn entries(&self) -> Result<BTreeMap<String, NamespaceSnapshot>> {
        self.snapshots.entries()
    }
}

/// Hex SHA-256 of a serialized snapshot
pub(crate) fn content_hash(serialized: &str) -> String {
    format!("{:x}", Sha256::digest(serialized.as_bytes()))
}
