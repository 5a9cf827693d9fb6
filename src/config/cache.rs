use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use super::validate_directory;
use crate::constants::SHARED_SEGMENT_SUFFIX;
use crate::Error;
use crate::Result;

/// Local persistence of namespace snapshots
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    /// Root under which `cache_dir` lives
    ///
    /// Default: current directory
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,

    /// Directory (relative to `base_path`) holding one file per namespace
    ///
    /// Default: `apollo/cache`
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    #[serde(default)]
    pub shared: SharedCacheConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            cache_dir: default_cache_dir(),
            shared: SharedCacheConfig::default(),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cache_dir.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "cache.cache_dir cannot be empty".into(),
            )));
        }
        validate_directory(&self.cache_file_dir(), "cache")?;
        self.shared.validate()
    }

    /// Directory the namespace cache files are written to
    pub fn cache_file_dir(&self) -> PathBuf {
        self.base_path.join(&self.cache_dir)
    }

    /// Location of the shared segment for `app_id`
    pub fn segment_path(
        &self,
        app_id: &str,
    ) -> PathBuf {
        if self.shared.segment_path.as_os_str().is_empty() {
            self.cache_file_dir().join(format!("{app_id}{SHARED_SEGMENT_SUFFIX}"))
        } else {
            self.shared.segment_path.clone()
        }
    }
}

/// Multi-process snapshot sharing
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SharedCacheConfig {
    /// Keep snapshots in a shared segment instead of process memory
    #[serde(default = "default_shared_enabled")]
    pub enabled: bool,

    /// Segment file. Empty means `{cache dir}/{app_id}_shared.seg`.
    #[serde(default)]
    pub segment_path: PathBuf,

    /// Payload capacity; must hold the serialized snapshots of all namespaces
    #[serde(default = "default_capacity")]
    pub capacity_in_bytes: usize,
}

impl Default for SharedCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_shared_enabled(),
            segment_path: PathBuf::new(),
            capacity_in_bytes: default_capacity(),
        }
    }
}

impl SharedCacheConfig {
    fn validate(&self) -> Result<()> {
        if self.enabled && self.capacity_in_bytes == 0 {
            return Err(Error::Config(ConfigError::Message(
                "cache.shared.capacity_in_bytes must be > 0 when enabled".into(),
            )));
        }
        Ok(())
    }
}

fn default_base_path() -> PathBuf {
    PathBuf::from(".")
}
fn default_cache_dir() -> String {
    "apollo/cache".to_string()
}
fn default_shared_enabled() -> bool {
    true
}
fn default_capacity() -> usize {
    4096 * 10 * 3
}
