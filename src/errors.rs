//! Configuration Sync Error Hierarchy
//!
//! Defines the error types of the synchronization engine, categorized by
//! layer: infrastructure (network, disk, serialization), configuration and
//! the shared cache segment.

use std::path::PathBuf;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (network, storage, serialization)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Shared cache segment failures
    #[error(transparent)]
    Cache(#[from] CacheError),
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    // Network layer
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    // Storage layer
    #[error("Storage operation failed: {0}")]
    Storage(#[from] StorageError),

    //Serialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// HTTP client failures (connect, timeout, body read)
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Malformed service addresses
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Response body could not be decoded
    #[error("Malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: &'static str, reason: String },

    /// Computed header value is not valid HTTP
    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    #[error("{0}")]
    SignalSendFailed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Disk I/O failures while reading or writing cache files
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// I/O failure bound to a concrete path
    #[error("Error occurred at path: {path}")]
    PathError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A namespace cache file exists but cannot be parsed
    #[error("Corrupt cache file {path}: {source}")]
    CorruptCacheFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// Serialization is classified separately (used by both the disk and the shared cache path)
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Serialized aggregate does not fit into the segment
    #[error("Shared cache capacity exceeded: {required} bytes required, {capacity} available")]
    CapacityExceeded { required: usize, capacity: usize },

    /// Segment payload is not a valid serialization of the aggregate
    #[error("Shared cache segment is corrupt: {0}")]
    CorruptSegment(String),

    /// Segment file exists but is not a cache segment
    #[error("Invalid shared cache segment {path}: {reason}")]
    InvalidSegment { path: PathBuf, reason: String },

    /// Cross-process lock could not be taken or released
    #[error("Shared cache lock failed: {0}")]
    Lock(String),
}

// ============== Conversion Implementations ============== //
impl From<NetworkError> for Error {
    fn from(e: NetworkError) -> Self {
        Error::System(SystemError::Network(e))
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::System(SystemError::Storage(e))
    }
}

impl From<SerializationError> for Error {
    fn from(e: SerializationError) -> Self {
        Error::System(SystemError::Serialization(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        SerializationError::Json(e).into()
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        StorageError::IoError(e).into()
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        NetworkError::Http(e).into()
    }
}

impl From<JoinError> for Error {
    fn from(err: JoinError) -> Self {
        NetworkError::TaskFailed(err).into()
    }
}
