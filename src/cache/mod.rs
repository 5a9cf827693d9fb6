//! Snapshot backings behind one map interface.
//!
//! The store and the engine only see [`KvMap`]; whether snapshots live in
//! process memory ([`MemoryMap`]) or in a segment shared by several
//! processes ([`SharedCache`]) is decided once, at build time.

mod memory;
mod shared;
pub use memory::*;
pub use shared::*;

#[cfg(test)]
mod shared_test;

use std::collections::BTreeMap;

use crate::Result;

/// Complete key/value configuration of one namespace
pub type NamespaceSnapshot = serde_json::Map<String, serde_json::Value>;

/// String-keyed map with whole-value replacement semantics.
///
/// Reads return `Result` because a shared backing decodes its contents on
/// every access. A missing key is `Ok(None)`, never an error.
pub trait KvMap<V>: Send + Sync {
    fn get(
        &self,
        key: &str,
    ) -> Result<Option<V>>;

    fn set(
        &self,
        key: &str,
        value: V,
    ) -> Result<()>;

    /// Removes `key`, returning the previous value if there was one
    fn delete(
        &self,
        key: &str,
    ) -> Result<Option<V>>;

    fn contains(
        &self,
        key: &str,
    ) -> Result<bool>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Keys in enumeration order
    fn keys(&self) -> Result<Vec<String>>;

    /// Point-in-time copy of every entry
    fn entries(&self) -> Result<BTreeMap<String, V>>;

    /// Applies all `entries` as one mutation
    fn extend(
        &self,
        entries: BTreeMap<String, V>,
    ) -> Result<()>;

    fn clear(&self) -> Result<()>;
}
