use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::KvMap;
use crate::Result;

/// In-process [`KvMap`] backing
#[derive(Debug)]
pub struct MemoryMap<V> {
    entries: RwLock<BTreeMap<String, V>>,
}

impl<V> MemoryMap<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<V> Default for MemoryMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> KvMap<V> for MemoryMap<V>
where
    V: Clone + Send + Sync,
{
    fn get(
        &self,
        key: &str,
    ) -> Result<Option<V>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(
        &self,
        key: &str,
        value: V,
    ) -> Result<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    fn delete(
        &self,
        key: &str,
    ) -> Result<Option<V>> {
        Ok(self.entries.write().remove(key))
    }

    fn contains(
        &self,
        key: &str,
    ) -> Result<bool> {
        Ok(self.entries.read().contains_key(key))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.read().len())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn entries(&self) -> Result<BTreeMap<String, V>> {
        Ok(self.entries.read().clone())
    }

    fn extend(
        &self,
        entries: BTreeMap<String, V>,
    ) -> Result<()> {
        self.entries.write().extend(entries);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries.write().clear();
        Ok(())
    }
}
