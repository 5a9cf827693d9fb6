use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::constants::UNOBSERVED_NOTIFICATION_ID;
use crate::network::NotificationEntry;

/// Latest notification id seen per namespace.
///
/// Namespaces are registered lazily and never removed. A namespace the
/// service has not reported yet carries [`UNOBSERVED_NOTIFICATION_ID`].
#[derive(Debug, Default)]
pub struct NotificationTracker {
    ids: RwLock<BTreeMap<String, i64>>,
}

impl NotificationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker pre-registered with `namespaces`
    pub fn with_namespaces<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids = namespaces
            .into_iter()
            .map(|ns| (ns.into(), UNOBSERVED_NOTIFICATION_ID))
            .collect();
        Self { ids: RwLock::new(ids) }
    }

    /// Stored id of `namespace`, registering it as unobserved if absent
    pub fn get(
        &self,
        namespace: &str,
    ) -> i64 {
        if let Some(id) = self.ids.read().get(namespace) {
            return *id;
        }
        *self
            .ids
            .write()
            .entry(namespace.to_string())
            .or_insert(UNOBSERVED_NOTIFICATION_ID)
    }

    pub fn set(
        &self,
        namespace: &str,
        id: i64,
    ) {
        self.ids.write().insert(namespace.to_string(), id);
    }

    /// Returns true when `namespace` was not tracked before
    pub fn register(
        &self,
        namespace: &str,
    ) -> bool {
        if self.contains(namespace) {
            return false;
        }
        let mut ids = self.ids.write();
        if ids.contains_key(namespace) {
            return false;
        }
        ids.insert(namespace.to_string(), UNOBSERVED_NOTIFICATION_ID);
        true
    }

    pub fn contains(
        &self,
        namespace: &str,
    ) -> bool {
        self.ids.read().contains_key(namespace)
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.ids.read().keys().cloned().collect()
    }

    /// Every tracked namespace as a long-poll request entry
    pub fn entries(&self) -> Vec<NotificationEntry> {
        self.ids
            .read()
            .iter()
            .map(|(ns, id)| NotificationEntry::new(ns.as_str(), *id))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }
}
