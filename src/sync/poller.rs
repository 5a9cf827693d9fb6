use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::metrics::FETCH_METRIC;
use crate::metrics::LONG_POLL_METRIC;
use crate::ConfigTransport;
use crate::DurableNamespaceStore;
use crate::NamespaceRelease;
use crate::NotificationTracker;
use crate::PollResponse;

/// Drives long polls and turns change notifications into store updates.
///
/// Network failures never surface as errors here: they are logged and
/// reported as "no progress" (`false`) or "no data" (`None`).
pub struct Poller {
    transport: Arc<dyn ConfigTransport>,
    tracker: Arc<NotificationTracker>,
    store: Arc<DurableNamespaceStore>,
    /// Last release key applied per namespace, consulted by `refresh_all`
    release_keys: DashMap<String, String>,
}

impl std::fmt::Debug for Poller {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("tracker", &self.tracker)
            .field("store", &self.store)
            .finish()
    }
}

impl Poller {
    pub fn new(
        transport: Arc<dyn ConfigTransport>,
        tracker: Arc<NotificationTracker>,
        store: Arc<DurableNamespaceStore>,
    ) -> Self {
        Self {
            transport,
            tracker,
            store,
            release_keys: DashMap::new(),
        }
    }

    /// One long-poll round trip over every tracked namespace.
    ///
    /// # Returns
    /// - `true` when the service answered "not modified" or at least one
    ///   changed namespace was fetched and stored
    /// - `false` when nothing is tracked, the request failed, the status was
    ///   unexpected, the change list was empty, or every changed namespace
    ///   failed to update
    pub async fn long_poll(&self) -> bool {
        if self.tracker.is_empty() {
            debug!("no namespace tracked, long poll skipped");
            return false;
        }

        let notifications = self.tracker.entries();
        match self.transport.poll_notifications(notifications).await {
            Ok(PollResponse::NotModified) => {
                debug!("long poll: no change");
                LONG_POLL_METRIC.with_label_values(&["not_modified"]).inc();
                true
            }
            Ok(PollResponse::Changed(changed)) => {
                if changed.is_empty() {
                    debug!("long poll: empty change list");
                }

                let mut progressed = false;
                for entry in changed {
                    info!(
                        "namespace {} changed, notification id {}",
                        entry.namespace_name, entry.notification_id
                    );
                    if self
                        .fetch_and_update(&entry.namespace_name, entry.notification_id, true)
                        .await
                    {
                        progressed = true;
                    }
                }

                let outcome = if progressed { "changed" } else { "no_progress" };
                LONG_POLL_METRIC.with_label_values(&[outcome]).inc();
                progressed
            }
            Ok(PollResponse::Unexpected(status)) => {
                warn!("long poll returned unexpected status {}", status);
                LONG_POLL_METRIC.with_label_values(&["failed"]).inc();
                false
            }
            Err(e) => {
                warn!("long poll failed: {}", e);
                LONG_POLL_METRIC.with_label_values(&["failed"]).inc();
                false
            }
        }
    }

    /// Fetches the full configuration of `namespace`; `None` on any failure
    pub async fn fetch_namespace(
        &self,
        namespace: &str,
    ) -> Option<NamespaceRelease> {
        match self.transport.fetch_configuration(namespace).await {
            Ok(Some(release)) => {
                FETCH_METRIC.with_label_values(&[namespace, "ok"]).inc();
                Some(release)
            }
            Ok(None) => {
                debug!("no data for namespace {}", namespace);
                FETCH_METRIC.with_label_values(&[namespace, "no_data"]).inc();
                None
            }
            Err(e) => {
                warn!("fetch of namespace {} failed: {}", namespace, e);
                FETCH_METRIC.with_label_values(&[namespace, "failed"]).inc();
                None
            }
        }
    }

    /// Records `notification_id`, then fetches `namespace` and stores it.
    ///
    /// Returns true when the snapshot was stored.
    pub async fn fetch_and_update(
        &self,
        namespace: &str,
        notification_id: i64,
        dispatch: bool,
    ) -> bool {
        self.tracker.set(namespace, notification_id);
        match self.fetch_namespace(namespace).await {
            Some(release) => self.apply(namespace, release, dispatch),
            None => false,
        }
    }

    /// Refetches every tracked namespace and applies those whose release key
    /// differs from the last one applied. Returns the number applied.
    pub async fn refresh_all(&self) -> usize {
        let mut applied = 0;
        for namespace in self.tracker.namespaces() {
            let Some(release) = self.fetch_namespace(&namespace).await else {
                continue;
            };

            let unchanged = match (&release.release_key, self.release_keys.get(&namespace)) {
                (Some(fetched), Some(known)) => *fetched == *known,
                _ => false,
            };
            if unchanged {
                debug!("namespace {} release unchanged", namespace);
                continue;
            }

            if self.apply(&namespace, release, true) {
                applied += 1;
            }
        }
        applied
    }

    fn apply(
        &self,
        namespace: &str,
        release: NamespaceRelease,
        dispatch: bool,
    ) -> bool {
        match self.store.update(namespace, release.configurations, dispatch) {
            Ok(()) => {
                match release.release_key {
                    Some(key) => {
                        self.release_keys.insert(namespace.to_string(), key);
                    }
                    None => {
                        self.release_keys.remove(namespace);
                    }
                }
                true
            }
            Err(e) => {
                error!("failed to store namespace {}: {}", namespace, e);
                false
            }
        }
    }
}
