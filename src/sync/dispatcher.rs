//! Snapshot diffing and change notification.

use std::fmt;
use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::metrics::CHANGE_EVENT_METRIC;
use crate::NamespaceSnapshot;

/// Error type listeners may return; it is logged, never propagated
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Add,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Add => "add",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One key-level difference between two snapshots of a namespace.
///
/// `value` is the new value for add/update and the removed value for delete.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub namespace: String,
    pub key: String,
    pub value: Value,
}

impl ChangeEvent {
    pub fn new(
        kind: ChangeKind,
        namespace: &str,
        key: &str,
        value: Value,
    ) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            key: key.to_string(),
            value,
        }
    }
}

/// Receives change events synchronously, once per event.
pub trait ChangeListener: Send + Sync {
    fn on_change(
        &self,
        event: &ChangeEvent,
    ) -> Result<(), ListenerError>;
}

impl<F> ChangeListener for F
where
    F: Fn(&ChangeEvent) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_change(
        &self,
        event: &ChangeEvent,
    ) -> Result<(), ListenerError> {
        self(event)
    }
}

/// Logs every event at `info`
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl ChangeListener for LoggingListener {
    fn on_change(
        &self,
        event: &ChangeEvent,
    ) -> Result<(), ListenerError> {
        info!(
            "[{}] {} {} = {}",
            event.namespace, event.kind, event.key, event.value
        );
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct ChangeDispatcher {
    listener: Option<Arc<dyn ChangeListener>>,
}

impl fmt::Debug for ChangeDispatcher {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ChangeDispatcher")
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

impl ChangeDispatcher {
    pub fn new(listener: Option<Arc<dyn ChangeListener>>) -> Self {
        Self { listener }
    }

    pub fn has_listener(&self) -> bool {
        self.listener.is_some()
    }

    /// Key-level differences from `old` to `new`. A missing side counts as
    /// an empty snapshot.
    ///
    /// Deletes and updates come in `old`'s key order, followed by adds in
    /// `new`'s key order. Keys whose values compare equal produce nothing.
    pub fn diff(
        namespace: &str,
        old: Option<&NamespaceSnapshot>,
        new: Option<&NamespaceSnapshot>,
    ) -> Vec<ChangeEvent> {
        let empty = NamespaceSnapshot::new();
        let old = old.unwrap_or(&empty);
        let new = new.unwrap_or(&empty);

        let mut events = Vec::new();
        for (key, old_value) in old {
            let change = match new.get(key) {
                None => Some((ChangeKind::Delete, old_value)),
                Some(new_value) if new_value != old_value => Some((ChangeKind::Update, new_value)),
                Some(_) => None,
            };
            if let Some((kind, value)) = change {
                events.push(ChangeEvent::new(kind, namespace, key, value.clone()));
            }
        }
        for (key, new_value) in new {
            if !old.contains_key(key) {
                events.push(ChangeEvent::new(
                    ChangeKind::Add,
                    namespace,
                    key,
                    new_value.clone(),
                ));
            }
        }
        events
    }

    /// Computes the diff and hands every event to the listener.
    ///
    /// A failing or panicking listener call is logged and the remaining
    /// events are still delivered. Returns the number of events produced.
    pub fn dispatch(
        &self,
        namespace: &str,
        old: Option<&NamespaceSnapshot>,
        new: Option<&NamespaceSnapshot>,
    ) -> usize {
        let Some(listener) = &self.listener else {
            return 0;
        };

        let events = Self::diff(namespace, old, new);
        debug!("namespace {} produced {} change events", namespace, events.len());

        for event in &events {
            CHANGE_EVENT_METRIC.with_label_values(&[event.kind.as_str()]).inc();
            match catch_unwind(AssertUnwindSafe(|| listener.on_change(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(
                    "change listener failed on {} {}/{}: {}",
                    event.kind, event.namespace, event.key, e
                ),
                Err(panic) => warn!(
                    "change listener failed on {} {}/{}: panicked: {}",
                    event.kind,
                    event.namespace,
                    event.key,
                    panic_message(panic.as_ref())
                ),
            }
        }
        events.len()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
