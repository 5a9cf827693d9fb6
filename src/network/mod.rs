//! Transport layer to the configuration service.
//!
//! The sync engine only talks to [`ConfigTransport`]; [`HttpTransport`] is the
//! production implementation over the service's two HTTP endpoints, and
//! tests substitute the generated `MockConfigTransport`.
mod http_transport;
mod signer;
pub use http_transport::*;
pub use signer::*;


#[cfg(test)]
use mockall::automock;
use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::NamespaceSnapshot;
use crate::Result;

/// One namespace and the latest notification id known for it.
///
/// Sent as the long-poll request payload and returned for every changed
/// namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEntry {
    pub namespace_name: String,
    pub notification_id: i64,
}

impl NotificationEntry {
    pub fn new(
        namespace_name: impl Into<String>,
        notification_id: i64,
    ) -> Self {
        Self {
            namespace_name: namespace_name.into(),
            notification_id,
        }
    }
}

/// Body of a successful configuration fetch
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceRelease {
    #[serde(default)]
    pub configurations: NamespaceSnapshot,
    #[serde(default)]
    pub release_key: Option<String>,
}

/// Outcome of one long-poll round trip that reached the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResponse {
    /// 304: nothing changed within the poll window
    NotModified,
    /// 200: namespaces that changed, with their new notification ids
    Changed(Vec<NotificationEntry>),
    /// Any other status
    Unexpected(u16),
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConfigTransport: Send + Sync + 'static {
    /// Fetches the full configuration of `namespace`.
    ///
    /// # Returns
    /// - `Ok(Some(release))` on HTTP 200
    /// - `Ok(None)` on any other status
    ///
    /// # Errors
    /// Transport failures (connect, timeout, undecodable body)
    async fn fetch_configuration(
        &self,
        namespace: &str,
    ) -> Result<Option<NamespaceRelease>>;

    /// Issues one long poll listing every entry of `notifications`.
    ///
    /// Blocks until the service answers or the long-poll timeout elapses.
    async fn poll_notifications(
        &self,
        notifications: Vec<NotificationEntry>,
    ) -> Result<PollResponse>;
}
