// -
// Namespaces

/// Namespace used when the caller does not name one
pub const DEFAULT_NAMESPACE: &str = "application";

/// Notification id of a namespace the service has never reported
pub const UNOBSERVED_NOTIFICATION_ID: i64 = -1;

/// Cache files
pub(crate) const CACHE_FILE_INFIX: &str = "_configuration_";
pub(crate) const CACHE_FILE_EXTENSION: &str = "txt";
pub(crate) const SHARED_SEGMENT_SUFFIX: &str = "_shared.seg";

/// Signed request headers
pub(crate) const AUTHORIZATION_HEADER: &str = "authorization";
pub(crate) const TIMESTAMP_HEADER: &str = "timestamp";
pub(crate) const AUTHORIZATION_SCHEME: &str = "Apollo";
