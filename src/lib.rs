//! Client-side configuration synchronization.
//!
//! Keeps a local view of remote key/value namespaces in sync with an
//! Apollo-compatible configuration service through long-poll change
//! notifications, persists every namespace to a local cache file, and falls
//! back to those files when the service cannot be reached.
//!
//! Snapshots live either in process memory or in a fixed-capacity segment
//! shared by several processes on the same host, see [`SharedCache`].
mod cache;
mod config;
mod constants;
mod errors;
pub mod metrics;
mod network;
mod store;
mod sync;
pub mod utils;

pub use cache::*;
pub use config::*;
pub use constants::DEFAULT_NAMESPACE;
pub use constants::UNOBSERVED_NOTIFICATION_ID;
pub use errors::*;
pub use network::*;
pub use store::*;
pub use sync::*;
pub use utils::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
