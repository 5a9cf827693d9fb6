//! Namespace snapshots with write-through to local cache files.
mod durable;
pub use durable::*;
