//! The synchronization engine.
//!
//! [`NotificationTracker`] remembers the last notification id per namespace,
//! [`Poller`] runs long polls and turns reported changes into store updates,
//! [`ChangeDispatcher`] diffs snapshots for the registered listener, and
//! [`SyncEngine`] ties them together with startup fallback and a background
//! poll loop.
mod builder;
mod dispatcher;
mod engine;
mod notification;
mod poller;
pub use builder::*;
pub use dispatcher::*;
pub use engine::*;
pub use notification::*;
pub use poller::*;

#[cfg(test)]
mod dispatcher_test;
