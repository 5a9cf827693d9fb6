use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_NAMESPACE;
use crate::Error;
use crate::Result;

/// Long-poll and background loop parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PollConfig {
    /// Namespaces tracked from startup. More are added lazily by lookups.
    #[serde(default = "default_namespaces")]
    pub namespaces: Vec<String>,

    /// Keep polling in the background after `start()`
    #[serde(default = "default_hot_update")]
    pub hot_update: bool,

    /// Upper bound for one long-poll request (the service holds it ~60s)
    #[serde(default = "default_long_poll_timeout")]
    pub long_poll_timeout_in_ms: u64,

    /// Pause between two background long polls
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_in_ms: u64,

    /// Timeout of a single namespace fetch
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_in_ms: u64,

    /// Periodic full refresh of every namespace, skipped when the release key
    /// is unchanged. 0 disables it.
    #[serde(default)]
    pub refresh_interval_in_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            namespaces: default_namespaces(),
            hot_update: default_hot_update(),
            long_poll_timeout_in_ms: default_long_poll_timeout(),
            cycle_interval_in_ms: default_cycle_interval(),
            fetch_timeout_in_ms: default_fetch_timeout(),
            refresh_interval_in_secs: 0,
        }
    }
}

impl PollConfig {
    pub fn validate(&self) -> Result<()> {
        if self.namespaces.iter().any(|ns| ns.trim().is_empty()) {
            return Err(Error::Config(ConfigError::Message(
                "poll.namespaces cannot contain empty names".into(),
            )));
        }

        if self.long_poll_timeout_in_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "poll.long_poll_timeout_in_ms must be > 0".into(),
            )));
        }

        if self.fetch_timeout_in_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "poll.fetch_timeout_in_ms must be > 0".into(),
            )));
        }

        if self.fetch_timeout_in_ms > self.long_poll_timeout_in_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "fetch_timeout {}ms should not exceed long_poll_timeout {}ms",
                self.fetch_timeout_in_ms, self.long_poll_timeout_in_ms
            ))));
        }

        Ok(())
    }

    pub fn long_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.long_poll_timeout_in_ms)
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_in_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_in_ms)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_in_secs > 0).then(|| Duration::from_secs(self.refresh_interval_in_secs))
    }
}

fn default_namespaces() -> Vec<String> {
    vec![DEFAULT_NAMESPACE.to_string()]
}
fn default_hot_update() -> bool {
    true
}
// in ms
fn default_long_poll_timeout() -> u64 {
    75_000
}
fn default_cycle_interval() -> u64 {
    2_000
}
fn default_fetch_timeout() -> u64 {
    5_000
}
