use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Configuration service endpoint and client identity
///
/// # Defaults
/// Field-level defaults use helper functions prefixed with `default_`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Base URL of the configuration service, without trailing slash
    ///
    /// Default: `http://localhost:8080`
    #[serde(default = "default_config_url")]
    pub config_url: String,

    /// Application id the namespaces belong to. Required.
    #[serde(default)]
    pub app_id: String,

    /// Cluster name
    ///
    /// Default: `default`
    #[serde(default = "default_cluster")]
    pub cluster: String,

    /// Shared secret for request signing. Empty disables signing.
    #[serde(default)]
    pub secret: String,

    /// Client ip reported to the service. Empty means detect at startup.
    #[serde(default)]
    pub ip: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_url: default_config_url(),
            app_id: String::new(),
            cluster: default_cluster(),
            secret: String::new(),
            ip: String::new(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "server.app_id cannot be empty".into(),
            )));
        }

        if !(self.config_url.starts_with("http://") || self.config_url.starts_with("https://")) {
            return Err(Error::Config(ConfigError::Message(format!(
                "server.config_url {} must start with http:// or https://",
                self.config_url
            ))));
        }

        if self.cluster.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "server.cluster cannot be empty".into(),
            )));
        }

        Ok(())
    }

    /// Service base URL with any trailing slash removed
    pub fn base_url(&self) -> &str {
        self.config_url.trim_end_matches('/')
    }

    pub fn signing_enabled(&self) -> bool {
        !self.secret.is_empty()
    }
}

fn default_config_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_cluster() -> String {
    "default".to_string()
}
