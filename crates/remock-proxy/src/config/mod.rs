//! Configuration types for the remock learning-mode proxy.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Logical namespace recorded requests are grouped under.
    pub project: String,

    pub listen: ListenConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    /// Target host all traffic is forwarded to.
    pub target: TargetConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub connection_pool: ConnectionPoolConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    pub port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    /// Origin to proxy to, e.g. `http://localhost:8080`.
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Directory holding the embedded store file.
    #[serde(default = "default_store_path")]
    pub path: String,
}

/// Connection pool knobs for the shared upstream HTTP client.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionPoolConfig {
    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_keepalive_timeout_secs")]
    pub keepalive_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_admin_port() -> u16 {
    9090
}

fn default_store_path() -> String {
    "./data".to_string()
}

fn default_max_idle_per_host() -> usize {
    32
}

fn default_idle_timeout_secs() -> u64 {
    90
}

fn default_keepalive_timeout_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            port: default_admin_port(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: default_max_idle_per_host(),
            idle_timeout_secs: default_idle_timeout_secs(),
            keepalive_timeout_secs: default_keepalive_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.project.trim().is_empty() {
            anyhow::bail!("'project' must not be empty");
        }

        let uri: hyper::Uri = self
            .target
            .url
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid target url '{}': {e}", self.target.url))?;
        if uri.scheme().is_none() || uri.authority().is_none() {
            anyhow::bail!(
                "target url '{}' must carry a scheme and host, e.g. http://localhost:8080",
                self.target.url
            );
        }

        if self.listen.port != 0 && self.listen.port == self.admin.port {
            anyhow::bail!(
                "listen port and admin port must differ (both are {})",
                self.listen.port
            );
        }

        Ok(())
    }
}
