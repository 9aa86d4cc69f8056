//! TOML configuration file for the relay.
//!
//! The file is optional; every field has a default matching
//! [`RelayConfig::default`], so a file only needs the settings it changes:
//!
//! ```toml
//! [network]
//! bind_address = "0.0.0.0"
//! port = 3000
//! ping_interval_secs = 25
//! ping_timeout_secs = 60
//!
//! [transfers]
//! max_file_size = 20971520
//! completion_grace_secs = 5
//! idle_timeout_secs = 300     # 0 disables the idle reaper
//! reap_interval_secs = 10
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent from the TOML file.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::{RelayConfig, DEFAULT_MAX_FILE_SIZE};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `bind_address` is not an IPv4 or IPv6 address.
    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level relay configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RelayFileConfig {
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub transfers: TransferSection,
}

/// Listener and keep-alive settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSection {
    /// IP address to bind.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_ping_timeout_secs")]
    pub ping_timeout_secs: u64,
}

/// Transfer limits and session timers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferSection {
    /// Largest announced file size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_completion_grace_secs")]
    pub completion_grace_secs: u64,
    /// `0` disables the idle reaper.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_ping_interval_secs() -> u64 {
    25
}
fn default_ping_timeout_secs() -> u64 {
    60
}
fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}
fn default_completion_grace_secs() -> u64 {
    5
}
fn default_idle_timeout_secs() -> u64 {
    300
}
fn default_reap_interval_secs() -> u64 {
    10
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            ping_interval_secs: default_ping_interval_secs(),
            ping_timeout_secs: default_ping_timeout_secs(),
        }
    }
}

impl Default for TransferSection {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            completion_grace_secs: default_completion_grace_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            reap_interval_secs: default_reap_interval_secs(),
        }
    }
}

impl RelayFileConfig {
    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the TOML is malformed or a field has
    /// the wrong type.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Converts the file schema into the runtime [`RelayConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBindAddress`] if `bind_address` is not an
    /// IP address.
    pub fn into_relay_config(self) -> Result<RelayConfig, ConfigError> {
        let ip: IpAddr = self
            .network
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.network.bind_address.clone()))?;
        let bind_addr = SocketAddr::new(ip, self.network.port);

        Ok(RelayConfig {
            bind_addr,
            max_file_size: self.transfers.max_file_size,
            completion_grace: Duration::from_secs(self.transfers.completion_grace_secs),
            session_idle_timeout: Duration::from_secs(self.transfers.idle_timeout_secs),
            reap_interval: Duration::from_secs(self.transfers.reap_interval_secs),
            ping_interval: Duration::from_secs(self.network.ping_interval_secs),
            ping_timeout: Duration::from_secs(self.network.ping_timeout_secs),
            ..RelayConfig::default()
        })
    }
}

/// Loads the relay configuration file at `path`.
///
/// Unlike a per-user settings file, this path is always given explicitly
/// (`--config`), so a missing file is an error rather than a silent default.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<RelayFileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    RelayFileConfig::from_toml(&content)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
