//! Server configuration
//!
//! Every field has a default, so a configuration file only needs the keys it
//! changes. Command line flags override file values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LqlError, Result};
use crate::eventconsole::EventConsoleConfig;
use crate::security::AuthorizationPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Unix socket the server listens on
    pub socket_path: PathBuf,
    /// JSON snapshot of the monitoring core
    pub snapshot: Option<PathBuf>,
    /// Seconds between checks of the snapshot's modification time
    pub reload_interval_secs: u64,
    /// Bytes of output after which a query fails
    pub max_response_size: u64,
    pub max_connections: usize,
    /// Seconds a connection may sit idle between requests
    pub idle_timeout_secs: u64,
    /// Named pipe external commands are written to, logged only when unset
    pub command_pipe: Option<PathBuf>,
    pub authorization: AuthorizationPolicy,
    pub event_console: EventConsoleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/tmp/lql.sock"),
            snapshot: None,
            reload_interval_secs: 2,
            max_response_size: 100 * 1024 * 1024,
            max_connections: 20,
            idle_timeout_secs: 300,
            command_pipe: None,
            authorization: AuthorizationPolicy::default(),
            event_console: EventConsoleConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| LqlError::Config(format!("TOML parse error: {}", e)))
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| LqlError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&text)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| LqlError::Config(format!("TOML serialize error: {}", e)))
    }
}
