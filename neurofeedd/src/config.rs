//! Daemon configuration: `<config dir>/neurofeed/config.json`, then
//! environment, then command-line overrides.

use std::path::{Path, PathBuf};

use neurofeed::{SimulationConfig, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:5000";
pub const LISTEN_ENV: &str = "NEUROFEED_LISTEN";

/// How feeds map onto connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelMode {
    /// Every connection owns its own session and timer.
    #[default]
    PerConnection,
    /// One session shared by every connection; it outlives clients.
    Broadcast,
}

impl ChannelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelMode::PerConnection => "per-connection",
            ChannelMode::Broadcast => "broadcast",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid simulation config: {0}")]
    Invalid(#[from] ValidationError),
    #[error("maxClients must be at least 1")]
    ZeroClients,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DaemonConfig {
    pub listen: String,
    pub channel_mode: ChannelMode,
    /// Refuse connections beyond this many live clients.
    pub max_clients: Option<usize>,
    /// Initial parameters of every new session.
    pub simulation: SimulationConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            channel_mode: ChannelMode::default(),
            max_clients: None,
            simulation: SimulationConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Reads `path`; a missing file is an error only when `required`.
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        if !required && !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_clients == Some(0) {
            return Err(ConfigError::ZeroClients);
        }
        self.simulation.validate()?;
        Ok(())
    }

    pub fn apply_listen_override(&mut self, listen: Option<String>) {
        if let Some(addr) = listen.filter(|a| !a.trim().is_empty()) {
            self.listen = addr;
        }
    }
}
