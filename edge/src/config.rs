//! Top-level configuration, nesting each subsystem's config.
//!
//! Loads one TOML document into a composite struct and wires each
//! subsystem's config from it.

use std::path::{Path, PathBuf};

use edge_control::ControlAuthConfig;
use edge_coordinator::CoordinatorConfig;
use edge_metrics::MetricsConfig;
use edge_offline::OfflineServiceConfig;
use edge_queue::QueueConfig;
use serde::Deserialize;

/// Composite configuration for the whole service, deserialized from a
/// single TOML document.
#[derive(Debug, Clone, Deserialize)]
pub struct EdgeConfig {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub offline: OfflineConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub control: ControlConfig,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            coordinator: CoordinatorConfig::default(),
            offline: OfflineConfig::default(),
            batch: BatchConfig::default(),
            metrics: MetricsConfig::default(),
            control: ControlConfig::default(),
        }
    }
}

/// `OfflineServiceConfig` plus the SQLite path the binary needs to open a
/// pool before handing it to `edge_offline::OfflineBufferService::new`.
#[derive(Debug, Clone, Deserialize)]
pub struct OfflineConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(flatten)]
    pub service: OfflineServiceConfig,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            service: OfflineServiceConfig::default(),
        }
    }
}

fn default_database_path() -> String {
    "edge-offline.sqlite3".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_max_parallel")]
    pub max_parallel: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
        }
    }
}

const fn default_max_parallel() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: String,
    #[serde(default)]
    pub auth: ControlAuthConfig,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            auth: ControlAuthConfig::default(),
        }
    }
}

fn default_socket_path() -> String {
    edge_control::DEFAULT_CONTROL_SOCKET.to_string()
}

/// Errors loading or parsing the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to read config from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl EdgeConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not parse as
    /// valid TOML matching this shape.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }
}
