//! gridhub.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::{NodeConfig, NodeRegistration};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Monitoring parameters applied to nodes registered without their
    /// own overrides.
    #[serde(default)]
    pub node_defaults: NodeConfig,
    #[serde(default)]
    pub drain: DrainConfig,
    #[serde(default)]
    pub restart_policy: RestartPolicyConfig,
    /// Nodes registered at daemon startup. Nodes can also register at
    /// runtime through the admin API.
    #[serde(default)]
    pub nodes: Vec<NodeRegistration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    4444
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

/// Budget for the wait-for-session-drain loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrainConfig {
    #[serde(default = "default_drain_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_drain_max_attempts")]
    pub max_attempts: u32,
}

fn default_drain_poll_interval_ms() -> u64 {
    1_000
}

fn default_drain_max_attempts() -> u32 {
    60
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_drain_poll_interval_ms(),
            max_attempts: default_drain_max_attempts(),
        }
    }
}

/// Device classes whose session completion triggers a drain-restart
/// cycle on the hosting node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestartPolicyConfig {
    #[serde(default)]
    pub device_classes: Vec<String>,
}

impl GridConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.display().to_string(), e.to_string()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            node_defaults: NodeConfig::default(),
            drain: DrainConfig::default(),
            restart_policy: RestartPolicyConfig::default(),
            nodes: Vec::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {0}: {1}")]
    Read(String, String),

    #[error("failed to parse config: {0}")]
    Parse(String),
}
