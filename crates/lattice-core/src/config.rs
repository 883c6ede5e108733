//! lattice.toml configuration parser.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatticeConfig {
    pub preview: PreviewConfig,
    pub replication: ReplicationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// How long the pointer must rest on an element before a dry run starts.
    pub debounce_ms: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self { debounce_ms: 500 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    pub base_port: u16,
    pub max_port: u16,
    pub base_minor: u32,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            base_port: 7788,
            max_port: 7999,
            base_minor: 0,
        }
    }
}

impl LatticeConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: LatticeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no allocator could work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.replication.base_port > self.replication.max_port {
            anyhow::bail!(
                "replication.base_port ({}) exceeds replication.max_port ({})",
                self.replication.base_port,
                self.replication.max_port
            );
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.preview.debounce_ms)
    }
}
