//! Node configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use claim_engine::ClaimConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    /// Engine settings; defaults when the section is absent
    #[serde(default)]
    pub claim: ClaimConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// SQLite database file
    #[serde(default = "default_database")]
    pub database: PathBuf,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
        }
    }
}

fn default_database() -> PathBuf {
    PathBuf::from("quest-claims.db")
}

impl Config {
    /// Load from `path`, or defaults if the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}
