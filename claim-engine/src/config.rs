//! Configuration for the claim engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`ClaimOrchestrator`](crate::ClaimOrchestrator).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimConfig {
    /// Engine instance ID, used in logs
    pub engine_id: String,
    /// Location sampling
    pub location: LocationConfig,
    /// Transaction confirmation
    pub confirmation: ConfirmationConfig,
    /// Ledger reconciliation retries
    pub reconciliation: ReconciliationConfig,
    /// Reward drawing
    pub reward: RewardConfig,
    /// Attempt history
    pub history: HistoryConfig,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            engine_id: uuid::Uuid::new_v4().to_string(),
            location: LocationConfig::default(),
            confirmation: ConfirmationConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            reward: RewardConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl ClaimConfig {
    /// Create a new config with engine ID.
    pub fn new(engine_id: impl Into<String>) -> Self {
        Self {
            engine_id: engine_id.into(),
            ..Default::default()
        }
    }

    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Location sampling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Samples older than this (seconds) count as unavailable
    pub max_sample_age_secs: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            max_sample_age_secs: 30,
        }
    }
}

impl LocationConfig {
    pub fn max_sample_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_sample_age_secs.min(i64::MAX as u64) as i64)
    }
}

/// Transaction confirmation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// How long a claim waits for a receipt before going pending (ms)
    pub timeout_ms: u64,
    /// Interval between background rechecks of pending claims (ms)
    pub recheck_interval_ms: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            recheck_interval_ms: 15_000,
        }
    }
}

impl ConfirmationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn recheck_interval(&self) -> Duration {
        Duration::from_millis(self.recheck_interval_ms.max(1))
    }
}

/// Ledger reconciliation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Delay before the first retry (ms)
    pub initial_backoff_ms: u64,
    /// Upper bound on the retry delay (ms)
    pub max_backoff_ms: u64,
    /// Growth factor between retries
    pub multiplier: u32,
    /// Attempts made before handing off to a background task
    pub inline_attempts: u32,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 250,
            max_backoff_ms: 30_000,
            multiplier: 2,
            inline_attempts: 3,
        }
    }
}

/// Reward drawing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Full turns a prize wheel makes before its random offset
    pub wheel_minimum_full_turns: u32,
    /// Fixed RNG seed (reproducible draws); entropy when absent
    pub rng_seed: Option<u64>,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            wheel_minimum_full_turns: quest_core::reward::DEFAULT_MINIMUM_FULL_TURNS,
            rng_seed: None,
        }
    }
}

/// Attempt history configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Finished attempts kept in memory
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: 1_000 }
    }
}
