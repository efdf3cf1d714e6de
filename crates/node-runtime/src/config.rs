//! # Node Configuration
//!
//! Loaded from a TOML file named by `BRIDGE_CONFIG`, falling back to
//! defaults. `BRIDGE_VALIDATORS` overrides the validator count.
//!
//! ```toml
//! [node]
//! validators = 4
//! quorum = 3
//! observation_interval_ms = 1000
//! block_time_ms = 500
//! chains = ["BTC", "ETH"]
//!
//! [attestation_gossip]
//! observe_reconcile_interval = 15000
//! max_batch_size = 100
//! ```

use attestation_gossip::GossipConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub const CONFIG_PATH_ENV: &str = "BRIDGE_CONFIG";
pub const VALIDATORS_ENV: &str = "BRIDGE_VALIDATORS";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Devnet shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Validators simulated in-process.
    pub validators: usize,
    /// Attestations the simulated ledger needs to commit a fact.
    pub quorum: usize,
    /// How often each validator reports fresh observations.
    pub observation_interval_ms: u64,
    /// How often the simulated ledger closes a block and commits.
    pub block_time_ms: u64,
    /// Chains each validator reports network fees for.
    pub chains: Vec<String>,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            validators: 4,
            quorum: 3,
            observation_interval_ms: 1_000,
            block_time_ms: 500,
            chains: vec!["BTC".to_string(), "ETH".to_string()],
        }
    }
}

impl NodeSection {
    #[must_use]
    pub fn observation_interval(&self) -> Duration {
        Duration::from_millis(self.observation_interval_ms.max(1))
    }

    #[must_use]
    pub fn block_time(&self) -> Duration {
        Duration::from_millis(self.block_time_ms.max(1))
    }
}

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node: NodeSection,
    pub attestation_gossip: GossipConfig,
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.attestation_gossip.normalize();
        config.validate()?;
        Ok(config)
    }

    /// File from `BRIDGE_CONFIG` if set, else defaults, then env overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                info!(path = %path, "Loading configuration");
                Self::load(path)?
            }
            Err(_) => Self::default(),
        };

        if let Ok(count) = std::env::var(VALIDATORS_ENV) {
            match count.parse() {
                Ok(n) => config.node.validators = n,
                Err(_) => warn!(value = %count, "{VALIDATORS_ENV} is not a number, ignored"),
            }
        }

        config.attestation_gossip.normalize();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.node.validators == 0 {
            return Err(ConfigError::Invalid("at least one validator required".into()));
        }
        if self.node.quorum == 0 || self.node.quorum > self.node.validators {
            return Err(ConfigError::Invalid(format!(
                "quorum {} must be between 1 and {} validators",
                self.node.quorum, self.node.validators
            )));
        }
        if self.node.chains.is_empty() {
            return Err(ConfigError::Invalid("no chains configured".into()));
        }
        Ok(())
    }
}
