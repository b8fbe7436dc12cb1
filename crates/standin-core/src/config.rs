//! Runtime configuration (standin.toml)
//!
//! ```toml
//! [dispatch]
//! seed = 0
//!
//! [authority]
//! grant_instantiate = true
//! grant_clone = false
//!
//! [migration]
//! release_local = true
//! ```
//!
//! Every section and key is optional.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::dispatch;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StandinConfig {
    /// Method-code derivation
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Capabilities granted by default
    #[serde(default)]
    pub authority: AuthorityConfig,

    /// Migration behaviour
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Method-code derivation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchConfig {
    /// Process-wide seed mixed into every per-type salt. Both ends of a
    /// forwarding link must agree on it.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_seed() -> u64 {
    dispatch::DEFAULT_CODE_SEED
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
        }
    }
}

impl DispatchConfig {
    /// Fix the process-wide seed; must run before the first table is built
    pub fn install(&self) -> standin_sdk::StandinResult<()> {
        dispatch::install_code_seed(self.seed)
    }
}

/// Default capability grants for minted authorisations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorityConfig {
    /// Grant "instantiate without constructing"
    #[serde(default = "default_true")]
    pub grant_instantiate: bool,

    /// Grant "clone regardless of visibility"
    #[serde(default)]
    pub grant_clone: bool,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            grant_instantiate: true,
            grant_clone: false,
        }
    }
}

/// Migration settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MigrationConfig {
    /// Drop an indirect standin's local referent once its data has moved
    #[serde(default = "default_true")]
    pub release_local: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            release_local: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl StandinConfig {
    /// Parse configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: StandinConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Reproducing a dropped referent needs instantiation
        if self.migration.release_local && !self.authority.grant_instantiate {
            return Err(ConfigError::ValidationError(
                "migration.release_local requires authority.grant_instantiate".to_string(),
            ));
        }
        Ok(())
    }

    /// Write configuration to a file
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
