//! Configuration management for AssetChain

use crate::error::ChainError;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "assetchain.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub consensus: ConsensusConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub federation: FederationConfig,
}

/// Which consensus rules a node validates transactions with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RulesKind {
    /// Plain transaction validation, no asset composition rules.
    Base,
    #[default]
    Composition,
    /// Composition rules followed by asset policies.
    Policy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsensusConfig {
    #[serde(default)]
    pub rules: RulesKind,
    #[serde(default = "default_parallel_block_validation")]
    pub parallel_block_validation: bool,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            rules: RulesKind::default(),
            parallel_block_validation: default_parallel_block_validation(),
        }
    }
}

/// Bounds applied to every asset policy.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_max_script_len")]
    pub max_script_len: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_max_ledger_lookups")]
    pub max_ledger_lookups: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_script_len: default_max_script_len(),
            max_depth: default_max_depth(),
            max_ledger_lookups: default_max_ledger_lookups(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FederationConfig {
    /// Public keys (hex) of the other federation nodes.
    #[serde(default)]
    pub keyring: Vec<String>,
}

fn default_parallel_block_validation() -> bool {
    true
}

fn default_max_script_len() -> usize {
    4096
}

fn default_max_depth() -> usize {
    64
}

fn default_max_ledger_lookups() -> usize {
    16
}

impl Config {
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.policy.max_script_len == 0 {
            return Err(ChainError::ConfigError(
                "policy.max_script_len must be greater than zero".to_string(),
            ));
        }
        if self.policy.max_depth == 0 {
            return Err(ChainError::ConfigError(
                "policy.max_depth must be greater than zero".to_string(),
            ));
        }
        for key in &self.federation.keyring {
            let valid = key.len() == 66 && key.chars().all(|c| c.is_ascii_hexdigit());
            if !valid {
                return Err(ChainError::ConfigError(format!(
                    "federation.keyring entry {} is not a compressed public key in hex",
                    key
                )));
            }
        }
        Ok(())
    }
}

/// Loads the configuration at `path`, falling back to defaults when the
/// file does not exist.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let config: Config = match fs::read_to_string(path.as_ref()) {
        Ok(contents) => toml::from_str(&contents)?,
        Err(e) if e.kind() == ErrorKind::NotFound => Config::default(),
        Err(e) => return Err(e.into()),
    };

    config.validate()?;
    Ok(config)
}
