//! Ledger configuration
//!
//! Loaded from JSON; every field is optional and falls back to `Default`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use types::numeric::Amount;

use crate::errors::ConfigError;

/// Configuration for a [`crate::Ledger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Name attached to every log line emitted by the ledger.
    pub label: String,
    /// Upper bound on any single account balance. Deposits past it fail.
    pub balance_cap: Amount,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            label: "custody".to_string(),
            balance_cap: Amount::MAX,
        }
    }
}

impl LedgerConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.balance_cap == 0 {
            return Err(ConfigError::InvalidBalanceCap);
        }
        Ok(())
    }
}
