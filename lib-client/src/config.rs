//! Client Configuration
//!
//! Tunables shared by the transaction pipeline and the event scans.
//! Loaded from TOML, then overridden from the environment:
//!
//! - `HOTEL_CLIENT_GAS_MARGIN`: gas margin multiplier
//! - `HOTEL_CLIENT_FROM_BLOCK`: default first block for event scans

use std::path::Path;

use anyhow::Context;
use lib_types::BlockHeight;
use serde::{Deserialize, Serialize};

use crate::codec::MAX_TOKEN_DECIMALS;
use crate::error::{ClientError, Result};

pub const ENV_GAS_MARGIN: &str = "HOTEL_CLIENT_GAS_MARGIN";
pub const ENV_FROM_BLOCK: &str = "HOTEL_CLIENT_FROM_BLOCK";

/// Client-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Multiplier applied to every gas estimate (1.0 = exact estimate)
    pub gas_margin: f64,
    /// Decimal places of the booking token
    pub token_decimals: u32,
    /// First block considered when scanning event history
    pub default_from_block: BlockHeight,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            gas_margin: 1.0,
            token_decimals: 18,
            default_from_block: 0,
        }
    }
}

impl ClientConfig {
    /// Config used by tests: a visible margin so rounding is exercised
    pub fn for_testing() -> Self {
        Self {
            gas_margin: 1.5,
            ..Self::default()
        }
    }

    /// Parse a TOML document; missing keys fall back to defaults
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content).context("invalid client config")?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file, apply environment overrides, validate
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `HOTEL_CLIENT_*` variables on top of the current values
    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(raw) = std::env::var(ENV_GAS_MARGIN) {
            self.gas_margin = raw
                .parse()
                .with_context(|| format!("{} is not a number: {:?}", ENV_GAS_MARGIN, raw))?;
        }
        if let Ok(raw) = std::env::var(ENV_FROM_BLOCK) {
            self.default_from_block = raw
                .parse()
                .with_context(|| format!("{} is not a block number: {:?}", ENV_FROM_BLOCK, raw))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.gas_margin.is_finite() || self.gas_margin < 1.0 {
            return Err(ClientError::validation(format!(
                "gas_margin must be a finite number >= 1.0, got {}",
                self.gas_margin
            )));
        }
        if self.token_decimals > MAX_TOKEN_DECIMALS {
            return Err(ClientError::validation(format!(
                "token_decimals must be <= {}, got {}",
                MAX_TOKEN_DECIMALS, self.token_decimals
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = ClientConfig::default();
        assert_eq!(config.gas_margin, 1.0);
        assert_eq!(config.token_decimals, 18);
        assert!(config.validate().is_ok());
        assert!(ClientConfig::for_testing().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = ClientConfig::from_toml_str("gas_margin = 2.0\n").unwrap();
        assert_eq!(config.gas_margin, 2.0);
        assert_eq!(config.token_decimals, 18);
        assert_eq!(config.default_from_block, 0);
    }

    #[test]
    fn test_rejects_margin_below_one() {
        assert!(ClientConfig::from_toml_str("gas_margin = 0.5\n").is_err());
        let config = ClientConfig {
            gas_margin: f64::INFINITY,
            ..ClientConfig::default()
        };
        assert!(matches!(config.validate(), Err(ClientError::Validation(_))));
    }

    #[test]
    fn test_rejects_too_many_decimals() {
        assert!(ClientConfig::from_toml_str("token_decimals = 39\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(&path, "token_decimals = 6\ndefault_from_block = 100\n").unwrap();
        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.token_decimals, 6);
        assert!(ClientConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
