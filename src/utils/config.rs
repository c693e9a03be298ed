//! Application configuration
//!
//! Model, loss and logging settings read from a TOML file.

use crate::error::Result;
use crate::losses::LossKind;
use crate::model::DualOutputConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Loss configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossConfig {
    pub kind: LossKind,
    /// Weight of the classification term against earliness, in [0, 1]
    pub alpha: f64,
    pub entropy_factor: f64,
}

impl Default for LossConfig {
    fn default() -> Self {
        Self {
            kind: LossKind::EarlyLinear,
            alpha: 0.5,
            entropy_factor: 0.0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub model: DualOutputConfig,
    pub loss: LossConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from file or use default
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create default configuration file
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<()> {
        Config::default().save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EncoderKind;
    use tempfile::tempdir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.model.hidden_dim, 3);
        assert_eq!(config.loss.kind, LossKind::EarlyLinear);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.model = config.model.with_seed(9).with_encoder(EncoderKind::Gru);
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: Config = toml::from_str("[loss]\nkind = \"cross_entropy\"\n").unwrap();
        assert_eq!(parsed.loss.kind, LossKind::CrossEntropy);
        assert_eq!(parsed.loss.alpha, 0.5);
        assert_eq!(parsed.model, DualOutputConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::create_default(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), Config::default());
        assert_eq!(Config::load_or_default(dir.path().join("absent.toml")), Config::default());
    }
}
