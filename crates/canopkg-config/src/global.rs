//! Global Configuration (~/.canopkg/config.toml)
//!
//! Handles user-level configuration stored in `~/.canopkg/config.toml`.

use crate::cache::CacheConfig;
use crate::registry::RegistryConfig;
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global user configuration from ~/.canopkg/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Registry to resolve and fetch packages from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistryConfig>,

    /// Package cache settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,
}

impl GlobalConfig {
    /// Parse global configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str, origin: &Path) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: origin.to_path_buf(),
            error: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        Self::from_str(&content, path)
    }

    /// Validate the global configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(registry) = &self.registry {
            registry.validate()?;
        }
        if let Some(cache) = &self.cache {
            if cache.root.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "cache.root".to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Get the global config file path (~/.canopkg/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".canopkg").join("config.toml"))
    }

    /// Merge another global config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &GlobalConfig) {
        if other.registry.is_some() {
            self.registry = other.registry.clone();
        }
        if other.cache.is_some() {
            self.cache = other.cache.clone();
        }
    }
}
