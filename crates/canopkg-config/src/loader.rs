//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::cache::{default_cache_root, CacheConfig};
use crate::global::GlobalConfig;
use crate::registry::{ProviderKind, RegistryConfig};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Built-in defaults - lowest priority
/// 2. Global config (~/.canopkg/config.toml) - overrides defaults
/// 3. Environment variables (CANOPKG_*) - overrides global
/// 4. Explicit values - highest priority (handled by caller)
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Registry the client talks to
    pub registry: RegistryConfig,

    /// Where installed packages live
    pub cache: CacheConfig,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Create a loader that reads the global config from an explicit path
    pub fn with_global_config_path(path: impl Into<PathBuf>) -> Self {
        Self {
            global_config_path: Some(path.into()),
        }
    }

    /// Load configuration from defaults, the global config file and the environment
    pub fn load(&mut self) -> ConfigResult<Config> {
        let global = self.load_global_config()?;
        self.resolve(global)
    }

    /// Load configuration from a specific config file
    ///
    /// The file must exist; environment variables still apply on top of it.
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let global = GlobalConfig::load_from_file(config_path)?;
        self.resolve(global)
    }

    fn resolve(&self, global: GlobalConfig) -> ConfigResult<Config> {
        let registry = global.registry.unwrap_or_default();
        let cache = match global.cache {
            Some(cache) => cache,
            None => CacheConfig::at(default_cache_root()?),
        };

        let config = self.apply_env_overrides(Config { registry, cache })?;
        config.registry.validate()?;
        Ok(config)
    }

    /// Load global configuration from ~/.canopkg/config.toml
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        if self.global_config_path.is_none() {
            self.global_config_path = Some(GlobalConfig::global_config_path()?);
        }

        let Some(path) = self.global_config_path.as_ref() else {
            return Ok(GlobalConfig::default());
        };

        // Global config is optional - if it doesn't exist, return default
        if !path.exists() {
            return Ok(GlobalConfig::default());
        }

        GlobalConfig::load_from_file(path)
    }

    /// Apply environment variable overrides
    ///
    /// Environment variables follow the pattern: CANOPKG_<SECTION>_<KEY>
    /// Example: CANOPKG_REGISTRY_URL=https://registry.example.com
    fn apply_env_overrides(&self, mut config: Config) -> ConfigResult<Config> {
        if let Ok(url) = env::var("CANOPKG_REGISTRY_URL") {
            config.registry.url = url;
        }

        if let Ok(provider) = env::var("CANOPKG_REGISTRY_PROVIDER") {
            config.registry.provider = provider.parse::<ProviderKind>()?;
        }

        if let Ok(scope) = env::var("CANOPKG_REGISTRY_SCOPE") {
            config.registry.scope = Some(scope.trim_start_matches('@').to_string());
        }

        if let Ok(timeout) = env::var("CANOPKG_TIMEOUT") {
            config.registry.timeout_secs =
                timeout
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidValue {
                        field: "CANOPKG_TIMEOUT".to_string(),
                        reason: format!("expected a number of seconds, got '{}'", timeout),
                    })?;
        }

        if let Ok(token) = env::var("CANOPKG_AUTH_TOKEN") {
            config.registry.auth_token = Some(token);
        }

        if let Ok(dir) = env::var("CANOPKG_CACHE_DIR") {
            config.cache = CacheConfig::at(dir);
        }

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, content: &str) -> PathBuf {
        let config_path = dir.join("config.toml");
        fs::write(&config_path, content).unwrap();
        config_path
    }

    #[test]
    #[serial]
    fn test_missing_global_config_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();

        let mut loader = ConfigLoader::with_global_config_path(temp_dir.path().join("none.toml"));
        let config = loader.load().unwrap();

        assert_eq!(config.registry, RegistryConfig::default());
        assert!(config.cache.root.ends_with("packages"));
    }

    #[test]
    #[serial]
    fn test_load_from_specific_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_config_file(
            temp_dir.path(),
            r#"
[registry]
url = "https://registry.example.com"

[cache]
root = "/srv/packages"
"#,
        );

        let mut loader = ConfigLoader::new();
        let config = loader.load_from_file(&path).unwrap();

        assert_eq!(config.registry.url, "https://registry.example.com");
        assert_eq!(config.cache.root, PathBuf::from("/srv/packages"));
    }

    #[test]
    #[serial]
    fn test_env_override_registry_url() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_config_file(
            temp_dir.path(),
            r#"
[registry]
url = "https://registry.example.com"
"#,
        );

        env::set_var("CANOPKG_REGISTRY_URL", "https://override.example.com");

        let mut loader = ConfigLoader::with_global_config_path(path);
        let config = loader.load().unwrap();

        assert_eq!(config.registry.url, "https://override.example.com");

        env::remove_var("CANOPKG_REGISTRY_URL");
    }

    #[test]
    #[serial]
    fn test_env_invalid_timeout() {
        let temp_dir = TempDir::new().unwrap();

        env::set_var("CANOPKG_TIMEOUT", "soon");

        let mut loader = ConfigLoader::with_global_config_path(temp_dir.path().join("none.toml"));
        let result = loader.load();

        env::remove_var("CANOPKG_TIMEOUT");

        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
