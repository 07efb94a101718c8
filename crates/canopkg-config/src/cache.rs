//! Package cache location

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Cache settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Directory holding installed packages
    pub root: PathBuf,
}

impl CacheConfig {
    /// Cache rooted at an explicit directory
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache rooted at the platform user-data directory
    ///
    /// `<data_local_dir>/canopkg/packages`, or `~/.canopkg/packages` when the
    /// platform reports no data directory.
    pub fn default_location() -> ConfigResult<Self> {
        Ok(Self::at(default_cache_root()?))
    }

    /// Cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Resolve the default cache root
pub fn default_cache_root() -> ConfigResult<PathBuf> {
    if let Some(data) = dirs::data_local_dir() {
        return Ok(data.join("canopkg").join("packages"));
    }
    let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
    Ok(home.join(".canopkg").join("packages"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_root() {
        let config = CacheConfig::at("/tmp/canopkg-cache");
        assert_eq!(config.root(), Path::new("/tmp/canopkg-cache"));
    }

    #[test]
    fn test_default_root_ends_with_packages() {
        if let Ok(config) = CacheConfig::default_location() {
            assert!(config.root().ends_with("packages"));
        }
    }
}
