//! Registry endpoint configuration
//!
//! Well-known registries are plain values built by constructors here and
//! handed to the registry client; nothing is stored process-wide.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Public path-style registry used when nothing else is configured
pub const DEFAULT_REGISTRY_URL: &str = "https://packages.simplifier.net";

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How a registry shapes its URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// `<root>/<name>` listings and `<root>/<name>/<version>` archives
    #[default]
    Path,
    /// npm-style `<root>/@scope%2fname` listings and `/-/<name>-<version>.tgz` archives
    Scoped,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Path => write!(f, "path"),
            ProviderKind::Scoped => write!(f, "scoped"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "path" => Ok(ProviderKind::Path),
            "scoped" | "npm" => Ok(ProviderKind::Scoped),
            other => Err(ConfigError::InvalidValue {
                field: "registry.provider".to_string(),
                reason: format!("must be 'path' or 'scoped', got '{}'", other),
            }),
        }
    }
}

/// Registry connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    /// Registry root URL (no trailing slash required)
    pub url: String,

    /// URL provider flavor
    #[serde(default)]
    pub provider: ProviderKind,

    /// Default scope for scoped registries (without the leading '@')
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Bearer token sent with publish requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl RegistryConfig {
    /// A path-style registry rooted at `url`
    pub fn path_style(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            provider: ProviderKind::Path,
            scope: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            auth_token: None,
        }
    }

    /// An npm-style scoped registry rooted at `url`
    pub fn scoped(url: impl Into<String>, scope: Option<String>) -> Self {
        Self {
            url: url.into(),
            provider: ProviderKind::Scoped,
            scope: scope.map(|s| s.trim_start_matches('@').to_string()),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            auth_token: None,
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds;
        self
    }

    /// Set the publish token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Registry root with any trailing slash removed
    pub fn root(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Validate the registry settings
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "registry.url".to_string(),
                reason: format!("must be an http(s) URL, got '{}'", self.url),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "registry.timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::path_style(DEFAULT_REGISTRY_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_is_path_style() {
        let config = RegistryConfig::default();
        assert_eq!(config.url, DEFAULT_REGISTRY_URL);
        assert_eq!(config.provider, ProviderKind::Path);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_scoped_strips_at_sign() {
        let config = RegistryConfig::scoped("https://npm.example.com/", Some("@acme".to_string()));
        assert_eq!(config.scope.as_deref(), Some("acme"));
        assert_eq!(config.root(), "https://npm.example.com");
    }

    #[test]
    fn test_provider_kind_from_str() {
        assert_eq!("path".parse::<ProviderKind>().unwrap(), ProviderKind::Path);
        assert_eq!("NPM".parse::<ProviderKind>().unwrap(), ProviderKind::Scoped);
        assert!("git".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_validate_rejects_non_http_url() {
        let config = RegistryConfig::path_style("ftp://example.com");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = RegistryConfig::default().with_timeout(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_registry_toml() {
        let toml = r#"
url = "https://registry.example.com"
provider = "scoped"
scope = "acme"
"#;
        let config: RegistryConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.provider, ProviderKind::Scoped);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(config.validate().is_ok());
    }
}
