//! canopkg Configuration System
//!
//! Provides configuration for the package manager:
//! - Registry endpoints and URL provider flavor
//! - Package cache location
//! - Global user configuration (~/.canopkg/config.toml)
//! - Configuration precedence and merging
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Built-in defaults (public path-style registry, platform data directory cache)
//! 2. Global config (~/.canopkg/config.toml)
//! 3. Environment variables (CANOPKG_*)
//! 4. Explicit values set by the caller
//!
//! # Example
//!
//! ```no_run
//! use canopkg_config::ConfigLoader;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load().unwrap();
//! println!("registry: {}", config.registry.url);
//! ```

pub mod cache;
pub mod global;
pub mod loader;
pub mod registry;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use cache::CacheConfig;
pub use global::GlobalConfig;
pub use loader::{Config, ConfigLoader};
pub use registry::{ProviderKind, RegistryConfig, DEFAULT_REGISTRY_URL};
