//! canopkg package management
//!
//! Version resolution, package archives, the installed-package cache, the
//! registry client, dependency restore and the canonical file index.

pub mod archive;
pub mod cache;
pub mod canonical_index;
pub mod context;
pub mod dependency;
pub mod file_index;
pub mod lockfile;
pub mod manifest;
pub mod project;
pub mod reference;
pub mod registry;
pub mod restore;
pub mod validator;
pub mod version;

pub use archive::{ContentHash, FileEntry};
pub use cache::{DiskCache, MemoryCache, PackageCache};
pub use canonical_index::{CanonicalIndex, MetadataExtractor, ResourceMetadata};
pub use context::PackageContext;
pub use dependency::PackageDependency;
pub use file_index::{FileIndex, PackageFileReference};
pub use lockfile::{LockFile, PackageClosure};
pub use manifest::PackageManifest;
pub use project::{DirectoryProject, MemoryProject, ProjectStore};
pub use reference::{PackageMatch, PackageOrigin, PackageReference};
pub use registry::{
    CatalogEntry, CatalogQuery, HttpRegistryClient, PackageListing, PackageRegistry,
    PathStyleProvider, PublishMode, PublishResult, ScopedPackageProvider, UrlProvider,
};
pub use restore::Restorer;
pub use validator::{ValidationError, Validator};
pub use version::{VersionRange, Versions};

/// Package management errors
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Semver error: {0}")]
    SemverError(#[from] semver::Error),

    #[error("Invalid package name: {0}")]
    InvalidPackageName(String),

    #[error("Invalid manifest: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    InvalidManifest(Vec<ValidationError>),

    #[error("Manifest already exists for package '{0}'")]
    ManifestExists(String),

    #[error("No manifest found")]
    ManifestNotFound,

    #[error("Invalid lock file: {0}")]
    InvalidLockFile(String),

    #[error("Invalid dependency '{name}': {reason}")]
    InvalidDependency { name: String, reason: String },

    #[error("Invalid package reference: {0}")]
    InvalidReference(String),

    #[error("Invalid archive: {0}")]
    Archive(String),

    #[error("Cache error at {path}: {detail}")]
    Cache { path: String, detail: String },

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Conflicting resources for canonical '{canonical}': {}", .candidates.join(", "))]
    ConflictingCandidates {
        canonical: String,
        candidates: Vec<String>,
    },

    #[error("File index not built; call build_index first")]
    IndexNotBuilt,

    #[error("Configuration error: {0}")]
    Config(#[from] canopkg_config::ConfigError),
}

pub type Result<T> = std::result::Result<T, PackageError>;
