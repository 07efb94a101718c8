//! Package registry access
//!
//! A [`PackageRegistry`] lists versions, serves archives, answers catalog
//! queries and accepts published archives. Failures never surface as errors:
//! an unknown package and an unreachable registry both yield an empty result,
//! and restore records the dependency as missing.

mod client;
mod provider;

pub use client::HttpRegistryClient;
pub use provider::{provider_for, PathStyleProvider, ScopedPackageProvider, UrlProvider};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::reference::PackageReference;
use crate::version::Versions;

/// Remote source of packages
pub trait PackageRegistry: Send + Sync {
    /// Listed versions of a package; empty if unknown or unreachable
    fn get_versions(&self, full_name: &str) -> Versions;

    /// Raw archive bytes of one package version
    fn get_package(&self, reference: &PackageReference) -> Option<Vec<u8>>;

    /// Search the registry; `None` if the query could not be answered
    fn catalog(&self, query: &CatalogQuery) -> Option<Vec<CatalogEntry>>;

    /// Publish an archive for a domain version
    fn publish(
        &self,
        reference: &PackageReference,
        domain_version: &str,
        archive: &[u8],
        mode: PublishMode,
    ) -> PublishResult;
}

/// Catalog search filters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogQuery {
    pub name: Option<String>,
    pub canonical: Option<String>,
    pub domain_version: Option<String>,
    pub include_prerelease: bool,
}

impl CatalogQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn canonical(mut self, canonical: impl Into<String>) -> Self {
        self.canonical = Some(canonical.into());
        self
    }

    pub fn domain_version(mut self, domain_version: impl Into<String>) -> Self {
        self.domain_version = Some(domain_version.into());
        self
    }

    pub fn include_prerelease(mut self, include: bool) -> Self {
        self.include_prerelease = include;
        self
    }

    /// Query parameters in a stable order
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(name) = &self.name {
            params.push(("name", name.clone()));
        }
        if let Some(canonical) = &self.canonical {
            params.push(("canonical", canonical.clone()));
        }
        if let Some(domain_version) = &self.domain_version {
            params.push(("domainVersion", domain_version.clone()));
        }
        if self.include_prerelease {
            params.push(("prerelease", "true".to_string()));
        }
        params
    }
}

/// One catalog search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "Version", skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, alias = "DomainVersion", skip_serializing_if = "Option::is_none")]
    pub domain_version: Option<String>,
}

/// Parse a catalog response body
pub fn parse_catalog(body: &[u8]) -> Option<Vec<CatalogEntry>> {
    serde_json::from_slice(body).ok()
}

/// How a publish treats an existing package
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PublishMode {
    /// Only a package name the registry has never seen
    New,
    /// Only a new version of a known package
    Existing,
    /// Either
    #[default]
    Any,
}

impl PublishMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishMode::New => "new",
            PublishMode::Existing => "existing",
            PublishMode::Any => "any",
        }
    }
}

impl fmt::Display for PublishMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a publish request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    pub success: bool,
    /// HTTP status, if the registry answered
    pub status: Option<u16>,
    pub message: String,
}

impl PublishResult {
    pub fn accepted(status: u16, message: impl Into<String>) -> Self {
        Self {
            success: true,
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn rejected(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            status,
            message: message.into(),
        }
    }
}

/// Version listing returned by the registry for one package
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageListing {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub versions: BTreeMap<String, ListedVersion>,
    #[serde(default, rename = "dist-tags")]
    pub dist_tags: BTreeMap<String, String>,
}

/// One release in a [`PackageListing`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListedVersion {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// `true` or `"true"` hides the release from resolution
    #[serde(default)]
    pub unlisted: Option<serde_json::Value>,
}

impl ListedVersion {
    pub fn is_unlisted(&self) -> bool {
        match &self.unlisted {
            Some(serde_json::Value::Bool(flag)) => *flag,
            Some(serde_json::Value::String(flag)) => flag.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}

impl PackageListing {
    pub fn from_slice(body: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Resolvable versions: listed releases only, malformed versions dropped
    pub fn versions(&self) -> Versions {
        Versions::parse(
            self.versions
                .iter()
                .filter(|(_, release)| !release.is_unlisted())
                .map(|(key, release)| release.version.as_deref().unwrap_or(key)),
        )
    }

    /// Version carried by the `latest` dist-tag
    pub fn latest_tag(&self) -> Option<&str> {
        self.dist_tags.get("latest").map(String::as_str)
    }
}
