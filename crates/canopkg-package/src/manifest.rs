//! Package manifest parsing and types (package.json)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::dependency::PackageDependency;
use crate::reference::PackageReference;
use crate::validator::Validator;
use crate::{PackageError, Result};

/// Package manifest (package.json)
///
/// Fields this crate does not model are kept in `extra` so that reading and
/// writing a manifest does not lose them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageManifest {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// Canonical URL of the package itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
    /// Versions of the document standard this package targets
    #[serde(
        default,
        rename = "domainVersions",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub domain_versions: Vec<String>,
    /// Dependency name -> range expression
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl PackageManifest {
    /// Create a manifest with no dependencies
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
            author: None,
            license: None,
            canonical: None,
            domain_versions: Vec::new(),
            dependencies: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Parse manifest from a JSON string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Parse manifest from raw bytes (e.g. an archive entry)
    pub fn from_slice(content: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(content)?)
    }

    /// Load manifest from file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Serialize to JSON: two-space indentation, trailing newline, no nulls
    pub fn to_json(&self) -> Result<String> {
        let mut normalized = self.clone();
        normalized.extra.retain(|_, value| !value.is_null());
        let mut json = serde_json::to_string_pretty(&normalized)?;
        json.push('\n');
        Ok(json)
    }

    /// Write manifest to file
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// The reference this manifest declares for itself
    pub fn reference(&self) -> PackageReference {
        PackageDependency::new(&self.name, "").at_version(&self.version)
    }

    /// The first declared document-standard version
    pub fn domain_version(&self) -> Option<&str> {
        self.domain_versions.first().map(String::as_str)
    }

    /// Declared dependencies in name order
    pub fn dependency_list(&self) -> Vec<PackageDependency> {
        self.dependencies
            .iter()
            .map(|(name, range)| PackageDependency::new(name, range))
            .collect()
    }

    /// Add or replace a dependency after validating it
    pub fn add_dependency(&mut self, dependency: PackageDependency) -> Result<()> {
        Validator::validate_dependency(&dependency).map_err(|e| {
            PackageError::InvalidDependency {
                name: dependency.name.clone(),
                reason: e.to_string(),
            }
        })?;
        self.dependencies.insert(dependency.name, dependency.range);
        Ok(())
    }

    /// Remove a dependency, returning whether it was declared
    pub fn remove_dependency(&mut self, name: &str) -> bool {
        self.dependencies.remove(name).is_some()
    }

    pub fn has_dependency(&self, name: &str) -> bool {
        self.dependencies.contains_key(name)
    }
}
