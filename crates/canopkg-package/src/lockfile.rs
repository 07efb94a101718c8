//! Package closure and its persisted form (package-lock.json)

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::dependency::PackageDependency;
use crate::reference::PackageReference;
use crate::Result;

/// The resolved transitive dependency set of a project
///
/// `found` holds at most one reference per package name, in resolution order.
/// `missing` holds the dependencies that could not be resolved.
/// `conflicts` holds the dependencies whose range the version already in
/// `found` does not satisfy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageClosure {
    #[serde(default)]
    pub found: Vec<PackageReference>,
    #[serde(default)]
    pub missing: Vec<PackageDependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<PackageDependency>,
}

impl PackageClosure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resolved package; returns false if the name is already present
    pub fn add_found(&mut self, reference: PackageReference) -> bool {
        if self.find(&reference.full_name()).is_some() {
            return false;
        }
        self.found.push(reference);
        true
    }

    /// Record an unresolvable dependency; duplicates are ignored
    pub fn add_missing(&mut self, dependency: PackageDependency) -> bool {
        if self.missing.contains(&dependency) {
            return false;
        }
        self.missing.push(dependency);
        true
    }

    /// Record a dependency that conflicts with an earlier resolution
    pub fn add_conflict(&mut self, dependency: PackageDependency) -> bool {
        if self.conflicts.contains(&dependency) {
            return false;
        }
        self.conflicts.push(dependency);
        true
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Resolved reference for a package name (`@scope/name` for scoped packages)
    pub fn find(&self, full_name: &str) -> Option<&PackageReference> {
        self.found.iter().find(|r| r.full_name() == full_name)
    }

    pub fn contains(&self, reference: &PackageReference) -> bool {
        self.found.contains(reference)
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.found.is_empty() && self.missing.is_empty()
    }
}

/// Lock file structure (package-lock.json)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LockFile {
    /// Lock file format version
    pub lock_version: u32,
    /// When the lock file was generated (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    /// Resolved packages, in resolution order
    #[serde(default)]
    pub packages: Vec<PackageReference>,
    /// Dependencies that could not be resolved
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<PackageDependency>,
    /// Dependencies whose range the locked version does not satisfy
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<PackageDependency>,
}

impl LockFile {
    /// Current lock file format version
    pub const VERSION: u32 = 1;

    /// Create new empty lock file
    pub fn new() -> Self {
        Self {
            lock_version: Self::VERSION,
            updated: None,
            packages: Vec::new(),
            missing: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    /// Lock file for a closure, stamped with the current time
    pub fn from_closure(closure: &PackageClosure) -> Self {
        Self {
            lock_version: Self::VERSION,
            updated: Some(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
            packages: closure.found.clone(),
            missing: closure.missing.clone(),
            conflicts: closure.conflicts.clone(),
        }
    }

    /// The closure this lock file records
    pub fn closure(&self) -> PackageClosure {
        PackageClosure {
            found: self.packages.clone(),
            missing: self.missing.clone(),
            conflicts: self.conflicts.clone(),
        }
    }

    /// Parse lock file from a JSON string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load lock file from file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Serialize to JSON with a trailing newline
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Write lock file to file
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Get locked package by name
    pub fn get_package(&self, full_name: &str) -> Option<&PackageReference> {
        self.packages.iter().find(|p| p.full_name() == full_name)
    }

    /// Verify lock file integrity
    pub fn verify(&self) -> std::result::Result<(), String> {
        if self.lock_version > Self::VERSION {
            return Err(format!(
                "Lock file version {} is newer than supported version {}",
                self.lock_version,
                Self::VERSION
            ));
        }

        let mut seen = HashSet::new();
        for pkg in &self.packages {
            if !seen.insert(pkg.full_name()) {
                return Err(format!("Duplicate package in lock file: {}", pkg.full_name()));
            }
        }

        Ok(())
    }
}

impl Default for LockFile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_empty_lockfile() {
        let lockfile = LockFile::new();
        assert_eq!(lockfile.lock_version, LockFile::VERSION);
        assert!(lockfile.packages.is_empty());
    }

    #[test]
    fn test_closure_dedupes_by_name() {
        let mut closure = PackageClosure::new();
        assert!(closure.add_found(PackageReference::new("acme.core", "1.0.0")));
        assert!(!closure.add_found(PackageReference::new("acme.core", "2.0.0")));
        assert_eq!(closure.found.len(), 1);
        assert_eq!(closure.find("acme.core").unwrap().version, "1.0.0");
    }

    #[test]
    fn test_closure_dedupes_missing() {
        let mut closure = PackageClosure::new();
        assert!(closure.add_missing(PackageDependency::new("ghost", "1.0.0")));
        assert!(!closure.add_missing(PackageDependency::new("ghost", "1.0.0")));
        assert!(closure.add_missing(PackageDependency::new("ghost", "2.0.0")));
        assert!(!closure.is_complete());
    }

    #[test]
    fn test_serialize_lockfile() {
        let mut closure = PackageClosure::new();
        closure.add_found(PackageReference::new("foo", "1.2.3"));
        closure.add_missing(PackageDependency::new("bar", "^2.0.0"));

        let json = LockFile::from_closure(&closure).to_json().unwrap();
        assert!(json.contains("\"lockVersion\": 1"));
        assert!(json.contains("\"name\": \"foo\""));
        assert!(json.contains("\"range\": \"^2.0.0\""));
        assert!(json.ends_with('\n'));
    }

    #[test]
    fn test_conflicts_survive_lock_file() {
        let mut closure = PackageClosure::new();
        closure.add_found(PackageReference::new("a", "1.0.0"));
        assert!(closure.add_conflict(PackageDependency::new("a", "2.0.0")));
        assert!(!closure.add_conflict(PackageDependency::new("a", "2.0.0")));

        let json = LockFile::from_closure(&closure).to_json().unwrap();
        assert!(json.contains("\"conflicts\""));

        let restored = LockFile::from_str(&json).unwrap().closure();
        assert!(restored.has_conflicts());
        assert_eq!(restored, closure);
    }

    #[test]
    fn test_parse_lockfile() {
        let json = r#"{
            "lockVersion": 1,
            "packages": [{ "name": "foo", "version": "1.0.0" }],
            "missing": [{ "name": "bar", "range": "2.0.0" }]
        }"#;

        let lockfile = LockFile::from_str(json).unwrap();
        let closure = lockfile.closure();
        assert_eq!(closure.found, vec![PackageReference::new("foo", "1.0.0")]);
        assert_eq!(closure.missing, vec![PackageDependency::new("bar", "2.0.0")]);
    }

    #[test]
    fn test_verify_duplicate_packages() {
        let mut lockfile = LockFile::new();
        lockfile.packages.push(PackageReference::new("foo", "1.0.0"));
        lockfile.packages.push(PackageReference::new("foo", "2.0.0"));

        assert!(lockfile.verify().is_err());
    }

    #[test]
    fn test_verify_newer_format() {
        let lockfile = LockFile {
            lock_version: LockFile::VERSION + 1,
            ..LockFile::new()
        };
        assert!(lockfile.verify().is_err());
    }
}
