//! Declared (unresolved) dependencies

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::reference::{split_scope, PackageReference};
use crate::version::is_latest_range;
use crate::PackageError;

/// A dependency as declared in a manifest: a name and a range expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageDependency {
    /// Package name, `@scope/name` for scoped packages
    pub name: String,
    /// Range expression, or `latest` / `current`
    pub range: String,
}

impl PackageDependency {
    pub fn new(name: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            range: range.into(),
        }
    }

    /// True when the range asks for the newest available version
    pub fn is_latest(&self) -> bool {
        is_latest_range(&self.range)
    }

    /// Scope and bare name
    pub fn scope_and_name(&self) -> (Option<&str>, &str) {
        split_scope(&self.name).unwrap_or((None, self.name.as_str()))
    }

    /// The concrete reference this dependency resolves to at `version`
    pub fn at_version(&self, version: impl Into<String>) -> PackageReference {
        match self.scope_and_name() {
            (Some(scope), name) => PackageReference::scoped(scope, name, version),
            (None, name) => PackageReference::new(name, version),
        }
    }
}

impl fmt::Display for PackageDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.range.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}@{}", self.name, self.range)
        }
    }
}

impl FromStr for PackageDependency {
    type Err = PackageError;

    /// Parse `name`, `name@range` or `@scope/name@range`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || PackageError::InvalidDependency {
            name: s.to_string(),
            reason: "expected `name` or `name@range`".to_string(),
        };

        let (scope, rest) = split_scope(s).ok_or_else(invalid)?;
        let (name, range) = match rest.split_once('@') {
            Some((name, range)) => (name, range),
            None => (rest, "latest"),
        };
        if name.is_empty() {
            return Err(invalid());
        }

        let name = match scope {
            Some(scope) => format!("@{}/{}", scope, name),
            None => name.to_string(),
        };
        Ok(Self::new(name, range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_range() {
        let dep: PackageDependency = "acme.core@^1.0.0".parse().unwrap();
        assert_eq!(dep, PackageDependency::new("acme.core", "^1.0.0"));
        assert!(!dep.is_latest());
    }

    #[test]
    fn test_parse_without_range_means_latest() {
        let dep: PackageDependency = "acme.core".parse().unwrap();
        assert_eq!(dep.range, "latest");
        assert!(dep.is_latest());
    }

    #[test]
    fn test_scoped_dependency_resolves_to_scoped_reference() {
        let dep: PackageDependency = "@acme/core@~2.1.0".parse().unwrap();
        assert_eq!(dep.name, "@acme/core");
        assert_eq!(dep.scope_and_name(), (Some("acme"), "core"));
        assert_eq!(
            dep.at_version("2.1.3"),
            PackageReference::scoped("acme", "core", "2.1.3")
        );
    }

    #[test]
    fn test_parse_rejects_empty_name() {
        assert!("@1.0.0".parse::<PackageDependency>().is_err());
        assert!("".parse::<PackageDependency>().is_err());
    }
}
