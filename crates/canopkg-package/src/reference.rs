//! Package references
//!
//! A [`PackageReference`] names one concrete, resolved package. Lookups that
//! may fail return a [`PackageMatch`], whose `NotFound` variant is the
//! "nothing resolved" value carried through restore and reporting.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::PackageError;

/// Separator between name and version in cache directory names
const CACHE_KEY_SEPARATOR: char = '#';

/// One concrete package: name, exact version and optional scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageReference {
    /// Registry scope without the leading '@'
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub name: String,
    pub version: String,
}

impl PackageReference {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            scope: None,
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn scoped(
        scope: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        let scope: String = scope.into();
        Self {
            scope: Some(scope.trim_start_matches('@').to_string()),
            name: name.into(),
            version: version.into(),
        }
    }

    /// `@scope/name` or plain `name`
    pub fn full_name(&self) -> String {
        match &self.scope {
            Some(scope) => format!("@{}/{}", scope, self.name),
            None => self.name.clone(),
        }
    }

    /// Directory name used by on-disk caches (`name#version`)
    pub fn cache_key(&self) -> String {
        format!("{}{}{}", self.name, CACHE_KEY_SEPARATOR, self.version)
    }

    /// Inverse of [`PackageReference::cache_key`]
    pub fn from_cache_key(key: &str) -> Option<Self> {
        let (name, version) = key.rsplit_once(CACHE_KEY_SEPARATOR)?;
        if name.is_empty() || version.is_empty() {
            return None;
        }
        Some(Self::new(name, version))
    }

    /// Parsed semantic version, if the version string is one
    pub fn semver(&self) -> Option<semver::Version> {
        crate::version::parse_version(&self.version)
    }
}

impl fmt::Display for PackageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.full_name(), self.version)
    }
}

impl FromStr for PackageReference {
    type Err = PackageError;

    /// Parse `name@version` or `@scope/name@version`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PackageError::InvalidReference(s.to_string());

        let (scope, rest) = split_scope(s.trim()).ok_or_else(invalid)?;
        let (name, version) = rest.split_once('@').ok_or_else(invalid)?;
        if name.is_empty() || version.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            scope: scope.map(str::to_string),
            name: name.to_string(),
            version: version.to_string(),
        })
    }
}

/// Split `@scope/rest` into its parts; plain strings have no scope
pub(crate) fn split_scope(s: &str) -> Option<(Option<&str>, &str)> {
    match s.strip_prefix('@') {
        Some(scoped) => {
            let (scope, rest) = scoped.split_once('/')?;
            if scope.is_empty() {
                return None;
            }
            Some((Some(scope), rest))
        }
        None => Some((None, s)),
    }
}

/// Outcome of resolving a dependency to a concrete package
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PackageMatch {
    Found(PackageReference),
    NotFound,
}

impl PackageMatch {
    pub fn is_found(&self) -> bool {
        matches!(self, PackageMatch::Found(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PackageMatch::NotFound)
    }

    pub fn reference(&self) -> Option<&PackageReference> {
        match self {
            PackageMatch::Found(reference) => Some(reference),
            PackageMatch::NotFound => None,
        }
    }

    pub fn into_reference(self) -> Option<PackageReference> {
        match self {
            PackageMatch::Found(reference) => Some(reference),
            PackageMatch::NotFound => None,
        }
    }
}

impl From<Option<PackageReference>> for PackageMatch {
    fn from(reference: Option<PackageReference>) -> Self {
        match reference {
            Some(reference) => PackageMatch::Found(reference),
            None => PackageMatch::NotFound,
        }
    }
}

impl fmt::Display for PackageMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageMatch::Found(reference) => write!(f, "{}", reference),
            PackageMatch::NotFound => write!(f, "<not found>"),
        }
    }
}

/// Who owns an indexed file: the local project or an installed package
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PackageOrigin {
    Project,
    Package(PackageReference),
}

impl PackageOrigin {
    pub fn is_project(&self) -> bool {
        matches!(self, PackageOrigin::Project)
    }

    pub fn package(&self) -> Option<&PackageReference> {
        match self {
            PackageOrigin::Project => None,
            PackageOrigin::Package(reference) => Some(reference),
        }
    }
}

impl fmt::Display for PackageOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageOrigin::Project => write!(f, "<project>"),
            PackageOrigin::Package(reference) => write!(f, "{}", reference),
        }
    }
}
