//! Package manifest validation

use crate::dependency::PackageDependency;
use crate::manifest::PackageManifest;
use crate::reference::split_scope;
use crate::version::{is_latest_range, parse_version, VersionRange};

/// Maximum package name length (including scope)
pub const MAX_NAME_LENGTH: usize = 214;

/// Validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid package name format
    InvalidPackageName(String),
    /// Invalid version
    InvalidVersion(String),
    /// Invalid dependency specification
    InvalidDependency { name: String, reason: String },
    /// Package lists itself as a dependency
    SelfDependency(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidPackageName(name) => {
                write!(f, "Invalid package name: {}", name)
            }
            ValidationError::InvalidVersion(version) => {
                write!(f, "Invalid version: {}", version)
            }
            ValidationError::InvalidDependency { name, reason } => {
                write!(f, "Invalid dependency '{}': {}", name, reason)
            }
            ValidationError::SelfDependency(name) => {
                write!(f, "Package '{}' depends on itself", name)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Package manifest validator
pub struct Validator;

impl Validator {
    /// Validate package manifest
    pub fn validate(manifest: &PackageManifest) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_package_name(&manifest.name) {
            errors.push(e);
        }

        if let Err(e) = Self::validate_version(&manifest.version) {
            errors.push(e);
        }

        for dependency in manifest.dependency_list() {
            if dependency.name == manifest.name {
                errors.push(ValidationError::SelfDependency(manifest.name.clone()));
                continue;
            }
            if let Err(e) = Self::validate_dependency(&dependency) {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate package name format
    ///
    /// Names are lowercase ASCII letters, digits, `.`, `-` and `_`, start with a
    /// letter or digit, and never contain two separators in a row. A scoped
    /// name (`@scope/name`) applies the same rule to both parts.
    pub fn validate_package_name(name: &str) -> Result<(), ValidationError> {
        if name.len() > MAX_NAME_LENGTH {
            return Err(ValidationError::InvalidPackageName(format!(
                "'{}' exceeds maximum length of {} characters",
                name, MAX_NAME_LENGTH
            )));
        }

        match split_scope(name) {
            Some((Some(scope), bare)) => {
                Self::validate_name_part(name, scope)?;
                Self::validate_name_part(name, bare)
            }
            Some((None, bare)) => Self::validate_name_part(name, bare),
            None => Err(ValidationError::InvalidPackageName(format!(
                "'{}' has an empty scope",
                name
            ))),
        }
    }

    fn validate_name_part(name: &str, part: &str) -> Result<(), ValidationError> {
        let Some(first) = part.chars().next() else {
            return Err(ValidationError::InvalidPackageName(
                "Package name cannot be empty".to_string(),
            ));
        };

        if !first.is_ascii_lowercase() && !first.is_ascii_digit() {
            return Err(ValidationError::InvalidPackageName(format!(
                "'{}' must start with lowercase letter or digit",
                name
            )));
        }

        if !part.chars().all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || is_separator(c)
        }) {
            return Err(ValidationError::InvalidPackageName(format!(
                "'{}' contains invalid characters (only lowercase, digits, ., -, _ allowed)",
                name
            )));
        }

        if part.ends_with(is_separator) {
            return Err(ValidationError::InvalidPackageName(format!(
                "'{}' cannot end with ., - or _",
                name
            )));
        }

        let chars: Vec<char> = part.chars().collect();
        if chars
            .windows(2)
            .any(|pair| is_separator(pair[0]) && is_separator(pair[1]))
        {
            return Err(ValidationError::InvalidPackageName(format!(
                "'{}' cannot contain consecutive separators",
                name
            )));
        }

        Ok(())
    }

    /// Validate a package version (must be semver)
    pub fn validate_version(version: &str) -> Result<(), ValidationError> {
        match parse_version(version) {
            Some(_) => Ok(()),
            None => Err(ValidationError::InvalidVersion(version.to_string())),
        }
    }

    /// Validate a dependency name and range expression
    pub fn validate_dependency(dependency: &PackageDependency) -> Result<(), ValidationError> {
        if let Err(e) = Self::validate_package_name(&dependency.name) {
            return Err(ValidationError::InvalidDependency {
                name: dependency.name.clone(),
                reason: e.to_string(),
            });
        }

        if !is_latest_range(&dependency.range) && VersionRange::parse(&dependency.range).is_none()
        {
            return Err(ValidationError::InvalidDependency {
                name: dependency.name.clone(),
                reason: format!("Invalid version range: {}", dependency.range),
            });
        }

        Ok(())
    }
}

fn is_separator(c: char) -> bool {
    matches!(c, '.' | '-' | '_')
}
