//! Dependency restore
//!
//! Walks the dependency graph depth-first from a manifest, resolving each
//! dependency against the registry (or the cache when no registry is
//! configured), installing what is not yet cached and recording the outcome
//! in a fresh [`PackageClosure`].
//!
//! A name is resolved once per restore. Later requests for the same name
//! reuse the first resolution, which also stops dependency cycles: a name is
//! recorded as found before its own dependencies are visited. A later request
//! whose range the first resolution does not satisfy, such as a package that
//! depends on itself at another version, is recorded as a conflict.
//!
//! Dependencies read from manifests are validated before use; an invalid
//! name or range is recorded as missing.

use tracing::{debug, info, warn};

use crate::cache::PackageCache;
use crate::dependency::PackageDependency;
use crate::lockfile::PackageClosure;
use crate::manifest::PackageManifest;
use crate::project::ProjectStore;
use crate::reference::{PackageMatch, PackageReference};
use crate::registry::PackageRegistry;
use crate::validator::Validator;
use crate::version::{VersionRange, Versions};
use crate::{PackageError, Result};

/// Builds the closure of one manifest
pub struct Restorer<'a> {
    cache: &'a dyn PackageCache,
    registry: Option<&'a dyn PackageRegistry>,
    closure: PackageClosure,
}

impl<'a> Restorer<'a> {
    pub fn new(cache: &'a dyn PackageCache, registry: Option<&'a dyn PackageRegistry>) -> Self {
        Self {
            cache,
            registry,
            closure: PackageClosure::new(),
        }
    }

    /// Restore the project's manifest and persist the closure as its lock file
    pub fn restore_project(self, project: &dyn ProjectStore) -> Result<PackageClosure> {
        let manifest = project
            .read_manifest()?
            .ok_or(PackageError::ManifestNotFound)?;
        let closure = self.restore(&manifest);
        project.write_closure(&closure)?;
        Ok(closure)
    }

    /// Resolve every dependency reachable from `manifest`
    pub fn restore(mut self, manifest: &PackageManifest) -> PackageClosure {
        info!(
            package = %manifest.name,
            dependencies = manifest.dependencies.len(),
            online = self.registry.is_some(),
            "restoring dependencies"
        );

        self.closure = PackageClosure::new();
        self.restore_manifest(manifest);

        info!(
            found = self.closure.found.len(),
            missing = self.closure.missing.len(),
            "restore finished"
        );
        self.closure
    }

    /// Resolve a single dependency (and its dependencies) into the closure
    pub fn restore_dependency(&mut self, dependency: &PackageDependency) -> PackageMatch {
        if let Err(e) = Validator::validate_dependency(dependency) {
            warn!(dependency = %dependency, error = %e, "skipping invalid dependency");
            self.closure.add_missing(dependency.clone());
            return PackageMatch::NotFound;
        }

        if let Some(existing) = self.closure.find(&dependency.name).cloned() {
            if !satisfies(&existing, dependency) {
                warn!(
                    dependency = %dependency,
                    resolved = %existing,
                    "reusing earlier resolution that does not satisfy this range"
                );
                self.closure.add_conflict(dependency.clone());
            }
            return PackageMatch::Found(existing);
        }

        let Some(reference) = self.resolve(dependency) else {
            debug!(dependency = %dependency, "no version satisfies range");
            self.closure.add_missing(dependency.clone());
            return PackageMatch::NotFound;
        };

        if !self.ensure_installed(&reference) {
            self.closure.add_missing(dependency.clone());
            return PackageMatch::NotFound;
        }

        debug!(dependency = %dependency, resolved = %reference, "resolved");
        self.closure.add_found(reference.clone());

        match self.cache.read_manifest(&reference) {
            Ok(Some(manifest)) => self.restore_manifest(&manifest),
            Ok(None) => debug!(package = %reference, "installed package has no manifest"),
            Err(e) => warn!(package = %reference, error = %e, "could not read package manifest"),
        }

        PackageMatch::Found(reference)
    }

    /// The closure built so far
    pub fn closure(&self) -> &PackageClosure {
        &self.closure
    }

    pub fn into_closure(self) -> PackageClosure {
        self.closure
    }

    fn restore_manifest(&mut self, manifest: &PackageManifest) {
        for dependency in manifest.dependency_list() {
            self.restore_dependency(&dependency);
        }
    }

    fn available_versions(&self, name: &str) -> Versions {
        match self.registry {
            Some(registry) => registry.get_versions(name),
            None => self.cache.installed_versions(name).unwrap_or_else(|e| {
                warn!(package = name, error = %e, "could not list installed versions");
                Versions::new()
            }),
        }
    }

    fn resolve(&self, dependency: &PackageDependency) -> Option<PackageReference> {
        let version = self
            .available_versions(&dependency.name)
            .resolve(&dependency.range)?;
        Some(dependency.at_version(version.to_string()))
    }

    fn ensure_installed(&self, reference: &PackageReference) -> bool {
        if self.cache.is_installed(reference) {
            return true;
        }

        let Some(registry) = self.registry else {
            warn!(package = %reference, "not installed and no registry configured");
            return false;
        };

        let Some(archive) = registry.get_package(reference) else {
            warn!(package = %reference, "download failed");
            return false;
        };

        match self.cache.install(reference, &archive) {
            Ok(()) => true,
            Err(e) => {
                warn!(package = %reference, error = %e, "install failed");
                false
            }
        }
    }
}

/// True if an already resolved reference satisfies a dependency's range
fn satisfies(reference: &PackageReference, dependency: &PackageDependency) -> bool {
    if dependency.is_latest() {
        return true;
    }
    match (VersionRange::parse(&dependency.range), reference.semver()) {
        (Some(range), Some(version)) => range.matches(&version),
        _ => false,
    }
}
