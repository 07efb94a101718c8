//! Resolution context
//!
//! A [`PackageContext`] ties a project to a cache and, optionally, a
//! registry. It restores the project's closure and serves canonical lookups
//! over the project plus that closure.
//!
//! The file index is built explicitly with [`PackageContext::build_index`]
//! and dropped by every restore; lookups before a build fail with
//! [`PackageError::IndexNotBuilt`]. Restore and index queries on one context
//! must not interleave.

use std::sync::Arc;

use canopkg_config::Config;
use tracing::info;

use crate::cache::{DiskCache, PackageCache};
use crate::dependency::PackageDependency;
use crate::file_index::{FileIndex, PackageFileReference};
use crate::lockfile::PackageClosure;
use crate::manifest::PackageManifest;
use crate::project::ProjectStore;
use crate::reference::{PackageMatch, PackageOrigin};
use crate::registry::{HttpRegistryClient, PackageRegistry};
use crate::restore::Restorer;
use crate::validator::{ValidationError, Validator};
use crate::{PackageError, Result};

pub struct PackageContext {
    project: Box<dyn ProjectStore>,
    cache: Arc<dyn PackageCache>,
    registry: Option<Arc<dyn PackageRegistry>>,
    index: Option<FileIndex>,
}

impl PackageContext {
    pub fn new(
        project: Box<dyn ProjectStore>,
        cache: Arc<dyn PackageCache>,
        registry: Option<Arc<dyn PackageRegistry>>,
    ) -> Self {
        Self {
            project,
            cache,
            registry,
            index: None,
        }
    }

    /// Context that resolves against installed packages only
    pub fn offline(project: Box<dyn ProjectStore>, cache: Arc<dyn PackageCache>) -> Self {
        Self::new(project, cache, None)
    }

    /// Context over the configured disk cache and HTTP registry
    pub fn from_config(project: Box<dyn ProjectStore>, config: &Config) -> Result<Self> {
        let cache = DiskCache::from_config(&config.cache);
        let registry = HttpRegistryClient::from_config(&config.registry)?;
        Ok(Self::new(project, Arc::new(cache), Some(Arc::new(registry))))
    }

    pub fn project(&self) -> &dyn ProjectStore {
        self.project.as_ref()
    }

    pub fn cache(&self) -> &dyn PackageCache {
        self.cache.as_ref()
    }

    pub fn registry(&self) -> Option<&dyn PackageRegistry> {
        self.registry.as_deref()
    }

    // ------------------------------------------------------------------
    // Manifest operations
    // ------------------------------------------------------------------

    /// Create the project manifest
    pub fn init(&mut self, name: &str, version: &str) -> Result<PackageManifest> {
        Validator::validate_package_name(name).map_err(|e| match e {
            ValidationError::InvalidPackageName(reason) => PackageError::InvalidPackageName(reason),
            other => PackageError::InvalidManifest(vec![other]),
        })?;
        Validator::validate_version(version)
            .map_err(|e| PackageError::InvalidManifest(vec![e]))?;

        if let Some(existing) = self.project.read_manifest()? {
            return Err(PackageError::ManifestExists(existing.name));
        }

        let manifest = PackageManifest::new(name, version);
        self.project.write_manifest(&manifest)?;
        info!(package = name, version, "initialized project");
        Ok(manifest)
    }

    /// The project manifest
    pub fn manifest(&self) -> Result<PackageManifest> {
        self.project
            .read_manifest()?
            .ok_or(PackageError::ManifestNotFound)
    }

    /// Declare a dependency in the project manifest
    ///
    /// The updated manifest is validated as a whole before it is written, so a
    /// project never declares itself as a dependency.
    pub fn add_dependency(&mut self, dependency: PackageDependency) -> Result<()> {
        let mut manifest = self.manifest()?;
        manifest.add_dependency(dependency)?;
        Validator::validate(&manifest).map_err(PackageError::InvalidManifest)?;
        self.project.write_manifest(&manifest)
    }

    /// Remove a dependency; returns whether it was declared
    pub fn remove_dependency(&mut self, name: &str) -> Result<bool> {
        let mut manifest = self.manifest()?;
        let removed = manifest.remove_dependency(name);
        if removed {
            self.project.write_manifest(&manifest)?;
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Restore
    // ------------------------------------------------------------------

    /// Rebuild the closure from scratch and persist it as the lock file
    pub fn restore(&mut self) -> Result<PackageClosure> {
        self.index = None;
        Restorer::new(self.cache.as_ref(), self.registry.as_deref())
            .restore_project(self.project.as_ref())
    }

    /// Declare a dependency, restore, and report what it resolved to
    pub fn install(&mut self, dependency: PackageDependency) -> Result<PackageMatch> {
        let name = dependency.name.clone();
        self.add_dependency(dependency)?;
        let closure = self.restore()?;
        Ok(PackageMatch::from(closure.find(&name).cloned()))
    }

    /// The persisted closure; empty if the project was never restored
    pub fn closure(&self) -> Result<PackageClosure> {
        Ok(self.project.read_closure()?.unwrap_or_default())
    }

    // ------------------------------------------------------------------
    // Canonical index
    // ------------------------------------------------------------------

    /// Build the file index from the project and its persisted closure
    pub fn build_index(&mut self) -> Result<&FileIndex> {
        let closure = self.closure()?;
        let index = FileIndex::build(self.project.as_ref(), &closure, self.cache.as_ref())?;
        Ok(self.index.insert(index))
    }

    /// The file index, if built since the last restore
    pub fn index(&self) -> Option<&FileIndex> {
        self.index.as_ref()
    }

    fn built_index(&self) -> Result<&FileIndex> {
        self.index.as_ref().ok_or(PackageError::IndexNotBuilt)
    }

    /// First indexed file with this canonical
    pub fn resolve_canonical(
        &self,
        canonical: &str,
        version: Option<&str>,
    ) -> Result<Option<&PackageFileReference>> {
        Ok(self.built_index()?.resolve_canonical(canonical, version))
    }

    /// The single authoritative file with this canonical
    pub fn resolve_best_candidate_by_canonical(
        &self,
        canonical: &str,
        version: Option<&str>,
    ) -> Result<Option<&PackageFileReference>> {
        self.built_index()?
            .resolve_best_candidate_by_canonical(canonical, version)
    }

    /// Content of an indexed file, from the project or the cache
    pub fn get_file_content(&self, file: &PackageFileReference) -> Result<Option<Vec<u8>>> {
        match &file.origin {
            PackageOrigin::Project => self.project.get_file_content(&file.file_name),
            PackageOrigin::Package(reference) => {
                self.cache.get_file_content(reference, &file.file_name)
            }
        }
    }
}
