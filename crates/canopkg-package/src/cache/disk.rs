//! Filesystem-backed package cache
//!
//! Layout:
//! ```text
//! <root>/
//!   <name>#<version>/
//!     package/
//!       package.json
//!       .index.json
//!       ...
//!   @<scope>/
//!     <name>#<version>/
//!       package/...
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use canopkg_config::CacheConfig;
use tracing::{debug, info, warn};

use super::{extract_index, relative_segments, PackageCache};
use crate::archive::{self, MANIFEST_FILE, PACKAGE_ROOT};
use crate::canonical_index::{CanonicalIndex, MetadataExtractor, ResourceMetadata, INDEX_FILE};
use crate::manifest::PackageManifest;
use crate::reference::PackageReference;
use crate::{PackageError, Result};

/// Prefix of staging directories created during install
const STAGING_PREFIX: &str = ".install-";

/// Package cache rooted at a directory
///
/// Installs unpack into a staging directory next to the final location and
/// move it into place with a single rename, so a package directory is either
/// absent or complete. Concurrent installs of the same package are safe: the
/// first rename wins and later ones discard their staging copy.
#[derive(Clone)]
pub struct DiskCache {
    root: PathBuf,
    extractor: Option<Arc<dyn MetadataExtractor>>,
}

impl DiskCache {
    /// Create a cache rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extractor: None,
        }
    }

    /// Create a cache at the configured location
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.root())
    }

    /// Generate missing `.index.json` files with this extractor
    pub fn with_extractor(mut self, extractor: Arc<dyn MetadataExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one installed package (the parent of `package/`)
    ///
    /// Fails if the scope, name or version would not stay a single directory
    /// name under the cache root.
    pub fn package_dir(&self, reference: &PackageReference) -> Result<PathBuf> {
        single_segment(&reference.name)?;
        single_segment(&reference.version)?;
        let base = match &reference.scope {
            Some(scope) => self.root.join(format!("@{}", single_segment(scope)?)),
            None => self.root.clone(),
        };
        Ok(base.join(reference.cache_key()))
    }

    fn content_root(&self, reference: &PackageReference) -> Result<PathBuf> {
        Ok(self.package_dir(reference)?.join(PACKAGE_ROOT))
    }

    fn file_path(&self, reference: &PackageReference, file_name: &str) -> Result<PathBuf> {
        let mut path = self.content_root(reference)?;
        for segment in relative_segments(file_name)? {
            path.push(segment);
        }
        Ok(path)
    }

    /// Remove an installed package; returns whether it was present
    pub fn remove(&self, reference: &PackageReference) -> Result<bool> {
        let dir = self.package_dir(reference)?;
        if !dir.is_dir() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir).map_err(|e| cache_error(&dir, "removing package", e))?;
        info!(package = %reference, "removed package from cache");
        Ok(true)
    }

    fn unpack_into(&self, staging: &Path, archive_bytes: &[u8]) -> Result<()> {
        for entry in archive::unpack(archive_bytes)? {
            let mut dest = staging.to_path_buf();
            for segment in relative_segments(&entry.path)? {
                dest.push(segment);
            }
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| cache_error(parent, "creating directory", e))?;
            }
            fs::write(&dest, &entry.content).map_err(|e| cache_error(&dest, "writing file", e))?;
        }

        if !staging.join(PACKAGE_ROOT).join(MANIFEST_FILE).is_file() {
            return Err(PackageError::Archive(format!(
                "archive has no {}/{}",
                PACKAGE_ROOT, MANIFEST_FILE
            )));
        }
        Ok(())
    }

    fn scan_packages(
        dir: &Path,
        scope: Option<&str>,
        found: &mut BTreeSet<PackageReference>,
    ) -> Result<()> {
        let entries = fs::read_dir(dir).map_err(|e| cache_error(dir, "listing packages", e))?;
        for entry in entries {
            let entry = entry.map_err(|e| cache_error(dir, "reading entry", e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };

            if file_name.starts_with(STAGING_PREFIX) {
                continue;
            }
            if scope.is_none() {
                if let Some(scope_name) = file_name.strip_prefix('@') {
                    Self::scan_packages(&entry.path(), Some(scope_name), found)?;
                    continue;
                }
            }
            if let Some(reference) = PackageReference::from_cache_key(&file_name) {
                let reference = match scope {
                    Some(scope) => {
                        PackageReference::scoped(scope, reference.name, reference.version)
                    }
                    None => reference,
                };
                found.insert(reference);
            }
        }
        Ok(())
    }

    fn generate_index(
        &self,
        reference: &PackageReference,
        extractor: &dyn MetadataExtractor,
    ) -> Result<Vec<ResourceMetadata>> {
        let content_root = self.content_root(reference)?;
        let mut files = Vec::new();
        let entries = fs::read_dir(&content_root)
            .map_err(|e| cache_error(&content_root, "listing package files", e))?;
        for entry in entries {
            let entry = entry.map_err(|e| cache_error(&content_root, "reading entry", e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                let content = fs::read(&path).map_err(|e| cache_error(&path, "reading file", e))?;
                files.push((name.to_string(), content));
            }
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let rows = extract_index(
            extractor,
            files.iter().map(|(name, content)| (name.as_str(), content.as_slice())),
        );

        let index_path = content_root.join(INDEX_FILE);
        match CanonicalIndex::new(rows.clone()).to_json() {
            Ok(json) => {
                if let Err(e) = fs::write(&index_path, json) {
                    warn!(
                        path = %index_path.display(),
                        error = %e,
                        "could not cache generated index"
                    );
                }
            }
            Err(e) => {
                warn!(package = %reference, error = %e, "could not serialize generated index")
            }
        }
        debug!(package = %reference, files = rows.len(), "generated canonical index");
        Ok(rows)
    }
}

impl PackageCache for DiskCache {
    fn is_installed(&self, reference: &PackageReference) -> bool {
        self.content_root(reference)
            .map_or(false, |root| root.join(MANIFEST_FILE).is_file())
    }

    fn install(&self, reference: &PackageReference, archive_bytes: &[u8]) -> Result<()> {
        let target = self.package_dir(reference)?;
        if target.is_dir() {
            debug!(package = %reference, "already installed");
            return Ok(());
        }

        let parent = target.parent().unwrap_or(&self.root).to_path_buf();
        fs::create_dir_all(&parent).map_err(|e| cache_error(&parent, "creating cache dir", e))?;

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&parent)
            .map_err(|e| cache_error(&parent, "creating staging dir", e))?;
        self.unpack_into(staging.path(), archive_bytes)?;

        match fs::rename(staging.path(), &target) {
            Ok(()) => {
                info!(package = %reference, path = %target.display(), "installed package");
                Ok(())
            }
            Err(_) if target.is_dir() => {
                debug!(package = %reference, "installed concurrently, keeping existing copy");
                Ok(())
            }
            Err(e) => Err(cache_error(&target, "moving package into place", e)),
        }
    }

    fn read_manifest(&self, reference: &PackageReference) -> Result<Option<PackageManifest>> {
        let path = self.content_root(reference)?.join(MANIFEST_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        PackageManifest::from_file(&path).map(Some)
    }

    fn get_canonical_index_entries(
        &self,
        reference: &PackageReference,
    ) -> Result<Vec<ResourceMetadata>> {
        if !self.is_installed(reference) {
            return Ok(Vec::new());
        }

        let index_path = self.content_root(reference)?.join(INDEX_FILE);
        if index_path.is_file() {
            let content =
                fs::read(&index_path).map_err(|e| cache_error(&index_path, "reading index", e))?;
            return Ok(CanonicalIndex::from_slice(&content)?.files);
        }

        match &self.extractor {
            Some(extractor) => self.generate_index(reference, extractor.as_ref()),
            None => {
                debug!(package = %reference, "no index file and no extractor");
                Ok(Vec::new())
            }
        }
    }

    fn get_file_content(
        &self,
        reference: &PackageReference,
        file_name: &str,
    ) -> Result<Option<Vec<u8>>> {
        let path = self.file_path(reference, file_name)?;
        if !path.is_file() {
            return Ok(None);
        }
        fs::read(&path)
            .map(Some)
            .map_err(|e| cache_error(&path, "reading file", e))
    }

    fn list_installed(&self) -> Result<BTreeSet<PackageReference>> {
        let mut found = BTreeSet::new();
        if self.root.is_dir() {
            Self::scan_packages(&self.root, None, &mut found)?;
        }
        Ok(found)
    }
}

fn single_segment(part: &str) -> Result<&str> {
    match relative_segments(part)?.as_slice() {
        [segment] => Ok(*segment),
        _ => Err(PackageError::Cache {
            path: part.to_string(),
            detail: "name escapes the cache root".to_string(),
        }),
    }
}

fn cache_error(path: &Path, action: &str, error: std::io::Error) -> PackageError {
    PackageError::Cache {
        path: path.display().to_string(),
        detail: format!("{action}: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::FileEntry;
    use tempfile::TempDir;

    fn archive_for(name: &str, version: &str, files: &[FileEntry]) -> Vec<u8> {
        archive::pack(&PackageManifest::new(name, version), files).unwrap()
    }

    #[test]
    fn test_install_and_read_back() {
        let temp = TempDir::new().unwrap();
        let cache = DiskCache::new(temp.path());
        let reference = PackageReference::new("acme.core", "1.0.0");
        let bytes = archive_for(
            "acme.core",
            "1.0.0",
            &[
                FileEntry::new("a.json", "{\"a\":1}"),
                FileEntry::new("readme.md", "hello"),
            ],
        );

        assert!(!cache.is_installed(&reference));
        cache.install(&reference, &bytes).unwrap();

        assert!(cache.is_installed(&reference));
        assert!(temp.path().join("acme.core#1.0.0/package/package.json").is_file());
        assert_eq!(
            cache.read_manifest(&reference).unwrap().unwrap().name,
            "acme.core"
        );
        assert_eq!(
            cache.get_file_content(&reference, "other/readme.md").unwrap(),
            Some(b"hello".to_vec())
        );
        assert_eq!(cache.get_file_content(&reference, "absent.json").unwrap(), None);
    }

    #[test]
    fn test_install_twice_is_noop() {
        let temp = TempDir::new().unwrap();
        let cache = DiskCache::new(temp.path());
        let reference = PackageReference::new("acme.core", "1.0.0");
        let bytes = archive_for("acme.core", "1.0.0", &[]);

        cache.install(&reference, &bytes).unwrap();
        cache.install(&reference, &bytes).unwrap();

        assert!(cache.is_installed(&reference));
        assert_eq!(cache.list_installed().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_install_leaves_nothing_behind() {
        let temp = TempDir::new().unwrap();
        let cache = DiskCache::new(temp.path());
        let reference = PackageReference::new("acme.core", "1.0.0");

        assert!(cache.install(&reference, b"not an archive").is_err());
        assert!(!cache.is_installed(&reference));
        assert!(cache.list_installed().unwrap().is_empty());
    }

    #[test]
    fn test_list_installed_with_scopes() {
        let temp = TempDir::new().unwrap();
        let cache = DiskCache::new(temp.path());
        let plain = PackageReference::new("acme.core", "1.0.0");
        let scoped = PackageReference::scoped("acme", "terms", "2.0.0");

        cache.install(&plain, &archive_for("acme.core", "1.0.0", &[])).unwrap();
        cache.install(&scoped, &archive_for("@acme/terms", "2.0.0", &[])).unwrap();

        let installed: Vec<PackageReference> = cache.list_installed().unwrap().into_iter().collect();
        assert_eq!(installed, vec![plain, scoped.clone()]);
        assert_eq!(
            cache.installed_versions("@acme/terms").unwrap().latest(),
            Some(semver::Version::new(2, 0, 0))
        );
    }

    #[test]
    fn test_index_generated_once_and_cached() {
        let temp = TempDir::new().unwrap();
        let extractor = |name: &str, _: &[u8]| {
            Some(ResourceMetadata::new(name).with_canonical(format!("http://acme.org/{name}"), None))
        };
        let cache = DiskCache::new(temp.path()).with_extractor(Arc::new(extractor));
        let reference = PackageReference::new("acme.core", "1.0.0");
        let bytes = archive_for(
            "acme.core",
            "1.0.0",
            &[FileEntry::new("b.json", "{}"), FileEntry::new("a.json", "{}")],
        );
        cache.install(&reference, &bytes).unwrap();

        let rows = cache.get_canonical_index_entries(&reference).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
        assert!(temp.path().join("acme.core#1.0.0/package/.index.json").is_file());

        let plain = DiskCache::new(temp.path());
        assert_eq!(plain.get_canonical_index_entries(&reference).unwrap(), rows);
    }

    #[test]
    fn test_index_of_missing_package_is_empty() {
        let temp = TempDir::new().unwrap();
        let cache = DiskCache::new(temp.path());
        let reference = PackageReference::new("ghost", "1.0.0");
        assert!(cache.get_canonical_index_entries(&reference).unwrap().is_empty());
    }

    #[test]
    fn test_file_lookup_rejects_traversal() {
        let temp = TempDir::new().unwrap();
        let cache = DiskCache::new(temp.path());
        let reference = PackageReference::new("acme.core", "1.0.0");
        assert!(cache.get_file_content(&reference, "../../etc/passwd").is_err());
    }

    #[test]
    fn test_install_rejects_names_outside_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("a/b");
        let cache = DiskCache::new(&root);
        let bytes = archive_for("escaped", "1.0.0", &[]);

        for reference in [
            PackageReference::new("../../escaped", "1.0.0"),
            PackageReference::new("escaped", "../1.0.0"),
            PackageReference::scoped("../..", "escaped", "1.0.0"),
        ] {
            assert!(matches!(
                cache.install(&reference, &bytes),
                Err(PackageError::Cache { .. })
            ));
            assert!(!cache.is_installed(&reference));
        }
        assert!(!temp.path().join("escaped#1.0.0").exists());
        assert!(!root.exists());
    }

    #[test]
    fn test_remove() {
        let temp = TempDir::new().unwrap();
        let cache = DiskCache::new(temp.path());
        let reference = PackageReference::new("acme.core", "1.0.0");
        cache.install(&reference, &archive_for("acme.core", "1.0.0", &[])).unwrap();

        assert!(cache.remove(&reference).unwrap());
        assert!(!cache.remove(&reference).unwrap());
        assert!(!cache.is_installed(&reference));
    }
}
