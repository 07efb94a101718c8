//! In-process package cache

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::{extract_index, relative_segments, PackageCache};
use crate::archive::{self, MANIFEST_FILE};
use crate::canonical_index::{CanonicalIndex, MetadataExtractor, ResourceMetadata, INDEX_FILE};
use crate::manifest::PackageManifest;
use crate::reference::PackageReference;
use crate::{PackageError, Result};

#[derive(Debug, Default)]
struct StoredPackage {
    /// Package-relative path -> content
    files: BTreeMap<String, Vec<u8>>,
    index: Option<Vec<ResourceMetadata>>,
}

/// Package cache held in memory
///
/// Useful for tests and for short-lived tools that should not touch the
/// shared on-disk cache.
#[derive(Default)]
pub struct MemoryCache {
    packages: RwLock<BTreeMap<PackageReference, StoredPackage>>,
    extractor: Option<Arc<dyn MetadataExtractor>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate missing indexes with this extractor
    pub fn with_extractor(mut self, extractor: Arc<dyn MetadataExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn len(&self) -> usize {
        self.packages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PackageCache for MemoryCache {
    fn is_installed(&self, reference: &PackageReference) -> bool {
        self.packages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(reference)
    }

    fn install(&self, reference: &PackageReference, archive_bytes: &[u8]) -> Result<()> {
        if self.is_installed(reference) {
            debug!(package = %reference, "already installed");
            return Ok(());
        }

        let mut stored = StoredPackage::default();
        for entry in archive::unpack(archive_bytes)? {
            let path = entry.package_path().to_string();
            relative_segments(&path)?;
            stored.files.insert(path, entry.content);
        }
        if !stored.files.contains_key(MANIFEST_FILE) {
            return Err(PackageError::Archive(format!(
                "archive has no {}",
                MANIFEST_FILE
            )));
        }

        self.packages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(reference.clone())
            .or_insert(stored);
        debug!(package = %reference, "installed package in memory");
        Ok(())
    }

    fn read_manifest(&self, reference: &PackageReference) -> Result<Option<PackageManifest>> {
        let packages = self.packages.read().unwrap_or_else(PoisonError::into_inner);
        match packages
            .get(reference)
            .and_then(|stored| stored.files.get(MANIFEST_FILE))
        {
            Some(content) => PackageManifest::from_slice(content).map(Some),
            None => Ok(None),
        }
    }

    fn get_canonical_index_entries(
        &self,
        reference: &PackageReference,
    ) -> Result<Vec<ResourceMetadata>> {
        let mut packages = self.packages.write().unwrap_or_else(PoisonError::into_inner);
        let Some(stored) = packages.get_mut(reference) else {
            return Ok(Vec::new());
        };

        if let Some(index) = &stored.index {
            return Ok(index.clone());
        }

        let rows = match (stored.files.get(INDEX_FILE), &self.extractor) {
            (Some(content), _) => CanonicalIndex::from_slice(content)?.files,
            (None, Some(extractor)) => extract_index(
                extractor.as_ref(),
                stored
                    .files
                    .iter()
                    .map(|(name, content)| (name.as_str(), content.as_slice())),
            ),
            (None, None) => Vec::new(),
        };
        stored.index = Some(rows.clone());
        Ok(rows)
    }

    fn get_file_content(
        &self,
        reference: &PackageReference,
        file_name: &str,
    ) -> Result<Option<Vec<u8>>> {
        let path = relative_segments(file_name)?.join("/");
        let packages = self.packages.read().unwrap_or_else(PoisonError::into_inner);
        Ok(packages
            .get(reference)
            .and_then(|stored| stored.files.get(&path))
            .cloned())
    }

    fn list_installed(&self) -> Result<BTreeSet<PackageReference>> {
        let packages = self.packages.read().unwrap_or_else(PoisonError::into_inner);
        Ok(packages.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::FileEntry;

    fn archive_for(name: &str, version: &str, files: &[FileEntry]) -> Vec<u8> {
        archive::pack(&PackageManifest::new(name, version), files).unwrap()
    }

    #[test]
    fn test_install_is_idempotent() {
        let cache = MemoryCache::new();
        let reference = PackageReference::new("acme.core", "1.0.0");
        let bytes = archive_for("acme.core", "1.0.0", &[FileEntry::new("a.json", "{}")]);

        cache.install(&reference, &bytes).unwrap();
        cache.install(&reference, &bytes).unwrap();

        assert!(cache.is_installed(&reference));
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get_file_content(&reference, "a.json").unwrap(),
            Some(b"{}".to_vec())
        );
    }

    #[test]
    fn test_reads_packaged_index() {
        let cache = MemoryCache::new();
        let reference = PackageReference::new("acme.core", "1.0.0");
        let index = CanonicalIndex::new(vec![ResourceMetadata::new("a.json")
            .with_canonical("http://acme.org/a", Some("1.0.0"))]);
        let bytes = archive_for(
            "acme.core",
            "1.0.0",
            &[FileEntry::new(INDEX_FILE, index.to_json().unwrap())],
        );
        cache.install(&reference, &bytes).unwrap();

        assert_eq!(cache.get_canonical_index_entries(&reference).unwrap(), index.files);
    }

    #[test]
    fn test_extractor_skips_manifest_and_misc_files() {
        let extractor = |name: &str, _: &[u8]| Some(ResourceMetadata::new(name));
        let cache = MemoryCache::new().with_extractor(Arc::new(extractor));
        let reference = PackageReference::new("acme.core", "1.0.0");
        let bytes = archive_for(
            "acme.core",
            "1.0.0",
            &[FileEntry::new("a.json", "{}"), FileEntry::new("notes.txt", "x")],
        );
        cache.install(&reference, &bytes).unwrap();

        let rows = cache.get_canonical_index_entries(&reference).unwrap();
        assert_eq!(rows, vec![ResourceMetadata::new("a.json")]);
    }

    #[test]
    fn test_lookups_on_missing_package() {
        let cache = MemoryCache::new();
        let reference = PackageReference::new("ghost", "1.0.0");
        assert_eq!(cache.read_manifest(&reference).unwrap(), None);
        assert_eq!(cache.get_file_content(&reference, "a.json").unwrap(), None);
        assert!(cache.get_canonical_index_entries(&reference).unwrap().is_empty());
    }
}
