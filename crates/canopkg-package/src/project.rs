//! Project storage
//!
//! A [`ProjectStore`] holds the working project's manifest, its lock file and
//! its own indexable documents. [`DirectoryProject`] keeps them in a folder;
//! [`MemoryProject`] keeps them in memory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::archive::MANIFEST_FILE;
use crate::cache::{extract_index, relative_segments};
use crate::canonical_index::{MetadataExtractor, ResourceMetadata};
use crate::lockfile::{LockFile, PackageClosure};
use crate::manifest::PackageManifest;
use crate::{PackageError, Result};

/// Lock file name next to the project manifest
pub const LOCK_FILE: &str = "package-lock.json";

/// Storage backend of the working project
pub trait ProjectStore: Send + Sync {
    /// The project manifest; `None` if the project has none yet
    fn read_manifest(&self) -> Result<Option<PackageManifest>>;

    fn write_manifest(&self, manifest: &PackageManifest) -> Result<()>;

    /// The persisted closure; `None` if the project was never restored
    fn read_closure(&self) -> Result<Option<PackageClosure>>;

    /// Persist a closure as the project's lock file
    fn write_closure(&self, closure: &PackageClosure) -> Result<()>;

    /// Index rows of the project's own documents
    fn get_canonical_index_entries(&self) -> Result<Vec<ResourceMetadata>>;

    /// Raw content of one of the project's own files
    fn get_file_content(&self, file_name: &str) -> Result<Option<Vec<u8>>>;
}

fn verified_closure(lock: &LockFile) -> Result<PackageClosure> {
    lock.verify().map_err(PackageError::InvalidLockFile)?;
    Ok(lock.closure())
}

/// Project kept in a directory: `package.json`, `package-lock.json` and the
/// project's documents side by side
#[derive(Clone)]
pub struct DirectoryProject {
    root: PathBuf,
    extractor: Option<Arc<dyn MetadataExtractor>>,
}

impl DirectoryProject {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extractor: None,
        }
    }

    /// Index the project's documents with this extractor
    pub fn with_extractor(mut self, extractor: Arc<dyn MetadataExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }
}

impl ProjectStore for DirectoryProject {
    fn read_manifest(&self) -> Result<Option<PackageManifest>> {
        let path = self.manifest_path();
        if !path.is_file() {
            return Ok(None);
        }
        PackageManifest::from_file(&path).map(Some)
    }

    fn write_manifest(&self, manifest: &PackageManifest) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        manifest.write_to_file(&self.manifest_path())
    }

    fn read_closure(&self) -> Result<Option<PackageClosure>> {
        let path = self.lock_path();
        if !path.is_file() {
            return Ok(None);
        }
        verified_closure(&LockFile::from_file(&path)?).map(Some)
    }

    fn write_closure(&self, closure: &PackageClosure) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        LockFile::from_closure(closure).write_to_file(&self.lock_path())
    }

    fn get_canonical_index_entries(&self) -> Result<Vec<ResourceMetadata>> {
        let Some(extractor) = &self.extractor else {
            return Ok(Vec::new());
        };
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name == LOCK_FILE {
                continue;
            }
            files.push((name, fs::read(&path)?));
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(extract_index(
            extractor.as_ref(),
            files
                .iter()
                .map(|(name, content)| (name.as_str(), content.as_slice())),
        ))
    }

    fn get_file_content(&self, file_name: &str) -> Result<Option<Vec<u8>>> {
        let mut path = self.root.clone();
        for segment in relative_segments(file_name)? {
            path.push(segment);
        }
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(fs::read(&path)?))
    }
}

#[derive(Debug, Default)]
struct ProjectState {
    manifest: Option<PackageManifest>,
    lock: Option<LockFile>,
    files: BTreeMap<String, Vec<u8>>,
    entries: Vec<ResourceMetadata>,
}

/// Project held in memory
#[derive(Debug, Default)]
pub struct MemoryProject {
    state: RwLock<ProjectState>,
}

impl MemoryProject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Project with an initial manifest
    pub fn with_manifest(manifest: PackageManifest) -> Self {
        let project = Self::new();
        project.write().manifest = Some(manifest);
        project
    }

    /// Add one of the project's own documents with its index row
    pub fn add_file(
        &self,
        file_name: impl Into<String>,
        content: impl Into<Vec<u8>>,
        metadata: Option<ResourceMetadata>,
    ) {
        let mut state = self.write();
        state.files.insert(file_name.into(), content.into());
        if let Some(metadata) = metadata {
            state.entries.push(metadata);
        }
    }

    /// The lock file as last written
    pub fn lock_file(&self) -> Option<LockFile> {
        self.read().lock.clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ProjectState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, ProjectState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProjectStore for MemoryProject {
    fn read_manifest(&self) -> Result<Option<PackageManifest>> {
        Ok(self.read().manifest.clone())
    }

    fn write_manifest(&self, manifest: &PackageManifest) -> Result<()> {
        self.write().manifest = Some(manifest.clone());
        Ok(())
    }

    fn read_closure(&self) -> Result<Option<PackageClosure>> {
        match &self.read().lock {
            Some(lock) => verified_closure(lock).map(Some),
            None => Ok(None),
        }
    }

    fn write_closure(&self, closure: &PackageClosure) -> Result<()> {
        self.write().lock = Some(LockFile::from_closure(closure));
        Ok(())
    }

    fn get_canonical_index_entries(&self) -> Result<Vec<ResourceMetadata>> {
        Ok(self.read().entries.clone())
    }

    fn get_file_content(&self, file_name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.read().files.get(file_name).cloned())
    }
}
