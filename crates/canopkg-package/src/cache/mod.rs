//! Installed-package cache
//!
//! A [`PackageCache`] stores installed packages keyed by (name, version) and
//! answers manifest, index and file lookups for them. Two implementations are
//! provided: [`DiskCache`] for the shared on-disk store and [`MemoryCache`]
//! for in-process use.

mod disk;
mod memory;

pub use disk::DiskCache;
pub use memory::MemoryCache;

use std::collections::BTreeSet;

use crate::archive::MANIFEST_FILE;
use crate::canonical_index::{MetadataExtractor, ResourceMetadata, INDEX_FILE};
use crate::manifest::PackageManifest;
use crate::reference::PackageReference;
use crate::version::Versions;
use crate::{PackageError, Result};

/// Store of installed packages
///
/// File names passed to lookups are relative to the package root, e.g.
/// `StructureDefinition-a.json` or `other/readme.md`.
pub trait PackageCache: Send + Sync {
    /// True if the package is installed
    fn is_installed(&self, reference: &PackageReference) -> bool;

    /// Install a package from its archive bytes
    ///
    /// Installing a package that is already present succeeds without
    /// changing it.
    fn install(&self, reference: &PackageReference, archive: &[u8]) -> Result<()>;

    /// Manifest of an installed package; `None` if not installed
    fn read_manifest(&self, reference: &PackageReference) -> Result<Option<PackageManifest>>;

    /// Canonical index rows of an installed package
    ///
    /// Read from the package's `.index.json`, or generated on first read
    /// when the cache has a metadata extractor. Empty if not installed.
    fn get_canonical_index_entries(
        &self,
        reference: &PackageReference,
    ) -> Result<Vec<ResourceMetadata>>;

    /// Raw content of one file in an installed package
    fn get_file_content(
        &self,
        reference: &PackageReference,
        file_name: &str,
    ) -> Result<Option<Vec<u8>>>;

    /// Every installed package
    fn list_installed(&self) -> Result<BTreeSet<PackageReference>>;

    /// Installed versions of one package (`@scope/name` for scoped packages)
    fn installed_versions(&self, full_name: &str) -> Result<Versions> {
        let installed = self.list_installed()?;
        Ok(Versions::parse(
            installed
                .iter()
                .filter(|r| r.full_name() == full_name)
                .map(|r| r.version.as_str()),
        ))
    }
}

/// True for top-level package files a metadata extractor should see
pub(crate) fn is_indexable(file_name: &str) -> bool {
    file_name != MANIFEST_FILE && file_name != INDEX_FILE && !file_name.contains('/')
}

/// Run an extractor over package files, keeping the rows it produces
pub(crate) fn extract_index<'a, I>(
    extractor: &dyn MetadataExtractor,
    files: I,
) -> Vec<ResourceMetadata>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    files
        .into_iter()
        .filter(|(name, _)| is_indexable(name))
        .filter_map(|(name, content)| extractor.extract(name, content))
        .collect()
}

/// Validate a package-relative file name and split it into segments
pub(crate) fn relative_segments(file_name: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = file_name.split(['/', '\\']).collect();
    if file_name.is_empty()
        || segments
            .iter()
            .any(|s| s.is_empty() || *s == "." || *s == ".." || s.contains(':'))
    {
        return Err(PackageError::Cache {
            path: file_name.to_string(),
            detail: "file name escapes the package root".to_string(),
        });
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("StructureDefinition-a.json", true)]
    #[case("package.json", false)]
    #[case(".index.json", false)]
    #[case("other/readme.md", false)]
    #[case("examples/a.json", false)]
    fn test_is_indexable(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_indexable(name), expected);
    }

    #[rstest]
    #[case("../secret")]
    #[case("other/../../secret")]
    #[case("/etc/passwd")]
    #[case("C:\\windows")]
    #[case("")]
    fn test_relative_segments_rejects_escapes(#[case] name: &str) {
        assert!(relative_segments(name).is_err());
    }

    #[test]
    fn test_relative_segments_accepts_nested_files() {
        assert_eq!(
            relative_segments("other/docs\\readme.md").unwrap(),
            vec!["other", "docs", "readme.md"]
        );
    }
}
