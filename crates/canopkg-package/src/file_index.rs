//! Cross-package canonical file index
//!
//! The index lists the project's own documents first, then the documents of
//! every package in the closure, in closure order. That order decides which
//! row wins a plain [`FileIndex::resolve_canonical`] lookup.

use tracing::{debug, warn};

use crate::cache::PackageCache;
use crate::canonical_index::ResourceMetadata;
use crate::lockfile::PackageClosure;
use crate::project::ProjectStore;
use crate::reference::{PackageOrigin, PackageReference};
use crate::{PackageError, Result};

/// Separator between a canonical URI and an embedded version
const CANONICAL_VERSION_SEPARATOR: char = '|';

/// One indexed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFileReference {
    pub origin: PackageOrigin,
    /// Path relative to the owning package's root
    pub file_name: String,
    pub canonical: Option<String>,
    pub canonical_version: Option<String>,
    pub resource_type: Option<String>,
    pub id: Option<String>,
    pub has_snapshot: bool,
    pub has_expansion: bool,
}

impl PackageFileReference {
    pub fn from_metadata(origin: PackageOrigin, metadata: ResourceMetadata) -> Self {
        Self {
            origin,
            file_name: metadata.filename,
            canonical: metadata.url,
            canonical_version: metadata.version,
            resource_type: metadata.resource_type,
            id: metadata.id,
            has_snapshot: metadata.has_snapshot,
            has_expansion: metadata.has_expansion,
        }
    }

    /// The owning package; `None` for the project's own files
    pub fn package(&self) -> Option<&PackageReference> {
        self.origin.package()
    }

    pub fn is_authoritative(&self) -> bool {
        self.has_snapshot || self.has_expansion
    }

    fn matches(&self, canonical: &str, version: Option<&str>) -> bool {
        self.canonical.as_deref() == Some(canonical)
            && version.map_or(true, |v| self.canonical_version.as_deref() == Some(v))
    }
}

impl std::fmt::Display for PackageFileReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.origin, self.file_name)
    }
}

/// Split `uri|version`; an explicit version takes precedence
pub fn split_canonical<'a>(
    canonical: &'a str,
    version: Option<&'a str>,
) -> (&'a str, Option<&'a str>) {
    let (uri, embedded) = match canonical.split_once(CANONICAL_VERSION_SEPARATOR) {
        Some((uri, embedded)) if !embedded.is_empty() => (uri, Some(embedded)),
        Some((uri, _)) => (uri, None),
        None => (canonical, None),
    };
    (uri, version.or(embedded))
}

/// Canonical lookup table over the project and its closure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileIndex {
    entries: Vec<PackageFileReference>,
}

impl FileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the project's own documents plus every closure package
    ///
    /// A package whose index cannot be read is logged and skipped.
    pub fn build(
        project: &dyn ProjectStore,
        closure: &PackageClosure,
        cache: &dyn PackageCache,
    ) -> Result<Self> {
        let mut index = Self::new();
        index.extend(PackageOrigin::Project, project.get_canonical_index_entries()?);

        for reference in &closure.found {
            match cache.get_canonical_index_entries(reference) {
                Ok(rows) => index.extend(PackageOrigin::Package(reference.clone()), rows),
                Err(e) => {
                    warn!(package = %reference, error = %e, "skipping unreadable package index")
                }
            }
        }

        debug!(entries = index.len(), packages = closure.found.len(), "built file index");
        Ok(index)
    }

    /// Append rows owned by one origin
    pub fn extend<I>(&mut self, origin: PackageOrigin, rows: I)
    where
        I: IntoIterator<Item = ResourceMetadata>,
    {
        self.entries.extend(
            rows.into_iter()
                .map(|row| PackageFileReference::from_metadata(origin.clone(), row)),
        );
    }

    pub fn push(&mut self, entry: PackageFileReference) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageFileReference> {
        self.entries.iter()
    }

    /// Files owned by one origin
    pub fn files_of<'a>(
        &'a self,
        origin: &'a PackageOrigin,
    ) -> impl Iterator<Item = &'a PackageFileReference> {
        self.entries.iter().filter(move |entry| &entry.origin == origin)
    }

    /// Every row matching a canonical, in index order
    pub fn candidates(
        &self,
        canonical: &str,
        version: Option<&str>,
    ) -> Vec<&PackageFileReference> {
        let (uri, version) = split_canonical(canonical, version);
        self.entries
            .iter()
            .filter(|entry| entry.matches(uri, version))
            .collect()
    }

    /// First row matching a canonical
    pub fn resolve_canonical(
        &self,
        canonical: &str,
        version: Option<&str>,
    ) -> Option<&PackageFileReference> {
        let (uri, version) = split_canonical(canonical, version);
        self.entries.iter().find(|entry| entry.matches(uri, version))
    }

    /// The single best row for a canonical
    ///
    /// With several matches only authoritative rows (snapshot or expansion)
    /// are kept. One left is the answer, none left is `Ok(None)`, and more
    /// than one is a [`PackageError::ConflictingCandidates`].
    pub fn resolve_best_candidate_by_canonical(
        &self,
        canonical: &str,
        version: Option<&str>,
    ) -> Result<Option<&PackageFileReference>> {
        let candidates = self.candidates(canonical, version);
        if candidates.len() <= 1 {
            return Ok(candidates.into_iter().next());
        }

        let authoritative: Vec<&PackageFileReference> = candidates
            .into_iter()
            .filter(|entry| entry.is_authoritative())
            .collect();

        match authoritative.as_slice() {
            [] => Ok(None),
            [only] => Ok(Some(*only)),
            conflicting => Err(PackageError::ConflictingCandidates {
                canonical: canonical.to_string(),
                candidates: conflicting.iter().map(|entry| entry.to_string()).collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const URI: &str = "http://acme.org/sd/patient";

    fn package(name: &str) -> PackageOrigin {
        PackageOrigin::Package(PackageReference::new(name, "1.0.0"))
    }

    fn row(file: &str, version: Option<&str>) -> ResourceMetadata {
        ResourceMetadata::new(file).with_canonical(URI, version)
    }

    fn index_of(rows: Vec<(PackageOrigin, ResourceMetadata)>) -> FileIndex {
        let mut index = FileIndex::new();
        for (origin, metadata) in rows {
            index.extend(origin, [metadata]);
        }
        index
    }

    #[rstest]
    #[case("http://a/b", None, ("http://a/b", None))]
    #[case("http://a/b|1.0", None, ("http://a/b", Some("1.0")))]
    #[case("http://a/b|1.0", Some("2.0"), ("http://a/b", Some("2.0")))]
    #[case("http://a/b|", None, ("http://a/b", None))]
    fn test_split_canonical(
        #[case] canonical: &str,
        #[case] version: Option<&str>,
        #[case] expected: (&str, Option<&str>),
    ) {
        assert_eq!(split_canonical(canonical, version), expected);
    }

    #[test]
    fn test_resolve_canonical_first_match_wins() {
        let index = index_of(vec![
            (package("a"), row("a.json", None)),
            (package("b"), row("b.json", None)),
        ]);

        let found = index.resolve_canonical(URI, None).unwrap();
        assert_eq!(found.file_name, "a.json");
        assert_eq!(index.candidates(URI, None).len(), 2);
    }

    #[test]
    fn test_resolve_canonical_with_version() {
        let index = index_of(vec![
            (package("a"), row("a.json", Some("1.0.0"))),
            (package("b"), row("b.json", Some("2.0.0"))),
        ]);

        assert_eq!(
            index.resolve_canonical(URI, Some("2.0.0")).unwrap().file_name,
            "b.json"
        );
        assert_eq!(
            index
                .resolve_canonical(&format!("{URI}|2.0.0"), None)
                .unwrap()
                .file_name,
            "b.json"
        );
        assert!(index.resolve_canonical(URI, Some("3.0.0")).is_none());
    }

    #[test]
    fn test_best_candidate_single_match_needs_no_flags() {
        let index = index_of(vec![(package("a"), row("a.json", None))]);
        let best = index.resolve_best_candidate_by_canonical(URI, None).unwrap();
        assert_eq!(best.unwrap().file_name, "a.json");
    }

    #[test]
    fn test_best_candidate_prefers_authoritative() {
        let index = index_of(vec![
            (package("a"), row("a.json", None)),
            (package("b"), row("b.json", None).with_snapshot(true)),
        ]);
        let best = index.resolve_best_candidate_by_canonical(URI, None).unwrap();
        assert_eq!(best.unwrap().file_name, "b.json");
    }

    #[test]
    fn test_best_candidate_none_authoritative() {
        let index = index_of(vec![
            (package("a"), row("a.json", None)),
            (package("b"), row("b.json", None)),
        ]);
        assert_eq!(index.resolve_best_candidate_by_canonical(URI, None).unwrap(), None);
    }

    #[test]
    fn test_best_candidate_conflict() {
        let index = index_of(vec![
            (package("a"), row("a.json", None).with_snapshot(true)),
            (package("b"), row("b.json", None).with_expansion(true)),
        ]);

        let err = index
            .resolve_best_candidate_by_canonical(URI, None)
            .unwrap_err();
        match err {
            PackageError::ConflictingCandidates { canonical, candidates } => {
                assert_eq!(canonical, URI);
                assert_eq!(candidates, vec!["a@1.0.0:a.json", "b@1.0.0:b.json"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_files_of_origin() {
        let index = index_of(vec![
            (PackageOrigin::Project, row("own.json", None)),
            (package("a"), row("a.json", None)),
        ]);
        let own: Vec<&str> = index
            .files_of(&PackageOrigin::Project)
            .map(|entry| entry.file_name.as_str())
            .collect();
        assert_eq!(own, vec!["own.json"]);
    }
}
