//! Package archive packing and extraction
//!
//! Archives are gzip-compressed tarballs. Every entry lives under the fixed
//! [`PACKAGE_ROOT`] folder and uses forward slashes regardless of the host
//! platform. The manifest sits at `package/package.json`, so it can be read
//! without unpacking the rest of the archive.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::io::Read;
use tar::{Archive, Builder, EntryType, Header};

use crate::canonical_index::INDEX_FILE;
use crate::manifest::PackageManifest;
use crate::{PackageError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Top-level folder of every archive entry
pub const PACKAGE_ROOT: &str = "package";

/// Folder for files that are not structured documents
pub const MISC_FOLDER: &str = "other";

/// Manifest file name inside the package root
pub const MANIFEST_FILE: &str = "package.json";

/// Default compression level for tar.gz (6 = good balance)
const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Gzip magic number (first two bytes)
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Largest entry accepted on extraction
pub const MAX_ENTRY_SIZE: u64 = 256 * 1024 * 1024;

/// Extensions treated as structured documents by the default layout
const DOCUMENT_EXTENSIONS: [&str; 2] = ["json", "xml"];

// ============================================================================
// Entries and layout
// ============================================================================

/// A named byte buffer going into or coming out of an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Relative path, forward slashes
    pub path: String,
    pub content: Vec<u8>,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: normalize_separators(&path.into()),
            content: content.into(),
        }
    }

    /// Last path segment
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Path with the leading package root removed
    pub fn package_path(&self) -> &str {
        strip_root(&self.path)
    }
}

/// Placement policy: maps a source path to its location inside the package root
pub type Placement<'a> = &'a dyn Fn(&str) -> String;

/// Default placement policy
///
/// The manifest, the canonical index and structured documents (`.json`,
/// `.xml`) go directly under the package root; everything else goes under
/// [`MISC_FOLDER`] keeping its relative path.
pub fn organize_to_package_structure(path: &str) -> String {
    let path = normalize_separators(path);
    let relative = strip_root(&path).trim_start_matches("./");
    let file_name = relative.rsplit('/').next().unwrap_or(relative);

    if file_name == MANIFEST_FILE || file_name == INDEX_FILE || is_structured_document(file_name) {
        file_name.to_string()
    } else {
        format!("{}/{}", MISC_FOLDER, relative)
    }
}

fn is_structured_document(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| {
            DOCUMENT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

fn strip_root(path: &str) -> &str {
    path.strip_prefix(PACKAGE_ROOT)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(path)
}

/// Full archive path for a placed entry, rejecting paths that escape the root
fn archive_path(placed: &str) -> Result<String> {
    let placed = normalize_separators(placed);
    let relative = strip_root(placed.trim_start_matches('/'));

    if relative.is_empty()
        || relative
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(PackageError::Archive(format!(
            "invalid entry path '{}'",
            placed
        )));
    }

    Ok(format!("{}/{}", PACKAGE_ROOT, relative))
}

// ============================================================================
// Packing
// ============================================================================

/// Pack a manifest and files using the default layout
pub fn pack(manifest: &PackageManifest, files: &[FileEntry]) -> Result<Vec<u8>> {
    pack_with_layout(manifest, files, &organize_to_package_structure)
}

/// Pack a manifest and files using a caller-supplied placement policy
pub fn pack_with_layout(
    manifest: &PackageManifest,
    files: &[FileEntry],
    placement: Placement<'_>,
) -> Result<Vec<u8>> {
    let manifest_entry = FileEntry::new(MANIFEST_FILE, manifest.to_json()?);
    pack_entries(&manifest_entry, files, placement)
}

/// Pack a raw manifest entry and files
///
/// The manifest is always written to `package/package.json`; the placement
/// policy decides where the other files go inside the package root.
pub fn pack_entries(
    manifest: &FileEntry,
    files: &[FileEntry],
    placement: Placement<'_>,
) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::new(DEFAULT_COMPRESSION_LEVEL));
    let mut builder = Builder::new(encoder);

    append(&mut builder, &archive_path(MANIFEST_FILE)?, &manifest.content)?;
    for file in files {
        let path = archive_path(&placement(&file.path))?;
        append(&mut builder, &path, &file.content)?;
    }

    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

fn append<W: std::io::Write>(builder: &mut Builder<W>, path: &str, content: &[u8]) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    builder.append_data(&mut header, path, content)?;
    Ok(())
}

// ============================================================================
// Extraction
// ============================================================================

/// Check if bytes are gzip-compressed (by magic header)
pub fn is_gzip(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == GZIP_MAGIC[0] && data[1] == GZIP_MAGIC[1]
}

fn open(data: &[u8]) -> Result<Archive<GzDecoder<&[u8]>>> {
    if !is_gzip(data) {
        return Err(PackageError::Archive(
            "invalid gzip format: missing magic header".to_string(),
        ));
    }
    Ok(Archive::new(GzDecoder::new(data)))
}

fn read_content<R: Read>(entry: &mut tar::Entry<'_, R>, path: &str) -> Result<Vec<u8>> {
    let size = entry.size();
    if size > MAX_ENTRY_SIZE {
        return Err(PackageError::Archive(format!(
            "entry '{}' declares {} bytes, limit is {}",
            path, size, MAX_ENTRY_SIZE
        )));
    }
    let mut content = Vec::new();
    entry.read_to_end(&mut content)?;
    Ok(content)
}

/// Extract every regular file, collected in archive order
pub fn unpack(data: &[u8]) -> Result<Vec<FileEntry>> {
    extract_matching(data, |_| true)
}

/// Extract the regular files whose archive path satisfies `predicate`
///
/// Matches are collected in archive order. Content of non-matching entries
/// is skipped, not buffered.
pub fn extract_matching<P>(data: &[u8], mut predicate: P) -> Result<Vec<FileEntry>>
where
    P: FnMut(&str) -> bool,
{
    let mut archive = open(data)?;
    let mut extracted = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        if entry.header().entry_type() != EntryType::Regular {
            continue;
        }
        let path = normalize_separators(&entry.path()?.to_string_lossy());
        if !predicate(&path) {
            continue;
        }
        let content = read_content(&mut entry, &path)?;
        extracted.push(FileEntry { path, content });
    }

    Ok(extracted)
}

/// Extract a single entry by exact archive path, stopping at the first match
pub fn extract_file(data: &[u8], path: &str) -> Result<Option<FileEntry>> {
    let wanted = normalize_separators(path);
    let mut archive = open(data)?;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = normalize_separators(&entry.path()?.to_string_lossy());
        if entry_path == wanted {
            let content = read_content(&mut entry, &entry_path)?;
            return Ok(Some(FileEntry {
                path: entry_path,
                content,
            }));
        }
    }

    Ok(None)
}

/// Read the manifest out of an archive without unpacking the rest
pub fn read_manifest_from_archive(data: &[u8]) -> Result<Option<PackageManifest>> {
    let path = format!("{}/{}", PACKAGE_ROOT, MANIFEST_FILE);
    match extract_file(data, &path)? {
        Some(entry) => Ok(Some(PackageManifest::from_slice(&entry.content)?)),
        None => Ok(None),
    }
}

// ============================================================================
// Content hashing
// ============================================================================

/// A content hash (SHA-256 hex digest)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    /// Compute the SHA-256 hash of the given data
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentHash(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify that the given data matches this hash
    pub fn verify(&self, data: &[u8]) -> bool {
        ContentHash::compute(data) == *self
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("package.json", "package.json")]
    #[case("StructureDefinition-a.json", "StructureDefinition-a.json")]
    #[case("input/profiles/ValueSet-b.XML", "ValueSet-b.XML")]
    #[case(".index.json", ".index.json")]
    #[case("docs/readme.md", "other/docs/readme.md")]
    #[case("docs\\images\\logo.png", "other/docs/images/logo.png")]
    #[case("package/notes.txt", "other/notes.txt")]
    fn test_default_layout(#[case] source: &str, #[case] placed: &str) {
        assert_eq!(organize_to_package_structure(source), placed);
    }

    #[rstest]
    #[case("a.json", "package/a.json")]
    #[case("package/a.json", "package/a.json")]
    #[case("/other/b.txt", "package/other/b.txt")]
    fn test_archive_path(#[case] placed: &str, #[case] expected: &str) {
        assert_eq!(archive_path(placed).unwrap(), expected);
    }

    #[rstest]
    #[case("../escape.json")]
    #[case("other/../../escape.json")]
    #[case("")]
    fn test_archive_path_rejects_escapes(#[case] placed: &str) {
        assert!(archive_path(placed).is_err());
    }

    #[test]
    fn test_pack_places_manifest_first() {
        let manifest = PackageManifest::new("acme.core", "1.0.0");
        let bytes = pack(&manifest, &[FileEntry::new("a.json", "{}")]).unwrap();

        assert!(is_gzip(&bytes));
        let entries = unpack(&bytes).unwrap();
        assert_eq!(entries[0].path, "package/package.json");
        assert_eq!(entries[1].path, "package/a.json");
    }

    #[test]
    fn test_read_manifest_from_archive() {
        let manifest = PackageManifest::new("acme.core", "1.0.0");
        let bytes = pack(&manifest, &[]).unwrap();
        assert_eq!(read_manifest_from_archive(&bytes).unwrap(), Some(manifest));
    }

    #[test]
    fn test_extract_file_missing_entry() {
        let bytes = pack(&PackageManifest::new("a", "1.0.0"), &[]).unwrap();
        assert_eq!(extract_file(&bytes, "package/absent.json").unwrap(), None);
    }

    #[test]
    fn test_unpack_rejects_non_gzip() {
        assert!(unpack(b"plain text").is_err());
    }

    #[test]
    fn test_custom_layout() {
        let manifest = PackageManifest::new("acme.core", "1.0.0");
        let flat = |path: &str| format!("flat/{}", path.replace('/', "_"));
        let bytes = pack_with_layout(
            &manifest,
            &[FileEntry::new("docs/readme.md", "hi")],
            &flat,
        )
        .unwrap();

        let paths: Vec<String> = unpack(&bytes).unwrap().into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec!["package/package.json", "package/flat/docs_readme.md"]);
    }

    fn oversized_archive() -> Vec<u8> {
        let mut header = Header::new_gnu();
        header.set_path("package/package.json").unwrap();
        header.set_entry_type(EntryType::Regular);
        header.set_size(1 << 50);
        header.set_cksum();

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        std::io::Write::write_all(&mut encoder, header.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_oversized_entry_is_rejected() {
        let bytes = oversized_archive();
        assert!(matches!(unpack(&bytes), Err(PackageError::Archive(_))));
        assert!(matches!(
            read_manifest_from_archive(&bytes),
            Err(PackageError::Archive(_))
        ));
    }

    #[test]
    fn test_content_hash() {
        let hash = ContentHash::compute(b"abc");
        assert_eq!(
            hash.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(hash.verify(b"abc"));
        assert!(!hash.verify(b"abd"));
    }
}
