//! Per-package canonical index (`.index.json`)
//!
//! Every installed package carries a list of the indexable documents it
//! contains. The list is produced by an external content parser (see
//! [`MetadataExtractor`]) and cached next to the package contents.

use serde::{Deserialize, Serialize};

use crate::Result;

/// File name of the per-package index, relative to the package root
pub const INDEX_FILE: &str = ".index.json";

/// Index format version written by this crate
pub const INDEX_VERSION: u32 = 2;

/// Metadata about one indexable document in a package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
    /// Path of the document relative to the package root
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Canonical URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Canonical version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default)]
    pub has_snapshot: bool,
    #[serde(default)]
    pub has_expansion: bool,
}

impl ResourceMetadata {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Default::default()
        }
    }

    pub fn with_canonical(mut self, url: impl Into<String>, version: Option<&str>) -> Self {
        self.url = Some(url.into());
        self.version = version.map(str::to_string);
        self
    }

    pub fn with_snapshot(mut self, has_snapshot: bool) -> Self {
        self.has_snapshot = has_snapshot;
        self
    }

    pub fn with_expansion(mut self, has_expansion: bool) -> Self {
        self.has_expansion = has_expansion;
        self
    }

    /// True if the document is an authoritative, fully materialized form
    pub fn is_authoritative(&self) -> bool {
        self.has_snapshot || self.has_expansion
    }
}

/// The `.index.json` document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalIndex {
    #[serde(rename = "index-version")]
    pub index_version: u32,
    #[serde(default)]
    pub files: Vec<ResourceMetadata>,
}

impl CanonicalIndex {
    pub fn new(files: Vec<ResourceMetadata>) -> Self {
        Self {
            index_version: INDEX_VERSION,
            files,
        }
    }

    pub fn from_slice(content: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(content)?)
    }

    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }
}

/// Extracts index metadata from a document's raw content
///
/// Implemented by the content parser that understands the document format.
/// Returning `None` means the file is not indexable.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, file_name: &str, content: &[u8]) -> Option<ResourceMetadata>;
}

impl<F> MetadataExtractor for F
where
    F: Fn(&str, &[u8]) -> Option<ResourceMetadata> + Send + Sync,
{
    fn extract(&self, file_name: &str, content: &[u8]) -> Option<ResourceMetadata> {
        self(file_name, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_index_file() {
        let json = br#"{
            "index-version": 2,
            "files": [
                {
                    "filename": "StructureDefinition-patient.json",
                    "resourceType": "StructureDefinition",
                    "url": "http://acme.org/sd/patient",
                    "version": "1.0.0",
                    "type": "Patient",
                    "hasSnapshot": true
                },
                { "filename": "notes.json" }
            ]
        }"#;

        let index = CanonicalIndex::from_slice(json).unwrap();
        assert_eq!(index.files.len(), 2);
        assert!(index.files[0].is_authoritative());
        assert_eq!(index.files[0].type_name.as_deref(), Some("Patient"));
        assert!(!index.files[1].is_authoritative());
        assert_eq!(index.files[1].url, None);
    }

    #[test]
    fn test_write_index_file() {
        let index = CanonicalIndex::new(vec![ResourceMetadata::new("a.json")
            .with_canonical("http://acme.org/a", None)
            .with_expansion(true)]);

        let json = index.to_json().unwrap();
        assert!(json.contains("\"index-version\": 2"));
        assert!(json.contains("\"hasExpansion\": true"));
        assert!(!json.contains("resourceType"));
        assert_eq!(CanonicalIndex::from_slice(json.as_bytes()).unwrap(), index);
    }

    #[test]
    fn test_closure_as_extractor() {
        let extractor = |name: &str, _: &[u8]| {
            name.ends_with(".json")
                .then(|| ResourceMetadata::new(name))
        };
        assert!(extractor.extract("a.json", b"{}").is_some());
        assert!(extractor.extract("a.txt", b"").is_none());
    }
}
