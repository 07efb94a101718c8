//! Registry URL shaping

use canopkg_config::{ProviderKind, RegistryConfig};
use reqwest::Url;

use super::{CatalogQuery, PublishMode};
use crate::reference::{split_scope, PackageReference};

/// Builds the URLs of one registry flavor
pub trait UrlProvider: Send + Sync {
    /// Version listing of a package
    fn listing_url(&self, full_name: &str) -> String;

    /// Archive of one package version
    fn archive_url(&self, reference: &PackageReference) -> String;

    /// Publish endpoint
    fn publish_url(
        &self,
        reference: &PackageReference,
        domain_version: &str,
        mode: PublishMode,
    ) -> String;

    /// Catalog search
    fn catalog_url(&self, query: &CatalogQuery) -> String;
}

/// Provider matching a registry configuration
pub fn provider_for(config: &RegistryConfig) -> Box<dyn UrlProvider> {
    match config.provider {
        ProviderKind::Path => Box::new(PathStyleProvider::new(config.root())),
        ProviderKind::Scoped => Box::new(ScopedPackageProvider::new(
            config.root(),
            config.scope.clone(),
        )),
    }
}

/// Append query parameters, leaving the base untouched when there are none
fn with_params(base: String, params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return base;
    }
    Url::parse_with_params(&base, params)
        .map(String::from)
        .unwrap_or(base)
}

/// Registry addressing packages as `<root>/<name>/<version>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStyleProvider {
    root: String,
}

impl PathStyleProvider {
    pub fn new(root: impl Into<String>) -> Self {
        let root: String = root.into();
        Self {
            root: root.trim_end_matches('/').to_string(),
        }
    }
}

impl UrlProvider for PathStyleProvider {
    fn listing_url(&self, full_name: &str) -> String {
        format!("{}/{}", self.root, full_name)
    }

    fn archive_url(&self, reference: &PackageReference) -> String {
        format!("{}/{}/{}", self.root, reference.full_name(), reference.version)
    }

    fn publish_url(
        &self,
        _reference: &PackageReference,
        domain_version: &str,
        mode: PublishMode,
    ) -> String {
        with_params(
            format!("{}/{}", self.root, domain_version),
            &[("publishMode", mode.to_string())],
        )
    }

    fn catalog_url(&self, query: &CatalogQuery) -> String {
        with_params(format!("{}/catalog", self.root), &query.params())
    }
}

/// npm-style registry with scoped package names
///
/// Listings live at `<root>/@scope%2fname` and archives at
/// `<root>/@scope/name/-/name-<version>.tgz`. Unscoped names get the
/// configured default scope, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedPackageProvider {
    root: String,
    scope: Option<String>,
}

impl ScopedPackageProvider {
    pub fn new(root: impl Into<String>, scope: Option<String>) -> Self {
        let root: String = root.into();
        Self {
            root: root.trim_end_matches('/').to_string(),
            scope: scope.map(|s| s.trim_start_matches('@').to_string()),
        }
    }

    fn scope_for<'a>(&'a self, explicit: Option<&'a str>) -> Option<&'a str> {
        explicit.or(self.scope.as_deref())
    }

    fn encoded_name(&self, scope: Option<&str>, name: &str) -> String {
        match self.scope_for(scope) {
            Some(scope) => format!("@{}%2f{}", scope, name),
            None => name.to_string(),
        }
    }
}

impl UrlProvider for ScopedPackageProvider {
    fn listing_url(&self, full_name: &str) -> String {
        let (scope, name) = split_scope(full_name).unwrap_or((None, full_name));
        format!("{}/{}", self.root, self.encoded_name(scope, name))
    }

    fn archive_url(&self, reference: &PackageReference) -> String {
        let path = match self.scope_for(reference.scope.as_deref()) {
            Some(scope) => format!("@{}/{}", scope, reference.name),
            None => reference.name.clone(),
        };
        format!(
            "{}/{}/-/{}-{}.tgz",
            self.root, path, reference.name, reference.version
        )
    }

    fn publish_url(
        &self,
        reference: &PackageReference,
        domain_version: &str,
        mode: PublishMode,
    ) -> String {
        with_params(
            format!(
                "{}/{}",
                self.root,
                self.encoded_name(reference.scope.as_deref(), &reference.name)
            ),
            &[
                ("domainVersion", domain_version.to_string()),
                ("publishMode", mode.to_string()),
            ],
        )
    }

    fn catalog_url(&self, query: &CatalogQuery) -> String {
        let mut params = query.params();
        if let Some(scope) = &self.scope {
            params.push(("scope", scope.clone()));
        }
        with_params(format!("{}/-/v1/search", self.root), &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_path_style_urls() {
        let provider = PathStyleProvider::new("https://packages.example.org/");
        let reference = PackageReference::new("acme.core", "1.1.0");

        assert_eq!(
            provider.listing_url("acme.core"),
            "https://packages.example.org/acme.core"
        );
        assert_eq!(
            provider.archive_url(&reference),
            "https://packages.example.org/acme.core/1.1.0"
        );
        assert_eq!(
            provider.publish_url(&reference, "4.0.1", PublishMode::New),
            "https://packages.example.org/4.0.1?publishMode=new"
        );
    }

    #[test]
    fn test_path_style_catalog_encodes_params() {
        let provider = PathStyleProvider::new("https://packages.example.org");
        let query = CatalogQuery::new().canonical("http://acme.org/a b");
        assert_eq!(
            provider.catalog_url(&query),
            "https://packages.example.org/catalog?canonical=http%3A%2F%2Facme.org%2Fa+b"
        );
        assert_eq!(
            provider.catalog_url(&CatalogQuery::new()),
            "https://packages.example.org/catalog"
        );
    }

    #[rstest]
    #[case(None, "acme.core", "https://npm.example.org/acme.core")]
    #[case(None, "@acme/core", "https://npm.example.org/@acme%2fcore")]
    #[case(Some("acme"), "core", "https://npm.example.org/@acme%2fcore")]
    #[case(Some("acme"), "@other/core", "https://npm.example.org/@other%2fcore")]
    fn test_scoped_listing_url(
        #[case] scope: Option<&str>,
        #[case] name: &str,
        #[case] expected: &str,
    ) {
        let provider =
            ScopedPackageProvider::new("https://npm.example.org", scope.map(str::to_string));
        assert_eq!(provider.listing_url(name), expected);
    }

    #[test]
    fn test_scoped_archive_url() {
        let provider = ScopedPackageProvider::new("https://npm.example.org", None);
        let reference = PackageReference::scoped("acme", "core", "1.0.0");
        assert_eq!(
            provider.archive_url(&reference),
            "https://npm.example.org/@acme/core/-/core-1.0.0.tgz"
        );

        let plain = PackageReference::new("core", "1.0.0");
        assert_eq!(
            provider.archive_url(&plain),
            "https://npm.example.org/core/-/core-1.0.0.tgz"
        );
    }

    #[test]
    fn test_provider_for_config() {
        let config = RegistryConfig::scoped("https://npm.example.org", Some("@acme".to_string()));
        let provider = provider_for(&config);
        assert_eq!(
            provider.listing_url("core"),
            "https://npm.example.org/@acme%2fcore"
        );
    }
}
