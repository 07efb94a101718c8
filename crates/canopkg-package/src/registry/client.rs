//! HTTP registry client

use std::time::Duration;

use canopkg_config::RegistryConfig;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use super::provider::{provider_for, UrlProvider};
use super::{
    parse_catalog, CatalogEntry, CatalogQuery, PackageListing, PackageRegistry, PublishMode,
    PublishResult,
};
use crate::reference::PackageReference;
use crate::version::Versions;
use crate::{PackageError, Result};

const USER_AGENT: &str = concat!("canopkg/", env!("CARGO_PKG_VERSION"));

/// Registry client over blocking HTTP
pub struct HttpRegistryClient {
    client: Client,
    provider: Box<dyn UrlProvider>,
    auth_token: Option<String>,
}

impl HttpRegistryClient {
    /// Build a client from a registry configuration
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PackageError::Registry(format!("failed to create client: {}", e)))?;

        Ok(Self {
            client,
            provider: provider_for(config),
            auth_token: config.auth_token.clone(),
        })
    }

    /// Build a client with an explicit URL provider and default settings
    pub fn with_provider(provider: Box<dyn UrlProvider>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PackageError::Registry(format!("failed to create client: {}", e)))?;

        Ok(Self {
            client,
            provider,
            auth_token: None,
        })
    }

    pub fn provider(&self) -> &dyn UrlProvider {
        self.provider.as_ref()
    }

    /// GET a URL, returning the body of a successful response
    fn fetch(&self, url: &str) -> Option<Vec<u8>> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = match request.send() {
            Ok(response) => response,
            Err(e) => {
                let reason = if e.is_timeout() {
                    "request timed out"
                } else if e.is_connect() {
                    "connection failed"
                } else {
                    "request failed"
                };
                warn!(url, error = %e, "{}", reason);
                return None;
            }
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(url, "not found");
            return None;
        }
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "registry returned an error status");
            return None;
        }

        match response.bytes() {
            Ok(body) => Some(body.to_vec()),
            Err(e) => {
                warn!(url, error = %e, "failed to read response body");
                None
            }
        }
    }
}

impl PackageRegistry for HttpRegistryClient {
    fn get_versions(&self, full_name: &str) -> Versions {
        let url = self.provider.listing_url(full_name);
        let Some(body) = self.fetch(&url) else {
            return Versions::new();
        };

        match PackageListing::from_slice(&body) {
            Ok(listing) => {
                let versions = listing.versions();
                debug!(
                    package = full_name,
                    count = versions.len(),
                    latest = listing.latest_tag(),
                    "fetched version listing"
                );
                versions
            }
            Err(e) => {
                warn!(package = full_name, error = %e, "malformed version listing");
                Versions::new()
            }
        }
    }

    fn get_package(&self, reference: &PackageReference) -> Option<Vec<u8>> {
        let url = self.provider.archive_url(reference);
        let body = self.fetch(&url)?;
        info!(package = %reference, bytes = body.len(), "downloaded package");
        Some(body)
    }

    fn catalog(&self, query: &CatalogQuery) -> Option<Vec<CatalogEntry>> {
        let url = self.provider.catalog_url(query);
        let body = self.fetch(&url)?;
        let entries = parse_catalog(&body);
        if entries.is_none() {
            warn!(url, "malformed catalog response");
        }
        entries
    }

    fn publish(
        &self,
        reference: &PackageReference,
        domain_version: &str,
        archive: &[u8],
        mode: PublishMode,
    ) -> PublishResult {
        let url = self.provider.publish_url(reference, domain_version, mode);
        let mut request = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/gzip")
            .body(archive.to_vec());
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        match request.send() {
            Ok(response) => publish_result(reference, response),
            Err(e) => {
                warn!(package = %reference, error = %e, "publish request failed");
                PublishResult::rejected(None, e.to_string())
            }
        }
    }
}

fn publish_result(reference: &PackageReference, response: Response) -> PublishResult {
    let status = response.status();
    let message = response.text().unwrap_or_default();
    if status.is_success() {
        info!(package = %reference, "published package");
        PublishResult::accepted(status.as_u16(), message)
    } else {
        warn!(package = %reference, status = status.as_u16(), "publish rejected");
        PublishResult::rejected(Some(status.as_u16()), message)
    }
}
