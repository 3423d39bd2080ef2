//! Registry metadata lookup.
//!
//! The registry speaks the npm document format:
//!
//! ```json
//! {
//!     "dist-tags": { "latest": "1.0.0" },
//!     "versions": { "1.0.0": { "dist": { "tarball": "https://repobox.io/art.tgz" } } }
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::http::{HttpClient, HttpError};

/// Dist-tag resolved when none is given
pub const LATEST_TAG: &str = "latest";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Got {status} from server: {reason}")]
    Status { status: u16, reason: String },

    #[error("Response payload from server was invalid: {0}")]
    InvalidPayload(String),

    #[error("Response payload from server was invalid: missing {0}")]
    MissingKey(String),

    #[error("Registry request failed: {0}")]
    Transport(#[source] HttpError),
}

impl From<HttpError> for RegistryError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::HttpStatus { status, reason, .. } => RegistryError::Status { status, reason },
            other => RegistryError::Transport(other),
        }
    }
}

/// Package document returned by `GET /npm/<package>`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryMetadata {
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: HashMap<String, String>,

    #[serde(default)]
    pub versions: HashMap<String, VersionDescriptor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionDescriptor {
    #[serde(default)]
    pub dist: Option<DistInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DistInfo {
    #[serde(default)]
    pub tarball: Option<String>,
}

/// A dist-tag resolved to a concrete version and artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
    pub version: String,
    pub tarball: String,
}

impl RegistryMetadata {
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        serde_json::from_str(json).map_err(|e| RegistryError::InvalidPayload(e.to_string()))
    }

    /// `versions[dist-tags[tag]].dist.tarball`
    pub fn resolve(&self, tag: &str) -> Result<ResolvedPackage, RegistryError> {
        let version = self
            .dist_tags
            .get(tag)
            .ok_or_else(|| RegistryError::MissingKey(format!("dist-tags.{}", tag)))?;

        let tarball = self
            .versions
            .get(version)
            .ok_or_else(|| RegistryError::MissingKey(format!("versions[\"{}\"]", version)))?
            .dist
            .as_ref()
            .and_then(|dist| dist.tarball.as_deref())
            .ok_or_else(|| RegistryError::MissingKey(format!("versions[\"{}\"].dist.tarball", version)))?;

        Ok(ResolvedPackage {
            version: version.clone(),
            tarball: tarball.to_string(),
        })
    }
}

/// Registry client
pub struct Registry {
    http_client: Arc<HttpClient>,
    base_url: String,
}

impl Registry {
    pub fn new(http_client: Arc<HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Metadata endpoint for a package
    pub fn metadata_url(&self, package: &str) -> String {
        format!("{}/npm/{}", self.base_url.trim_end_matches('/'), package)
    }

    pub async fn fetch_metadata(&self, package: &str) -> Result<RegistryMetadata, RegistryError> {
        let url = self.metadata_url(package);
        log::debug!("Fetching registry metadata from {}", url);

        let body = self.http_client.get_text(&url).await?;
        RegistryMetadata::from_json(&body)
    }

    /// Resolve the `latest` dist-tag of `package`
    pub async fn resolve(&self, package: &str) -> Result<ResolvedPackage, RegistryError> {
        self.resolve_tag(package, LATEST_TAG).await
    }

    pub async fn resolve_tag(&self, package: &str, tag: &str) -> Result<ResolvedPackage, RegistryError> {
        let metadata = self.fetch_metadata(package).await?;
        let resolved = metadata.resolve(tag)?;
        log::debug!("{}@{} resolved to {} ({})", package, tag, resolved.version, resolved.tarball);
        Ok(resolved)
    }
}
