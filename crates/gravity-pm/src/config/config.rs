use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Registry the installer talks to unless the config file says otherwise.
pub const DEFAULT_REGISTRY_URL: &str = "https://repobox.io";

/// Package holding the application skeleton.
pub const DEFAULT_PACKAGE: &str = "@compy/gravity-lite";

/// Contents of the per-user `gravity.json` file.
///
/// Keys the installer does not know about are kept in `extra` so that
/// rewriting the file (e.g. after storing a license key) does not drop them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GravityConfig {
    /// License key sent as a bearer credential to the registry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_key: Option<String>,

    /// Base URL of the registry (scheme, host and optional port)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_url: Option<String>,

    /// Package identifier to scaffold from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GravityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored license key, if one is set and non-empty.
    pub fn license_key(&self) -> Option<&str> {
        self.license_key.as_deref().filter(|key| !key.is_empty())
    }

    pub fn registry_url(&self) -> &str {
        self.registry_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_REGISTRY_URL)
    }

    pub fn package(&self) -> &str {
        self.package
            .as_deref()
            .filter(|package| !package.is_empty())
            .unwrap_or(DEFAULT_PACKAGE)
    }

    /// Return a copy of this config with the license key replaced.
    pub fn with_license_key(mut self, key: impl Into<String>) -> Self {
        self.license_key = Some(key.into());
        self
    }
}
