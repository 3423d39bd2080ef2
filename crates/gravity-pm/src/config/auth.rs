use url::Url;

use crate::error::{GravityError, Result};

/// License key bound to the one host it may be sent to.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerCredential {
    authority: String,
    token: String,
}

impl BearerCredential {
    /// Bind `token` to the authority of `registry_url`.
    pub fn for_registry(registry_url: &str, token: impl Into<String>) -> Result<Self> {
        let url = Url::parse(registry_url).map_err(|e| {
            GravityError::Config(format!("Invalid registry URL {}: {}", registry_url, e))
        })?;

        let authority = authority_of(&url).ok_or_else(|| {
            GravityError::Config(format!("Registry URL {} has no host", registry_url))
        })?;

        Ok(Self {
            authority,
            token: token.into(),
        })
    }

    /// Trusted `host[:port]`
    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Whether a request to `url` may carry this credential.
    pub fn applies_to(&self, url: &Url) -> bool {
        authority_of(url).is_some_and(|authority| authority == self.authority)
    }
}

// The token never shows up in logs or panics.
impl std::fmt::Debug for BearerCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerCredential")
            .field("authority", &self.authority)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// `host[:port]` of a URL, lower-cased. Default ports are omitted by `url`.
pub fn authority_of(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}
