//! HTTP client for registry and artifact requests.
//!
//! This module wraps the scheme [`TransportTable`] with the installer's
//! request policy:
//! - A fixed `User-Agent` on every request
//! - A bearer credential attached only when the request targets the trusted
//!   registry host, re-checked on every redirect hop
//! - Redirects followed whenever a `Location` header is present, regardless
//!   of status code, up to a configurable number of hops
//! - Connect and request timeouts
//!
//! # Examples
//!
//! ```no_run
//! use gravity_pm::config::BearerCredential;
//! use gravity_pm::http::{HttpClient, HttpClientConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HttpClientConfig::new()
//!     .with_timeout(Duration::from_secs(60))
//!     .with_max_redirects(3);
//!
//! let client = HttpClient::with_config(config)?
//!     .with_credential(BearerCredential::for_registry("https://repobox.io", "license-key")?);
//!
//! let response = client.get("https://repobox.io/npm/@compy/gravity-lite").await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```

use hyper::ext::ReasonPhrase;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, LOCATION, USER_AGENT};
use reqwest::Response;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::transport::TransportTable;
use crate::config::{authority_of, BearerCredential};

const DEFAULT_USER_AGENT: &str = concat!("GravityInstaller/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_REDIRECTS: usize = 5;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status} {reason}: {url}")]
    HttpStatus {
        status: u16,
        reason: String,
        url: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Too many redirects (more than {limit}) for {url}")]
    TooManyRedirects { limit: usize, url: String },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported URL scheme '{scheme}' in {url}")]
    UnsupportedScheme { scheme: String, url: String },

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),
}

pub struct HttpClient {
    transports: TransportTable,
    user_agent: String,
    max_redirects: usize,
    credential: Option<BearerCredential>,
}

impl HttpClient {
    pub fn new() -> Result<Self, HttpError> {
        Self::with_config(HttpClientConfig::default())
    }

    pub fn with_config(config: HttpClientConfig) -> Result<Self, HttpError> {
        let transports = TransportTable::standard(&config)?;
        Ok(Self::with_transports(config, transports))
    }

    /// Build a client over a caller-supplied transport table
    pub fn with_transports(config: HttpClientConfig, transports: TransportTable) -> Self {
        Self {
            transports,
            user_agent: config.user_agent,
            max_redirects: config.max_redirects,
            credential: config.credential,
        }
    }

    /// Set the bearer credential for the trusted host
    pub fn with_credential(mut self, credential: BearerCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Headers for a request to `url`.
    ///
    /// `Authorization` is present only if `url`'s authority is the trusted one.
    pub fn headers_for(&self, url: &Url) -> Result<HeaderMap, HttpError> {
        let mut headers = HeaderMap::new();

        let user_agent = HeaderValue::from_str(&self.user_agent)
            .map_err(|e| HttpError::InvalidHeader(format!("User-Agent: {}", e)))?;
        headers.insert(USER_AGENT, user_agent);

        if let Some(credential) = self.credential.as_ref().filter(|c| c.applies_to(url)) {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", credential.token()))
                .map_err(|_| HttpError::InvalidHeader("Authorization: license key is not a valid header value".to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    /// GET `url`, following redirects, and return the first 2xx response.
    ///
    /// A response with a `Location` header is followed whatever its status.
    /// Any other non-2xx response ends the chain with [`HttpError::HttpStatus`].
    pub async fn get(&self, url: &str) -> Result<Response, HttpError> {
        let mut current = parse_url(url)?;
        let mut hops = 0;

        loop {
            let transport = self.transports.for_url(&current)?;
            let headers = self.headers_for(&current)?;

            log::debug!(
                "GET {} (scheme {}, host {}, authorized: {})",
                current,
                current.scheme(),
                authority_of(&current).unwrap_or_default(),
                headers.contains_key(AUTHORIZATION)
            );

            let response = transport.get(&current, headers).await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if let Some(location) = response.headers().get(LOCATION) {
                let location = location.to_str().map_err(|e| HttpError::InvalidUrl {
                    url: current.to_string(),
                    reason: format!("unreadable Location header: {}", e),
                })?;

                let next = current.join(location).map_err(|e| HttpError::InvalidUrl {
                    url: location.to_string(),
                    reason: e.to_string(),
                })?;

                hops += 1;
                if hops > self.max_redirects {
                    return Err(HttpError::TooManyRedirects {
                        limit: self.max_redirects,
                        url: url.to_string(),
                    });
                }

                log::debug!("{} redirected to {} ({}/{})", current, next, hops, self.max_redirects);
                current = next;
                continue;
            }

            return Err(HttpError::HttpStatus {
                status: status.as_u16(),
                reason: reason_phrase(&response),
                url: current.to_string(),
            });
        }
    }

    /// GET `url` and return the whole body as text
    pub async fn get_text(&self, url: &str) -> Result<String, HttpError> {
        let response = self.get(url).await?;
        Ok(response.text().await?)
    }

    /// Get the configured user agent
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }

    pub fn credential(&self) -> Option<&BearerCredential> {
        self.credential.as_ref()
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("transports", &self.transports)
            .field("user_agent", &self.user_agent)
            .field("max_redirects", &self.max_redirects)
            .field("credential", &self.credential)
            .finish()
    }
}

/// Reason phrase as sent by the server, else the canonical one for the status
fn reason_phrase(response: &Response) -> String {
    response
        .extensions()
        .get::<ReasonPhrase>()
        .map(|phrase| String::from_utf8_lossy(phrase.as_bytes()).into_owned())
        .or_else(|| response.status().canonical_reason().map(str::to_string))
        .unwrap_or_else(|| "Unknown Status".to_string())
}

fn parse_url(url: &str) -> Result<Url, HttpError> {
    Url::parse(url).map_err(|e| HttpError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_redirects: usize,
    pub user_agent: String,
    pub credential: Option<BearerCredential>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            credential: None,
        }
    }
}

impl HttpClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_credential(mut self, credential: BearerCredential) -> Self {
        self.credential = Some(credential);
        self
    }
}
