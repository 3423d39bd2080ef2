//! Scheme-specific transports.
//!
//! Each URL scheme the installer can fetch from maps to one [`Transport`].
//! The table is built once when the client is created; requests look their
//! transport up by scheme instead of branching on strings at call sites.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{redirect, Client, ClientBuilder, Response};
use url::Url;

use super::client::{HttpClientConfig, HttpError};

/// Issues a single GET request. Redirects are never followed here.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url, headers: HeaderMap) -> Result<Response, HttpError>;
}

/// `reqwest` backed transport
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Transport for `http://` URLs
    pub fn plain(config: &HttpClientConfig) -> Result<Self, HttpError> {
        let client = Self::builder(config).build()?;
        Ok(Self { client })
    }

    /// Transport for `https://` URLs; refuses to speak plain HTTP
    pub fn tls(config: &HttpClientConfig) -> Result<Self, HttpError> {
        let client = Self::builder(config).https_only(true).build()?;
        Ok(Self { client })
    }

    fn builder(config: &HttpClientConfig) -> ClientBuilder {
        Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .redirect(redirect::Policy::none())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &Url, headers: HeaderMap) -> Result<Response, HttpError> {
        let response = self
            .client
            .get(url.clone())
            .headers(headers)
            .send()
            .await?;
        Ok(response)
    }
}

/// Scheme → transport lookup table
#[derive(Clone, Default)]
pub struct TransportTable {
    transports: HashMap<String, Arc<dyn Transport>>,
}

impl TransportTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// `http` and `https` backed by `reqwest`
    pub fn standard(config: &HttpClientConfig) -> Result<Self, HttpError> {
        let mut table = Self::new();
        table.register("http", Arc::new(ReqwestTransport::plain(config)?));
        table.register("https", Arc::new(ReqwestTransport::tls(config)?));
        Ok(table)
    }

    pub fn register(&mut self, scheme: &str, transport: Arc<dyn Transport>) {
        self.transports.insert(scheme.to_lowercase(), transport);
    }

    pub fn for_url(&self, url: &Url) -> Result<&dyn Transport, HttpError> {
        self.transports
            .get(url.scheme())
            .map(|transport| transport.as_ref())
            .ok_or_else(|| HttpError::UnsupportedScheme {
                scheme: url.scheme().to_string(),
                url: url.to_string(),
            })
    }

    /// Registered schemes, sorted
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.transports.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }
}

impl std::fmt::Debug for TransportTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportTable")
            .field("schemes", &self.schemes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_has_http_and_https() {
        let table = TransportTable::standard(&HttpClientConfig::default()).unwrap();
        assert_eq!(table.schemes(), vec!["http", "https"]);
    }

    #[test]
    fn test_lookup_by_scheme() {
        let table = TransportTable::standard(&HttpClientConfig::default()).unwrap();

        assert!(table.for_url(&Url::parse("https://repobox.io/a").unwrap()).is_ok());
        assert!(table.for_url(&Url::parse("http://repobox.io/a").unwrap()).is_ok());
    }

    #[test]
    fn test_unsupported_scheme() {
        let table = TransportTable::standard(&HttpClientConfig::default()).unwrap();
        let url = Url::parse("ftp://repobox.io/art.tgz").unwrap();

        match table.for_url(&url) {
            Err(HttpError::UnsupportedScheme { scheme, .. }) => assert_eq!(scheme, "ftp"),
            Err(other) => panic!("Expected UnsupportedScheme, got {:?}", other),
            Ok(_) => panic!("Expected UnsupportedScheme, got a transport"),
        }
    }

    #[test]
    fn test_empty_table_rejects_everything() {
        let table = TransportTable::new();
        assert!(table.schemes().is_empty());
        assert!(table.for_url(&Url::parse("https://repobox.io").unwrap()).is_err());
    }
}
