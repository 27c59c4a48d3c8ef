//! HTTP client for the remote stream catalog
//!
//! The catalog is a single JSON document, `GET {base_url}/data.json`, holding
//! an array of `{id, name, url, image}` entries.
//!
//! # Example
//!
//! ```no_run
//! use radiocatalog::{HttpStreamCatalog, StreamCatalog};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = HttpStreamCatalog::builder()
//!         .base_url("http://nielsmasdorp.com:8000/nederadio")
//!         .build()?;
//!
//!     for stream in catalog.fetch_streams().await? {
//!         println!("{} -> {}", stream.title, stream.url);
//!     }
//!     Ok(())
//! }
//! ```

use crate::error::{Error, Result};
use crate::models::{Stream, StreamResponse};
use crate::source::StreamCatalog;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default catalog base URL
pub const DEFAULT_BASE_URL: &str = "http://nielsmasdorp.com:8000/nederadio";

/// Default timeout for HTTP requests (60 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = "nederadio/0.1 (radiocatalog)";

/// Name of the catalog document under the base URL
pub const CATALOG_DOCUMENT: &str = "data.json";

/// Remote catalog over HTTP
///
/// The client is stateless and does not cache responses; the
/// [`crate::StreamRepository`] holds the last snapshot.
#[derive(Debug, Clone)]
pub struct HttpStreamCatalog {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpStreamCatalog {
    /// Builder with the default endpoint, timeout and user agent
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Wraps an already configured `reqwest::Client`
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of the catalog document
    pub fn catalog_url(&self) -> Result<Url> {
        let base = if self.base_url.ends_with('/') {
            self.base_url.clone()
        } else {
            format!("{}/", self.base_url)
        };
        Ok(Url::parse(&base)?.join(CATALOG_DOCUMENT)?)
    }

    /// Fetches the raw catalog entries
    pub async fn fetch_catalog(&self) -> Result<Vec<StreamResponse>> {
        let url = self.catalog_url()?;
        debug!(url = %url, "Fetching stream catalog");

        let response = self.client.get(url).timeout(self.timeout).send().await?;

        let status = response.status();
        debug!(status = status.as_u16(), "Catalog response");
        if !status.is_success() {
            return Err(Error::Status(status.as_u16()));
        }

        // Lecture en texte puis parsing : les champs inconnus sont ignorés
        let body = response.text().await?;
        let entries: Vec<StreamResponse> = serde_json::from_str(&body)?;
        Ok(entries)
    }
}

#[async_trait]
impl StreamCatalog for HttpStreamCatalog {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_streams(&self) -> Result<Vec<Stream>> {
        Ok(self
            .fetch_catalog()
            .await?
            .into_iter()
            .map(StreamResponse::into_stream)
            .collect())
    }
}

/// Builder for configuring an [`HttpStreamCatalog`]
#[derive(Debug)]
pub struct ClientBuilder {
    client: Option<Client>,
    base_url: String,
    timeout: Duration,
    user_agent: String,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            client: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuses an existing HTTP client (its own settings win)
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> Result<HttpStreamCatalog> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .user_agent(&self.user_agent)
                .timeout(self.timeout)
                .build()?,
        };

        Ok(HttpStreamCatalog {
            client,
            base_url: self.base_url,
            timeout: self.timeout,
        })
    }
}
