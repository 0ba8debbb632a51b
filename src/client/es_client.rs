//! es_client.rs
//!
//! Minimal client for indexing single documents into Elasticsearch over its
//! REST API (`POST /{index}/_doc`).
//!
//! Assumptions:
//! - One document per request; no bulk API.
//! - Basic auth is sent only when a username is configured.
//! - No per-request timeout unless one is set with `with_timeout_secs`.
//!
//! Example:
//! ```ignore
//! use crate::client::es_client::EsClient;
//! use crate::client::store::Store;
//!
//! let client = EsClient::new(&cfg)?;
//! client.insert("my-index", &Document::now("hello", "tool")).await?;
//! ```

use std::time::Duration;

use reqwest::Url;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;

use crate::client::store::{InsertError, Store};
use crate::config::StoreConfig;
use crate::transform::document::Document;

/// Address used when the config does not name one.
pub const DEFAULT_ES_HOST: &str = "http://localhost:9200";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("http error")]
    Http(#[from] reqwest::Error),

    #[error("invalid store address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },
}

/// Elasticsearch document writer. Cheap to share behind an `Arc`.
pub struct EsClient {
    http: reqwest::Client,
    /// Base URL of the cluster (e.g., http://localhost:9200).
    base_url: Url,
    username: String,
    password: String,
}

impl EsClient {
    /// Create a client from the effective store config.
    ///
    /// - An empty `es_host` falls back to `DEFAULT_ES_HOST`.
    /// - The address must be an absolute `http` or `https` URL.
    pub fn new(cfg: &StoreConfig) -> Result<Self, ClientError> {
        let address = if cfg.es_host.trim().is_empty() {
            DEFAULT_ES_HOST
        } else {
            cfg.es_host.trim()
        };
        let base_url = parse_base_url(address)?;
        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            http,
            base_url,
            username: cfg.username.clone(),
            password: cfg.password.clone(),
        })
    }

    /// Set a per-request timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Result<Self, ClientError> {
        self.http = reqwest::Client::builder()
            .timeout(Duration::from_secs(secs))
            .build()?;
        Ok(self)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the document URL for `index` (POST).
    fn doc_url(&self, index: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(index).push("_doc");
        }
        url
    }
}

impl Store for EsClient {
    async fn insert(&self, index: &str, doc: &Document) -> Result<(), InsertError> {
        let body = serde_json::to_vec(doc)?;

        let mut req = self
            .http
            .post(self.doc_url(index))
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if !self.username.is_empty() {
            req = req.basic_auth(&self.username, Some(&self.password));
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(InsertError::Status { status, body });
        }
        Ok(())
    }
}

fn parse_base_url(address: &str) -> Result<Url, ClientError> {
    let invalid = |reason: String| ClientError::InvalidAddress {
        address: address.to_string(),
        reason,
    };

    let url = Url::parse(address).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    }
    if url.cannot_be_a_base() {
        return Err(invalid("not a base URL".to_string()));
    }
    Ok(url)
}
