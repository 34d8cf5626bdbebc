//! HTTP fetch seam for the check engine.
//!
//! The engine talks to the network through [`UrlFetcher`] so that redirect
//! resolution can be exercised against scripted responses in tests. The
//! production implementation wraps reqwest with automatic redirects disabled;
//! the engine follows redirects itself so it can detect cycles and count hops.

use async_trait::async_trait;
use reqwest::{Client, redirect};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Transport-level failures, classified the way the engine reports them.
/// HTTP status codes are not errors here; they arrive in [`HeadOutcome`].
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("TLS failure: {0}")]
    Tls(String),

    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Other(String),
}

/// What a HEAD request came back with.
#[derive(Debug, Clone)]
pub struct HeadOutcome {
    pub status: u16,
    pub location: Option<String>,
    pub content_type: Option<String>,
}

impl HeadOutcome {
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.starts_with("text/html"))
            .unwrap_or(false)
    }
}

#[async_trait]
pub trait UrlFetcher: Send + Sync {
    /// Issue a single HEAD request without following redirects.
    async fn head(&self, url: &Url) -> Result<HeadOutcome, FetchError>;

    /// Fetch the response body with GET (HEAD has no body to sniff).
    async fn get_body(&self, url: &Url) -> Result<String, FetchError>;
}

/// Fetcher configuration.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
            user_agent: format!("linkaudit/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Production fetcher backed by reqwest.
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| FetchError::Other(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl UrlFetcher for ReqwestFetcher {
    async fn head(&self, url: &Url) -> Result<HeadOutcome, FetchError> {
        let response = self
            .client
            .head(url.as_str())
            .send()
            .await
            .map_err(classify)?;

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        Ok(HeadOutcome {
            status: response.status().as_u16(),
            location,
            content_type,
        })
    }

    async fn get_body(&self, url: &Url) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(classify)?;

        response
            .text()
            .await
            .map_err(|e| FetchError::Other(e.to_string()))
    }
}

/// Map a reqwest error onto the engine's transport taxonomy.
fn classify(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        return FetchError::Timeout;
    }
    if is_tls(&error) {
        return FetchError::Tls(error.to_string());
    }
    if error.is_connect() || error.is_request() {
        return FetchError::Connect(error.to_string());
    }
    FetchError::Other(error.to_string())
}

/// TLS failures surface as connect errors; walk the source chain to tell
/// certificate problems apart from plain connection refusals.
fn is_tls(error: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(error);
    while let Some(inner) = source {
        let text = inner.to_string();
        if text.contains("certificate")
            || text.contains("handshake")
            || text.to_lowercase().contains("tls")
            || text.to_lowercase().contains("ssl")
        {
            return true;
        }
        source = inner.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_outcome_html_detection() {
        let outcome = HeadOutcome {
            status: 200,
            location: None,
            content_type: Some("text/html; charset=utf-8".to_string()),
        };
        assert!(outcome.is_html());

        let outcome = HeadOutcome {
            status: 200,
            location: None,
            content_type: Some("application/pdf".to_string()),
        };
        assert!(!outcome.is_html());

        let outcome = HeadOutcome {
            status: 200,
            location: None,
            content_type: None,
        };
        assert!(!outcome.is_html());
    }

    #[test]
    fn fetcher_config_defaults() {
        let config = FetcherConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert!(config.user_agent.starts_with("linkaudit/"));
    }
}
