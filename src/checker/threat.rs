//! Threat-intelligence lookup (Google Safe Browsing v4).
//!
//! The lookup is advisory: a match adds a warning to the report, and any
//! failure to reach the service is treated as "no signal" rather than a
//! check error. The engine consumes the [`ThreatLookup`] trait so tests can
//! script matches without network access.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// One match returned by the threat service.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreatMatch {
    #[serde(rename = "threatType")]
    pub threat_type: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    matches: Vec<ThreatMatch>,
}

#[async_trait]
pub trait ThreatLookup: Send + Sync {
    /// Return the threat matches for a URL. Implementations fail open:
    /// lookup failures come back as an empty match list.
    async fn matches(&self, url: &Url) -> Vec<ThreatMatch>;
}

/// Disabled lookup, used when no API key is configured.
pub struct NoThreatLookup;

#[async_trait]
impl ThreatLookup for NoThreatLookup {
    async fn matches(&self, _url: &Url) -> Vec<ThreatMatch> {
        Vec::new()
    }
}

/// Safe Browsing v4 `threatMatches:find` client.
pub struct SafeBrowsingClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl SafeBrowsingClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, super::fetcher::FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| super::fetcher::FetchError::Other(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    async fn lookup(&self, url: &Url) -> Result<Vec<ThreatMatch>, reqwest::Error> {
        let body = json!({
            "client": {
                "clientId": "linkaudit",
                "clientVersion": env!("CARGO_PKG_VERSION"),
            },
            "threatInfo": {
                "threatTypes": [
                    "MALWARE",
                    "SOCIAL_ENGINEERING",
                    "UNWANTED_SOFTWARE",
                    "POTENTIALLY_HARMFUL_APPLICATION",
                ],
                "platformTypes": ["ANY_PLATFORM"],
                "threatEntryTypes": ["URL"],
                "threatEntries": [{ "url": url.as_str() }],
            },
        });

        let response = self
            .client
            .post(format!("{}?key={}", self.endpoint, self.api_key))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: LookupResponse = response.json().await?;
        Ok(parsed.matches)
    }
}

#[async_trait]
impl ThreatLookup for SafeBrowsingClient {
    async fn matches(&self, url: &Url) -> Vec<ThreatMatch> {
        match self.lookup(url).await {
            Ok(matches) => {
                if !matches.is_empty() {
                    debug!(url = %url, count = matches.len(), "Threat lookup matched");
                }
                matches
            }
            Err(error) => {
                // Advisory signal only: a failed lookup never blocks the check.
                warn!(url = %url, %error, "Threat lookup failed, treating as no signal");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_lookup_returns_no_matches() {
        let lookup = NoThreatLookup;
        let url = Url::parse("https://example.org/").unwrap();
        assert!(lookup.matches(&url).await.is_empty());
    }

    #[test]
    fn lookup_response_parses_matches() {
        let body = r#"{"matches":[{"threatType":"MALWARE","platformType":"ANY_PLATFORM"}]}"#;
        let parsed: LookupResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.matches.len(), 1);
        assert_eq!(parsed.matches[0].threat_type, "MALWARE");
    }

    #[test]
    fn lookup_response_tolerates_empty_body() {
        let parsed: LookupResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.matches.is_empty());
    }
}
