use crate::checker::{CheckerSettings, FetcherConfig};
use crate::humanize::HumanDuration;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub checker: CheckerConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub safebrowsing: SafeBrowsingConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    #[serde(default = "default_queue_path")]
    pub queue_path: PathBuf,
    #[serde(default)]
    pub api: ApiLimits,
}

/// API request limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiLimits {
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
    #[serde(default = "default_max_uris_per_batch")]
    pub max_uris_per_batch: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            ledger_path: default_ledger_path(),
            queue_path: default_queue_path(),
            api: ApiLimits::default(),
        }
    }
}

impl Default for ApiLimits {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload_bytes(),
            max_uris_per_batch: default_max_uris_per_batch(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("data/ledger")
}

fn default_queue_path() -> PathBuf {
    PathBuf::from("data/queue")
}

fn default_max_payload_bytes() -> usize {
    1024 * 1024 // 1 MB
}

fn default_max_uris_per_batch() -> usize {
    250
}

/// Check engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckerConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: HumanDuration,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: HumanDuration,
    /// Maximum redirect hops before the chain counts as broken.
    #[serde(default = "default_hop_limit")]
    pub hop_limit: u32,
    /// Response time above which a page gets a slow-load warning.
    #[serde(default = "default_slow_threshold")]
    pub slow_threshold: HumanDuration,
    #[serde(default = "default_risky_tlds")]
    pub risky_tlds: Vec<String>,
    pub user_agent: Option<String>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            hop_limit: default_hop_limit(),
            slow_threshold: default_slow_threshold(),
            risky_tlds: default_risky_tlds(),
            user_agent: None,
        }
    }
}

impl CheckerConfig {
    pub fn settings(&self) -> CheckerSettings {
        CheckerSettings {
            hop_limit: self.hop_limit,
            slow_threshold: self.slow_threshold.as_duration(),
            risky_tlds: self
                .risky_tlds
                .iter()
                .map(|tld| tld.to_lowercase())
                .collect::<HashSet<_>>(),
        }
    }

    pub fn fetcher(&self) -> FetcherConfig {
        let defaults = FetcherConfig::default();
        FetcherConfig {
            connect_timeout: self.connect_timeout.as_duration(),
            request_timeout: self.request_timeout.as_duration(),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }
}

fn default_connect_timeout() -> HumanDuration {
    HumanDuration::from_millis(5000)
}

fn default_request_timeout() -> HumanDuration {
    HumanDuration::from_millis(5000)
}

fn default_hop_limit() -> u32 {
    20
}

fn default_slow_threshold() -> HumanDuration {
    HumanDuration::from_millis(2500)
}

fn default_risky_tlds() -> Vec<String> {
    ["xxx", "adult", "porn", "sex", "top", "zip"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Worker pool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_count")]
    pub count: usize,
    #[serde(default = "default_channel_size")]
    pub channel_size: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: HumanDuration,
    #[serde(default = "default_webhook_timeout")]
    pub webhook_timeout: HumanDuration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            channel_size: default_channel_size(),
            max_attempts: default_max_attempts(),
            retry_backoff: default_retry_backoff(),
            webhook_timeout: default_webhook_timeout(),
        }
    }
}

fn default_worker_count() -> usize {
    8
}

fn default_channel_size() -> usize {
    100
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff() -> HumanDuration {
    HumanDuration::from_millis(500)
}

fn default_webhook_timeout() -> HumanDuration {
    HumanDuration::from_millis(10_000)
}

/// Safe Browsing lookup configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SafeBrowsingConfig {
    #[serde(default = "default_safebrowsing_endpoint")]
    pub endpoint: String,
    /// API key (loaded from environment, not from config file)
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for SafeBrowsingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_safebrowsing_endpoint(),
            api_key: None,
        }
    }
}

fn default_safebrowsing_endpoint() -> String {
    "https://safebrowsing.googleapis.com/v4/threatMatches:find".to_string()
}

/// Retention configuration. Check TTL must stay comfortably above the
/// largest `checked_within` window clients use, or pruning would discard
/// checks that were still reusable.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    #[serde(default = "default_check_ttl_days")]
    pub check_ttl_days: u32,
    #[serde(default = "default_batch_ttl_days")]
    pub batch_ttl_days: u32,
    #[serde(default = "default_prune_interval")]
    pub prune_interval: HumanDuration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            check_ttl_days: default_check_ttl_days(),
            batch_ttl_days: default_batch_ttl_days(),
            prune_interval: default_prune_interval(),
        }
    }
}

fn default_check_ttl_days() -> u32 {
    30
}

fn default_batch_ttl_days() -> u32 {
    30
}

fn default_prune_interval() -> HumanDuration {
    HumanDuration::from_millis(6 * 3_600_000) // 6 hours
}
