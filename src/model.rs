//! Domain records persisted in the ledger.
//!
//! - **Link**: a normalized URL identity, created lazily and never mutated.
//! - **Check**: one evaluation of a Link. Complete iff `completed_at` is set;
//!   once complete, its report fields are never rewritten.
//! - **Batch**: a client-visible snapshot over a fixed set of Checks, mutated
//!   only when `webhook_triggered` flips false → true.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;
use uuid::Uuid;

use crate::checker::Report;

/// Canonical form of a URL used as Link identity. Unparseable input keeps
/// its trimmed raw form; the check for it will report `Invalid URL`.
pub fn normalize_uri(raw: &str) -> String {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(url) => url.to_string(),
        Err(_) => trimmed.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub uri: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}

impl Link {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            uri: uri.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Check {
    pub id: String,
    pub link_id: String,
    pub uri: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub link_errors: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub link_warnings: BTreeMap<String, Vec<String>>,
    pub problem_summary: Option<String>,
    pub suggested_fix: Option<String>,
}

impl Check {
    pub fn new(link: &Link) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            link_id: link.id.clone(),
            uri: link.uri.clone(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            link_errors: BTreeMap::new(),
            link_warnings: BTreeMap::new(),
            problem_summary: None,
            suggested_fix: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Fresh enough to reuse: completed within the window ending now.
    pub fn completed_within(&self, window: Duration, now: DateTime<Utc>) -> bool {
        self.completed_at
            .map(|at| now - at <= window)
            .unwrap_or(false)
    }

    /// Write the engine's findings and close the check. Terminal fields are
    /// written exactly once.
    pub fn apply_report(&mut self, report: Report, now: DateTime<Utc>) {
        self.link_errors = report.errors;
        self.link_warnings = report.warnings;
        self.problem_summary = report.problem_summary;
        self.suggested_fix = report.suggested_fix;
        self.completed_at = Some(now);
    }

    /// Terminal state for a check whose execution retries are exhausted.
    /// Guarantees forward progress: the check still completes, with a fixed
    /// degraded report.
    pub fn apply_fallback(&mut self, now: DateTime<Utc>) {
        self.link_errors = BTreeMap::new();
        self.link_warnings = BTreeMap::from([(
            "Could not complete the check.".to_string(),
            vec!["The link check could not be completed.".to_string()],
        )]);
        self.problem_summary = Some("Check failed".to_string());
        self.suggested_fix = Some("Speak to your system administrator.".to_string());
        self.completed_at = Some(now);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    pub check_ids: Vec<String>,
    pub webhook_uri: Option<String>,
    #[serde(default)]
    pub webhook_triggered: bool,
}

impl Batch {
    pub fn new(check_ids: Vec<String>, webhook_uri: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            created_at: Utc::now(),
            check_ids,
            webhook_uri,
            webhook_triggered: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_uri_canonicalizes() {
        assert_eq!(
            normalize_uri("  https://example.org  "),
            "https://example.org/"
        );
        assert_eq!(normalize_uri("not a url"), "not a url");
    }

    #[test]
    fn check_completion_states() {
        let link = Link::new("https://example.org/");
        let mut check = Check::new(&link);
        assert!(!check.is_completed());

        let now = Utc::now();
        check.apply_report(Report::new(), now);
        assert!(check.is_completed());
        assert!(check.completed_within(Duration::hours(24), now));
        assert!(!check.completed_within(Duration::seconds(1), now + Duration::hours(1)));
    }

    #[test]
    fn fallback_report_shape() {
        let link = Link::new("https://example.org/");
        let mut check = Check::new(&link);
        check.apply_fallback(Utc::now());

        assert!(check.is_completed());
        assert!(check.link_errors.is_empty());
        assert_eq!(check.link_warnings.len(), 1);
        assert!(check.link_warnings.contains_key("Could not complete the check."));
        assert_eq!(check.problem_summary.as_deref(), Some("Check failed"));
        assert_eq!(
            check.suggested_fix.as_deref(),
            Some("Speak to your system administrator.")
        );
    }

    #[test]
    fn check_serializes_timestamps_as_seconds() {
        let link = Link::new("https://example.org/");
        let check = Check::new(&link);
        let value = serde_json::to_value(&check).unwrap();
        assert!(value["created_at"].is_i64());
        assert!(value["started_at"].is_null());
    }

    #[test]
    fn batch_defaults() {
        let batch = Batch::new(vec!["c1".to_string()], None);
        assert!(!batch.webhook_triggered);
        assert!(batch.webhook_uri.is_none());
        assert_eq!(batch.check_ids.len(), 1);
    }
}
