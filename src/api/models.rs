use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{Batch, Check};

fn default_checked_within() -> u64 {
    86_400
}

/// Request payload for POST /batch.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBatchRequest {
    pub uris: Vec<String>,
    /// Freshness window in seconds. A completed check younger than this is
    /// reused instead of scheduling a new one.
    #[serde(default = "default_checked_within")]
    pub checked_within: u64,
    #[serde(default)]
    pub webhook_uri: Option<String>,
}

/// Client-facing rollup of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Ok,
    Broken,
    Caution,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    pub uri: String,
    pub status: LinkStatus,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub checked: Option<DateTime<Utc>>,
    pub errors: BTreeMap<String, Vec<String>>,
    pub warnings: BTreeMap<String, Vec<String>>,
    pub problem_summary: Option<String>,
    pub suggested_fix: Option<String>,
}

impl From<&Check> for CheckReport {
    fn from(check: &Check) -> Self {
        let status = if !check.is_completed() {
            LinkStatus::Pending
        } else if !check.link_errors.is_empty() {
            LinkStatus::Broken
        } else if !check.link_warnings.is_empty() {
            LinkStatus::Caution
        } else {
            LinkStatus::Ok
        };

        Self {
            uri: check.uri.clone(),
            status,
            checked: check.completed_at,
            errors: check.link_errors.clone(),
            warnings: check.link_warnings.clone(),
            problem_summary: check.problem_summary.clone(),
            suggested_fix: check.suggested_fix.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    InProgress,
    Completed,
}

/// Client-facing snapshot of a batch and its member checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub id: String,
    pub status: BatchStatus,
    pub total: usize,
    pub completed: usize,
    pub links: Vec<CheckReport>,
}

impl BatchReport {
    /// Assemble a snapshot from the batch record and its checks, in the
    /// batch's submission order.
    pub fn assemble(batch: &Batch, checks: &[Check]) -> Self {
        let completed = checks.iter().filter(|c| c.is_completed()).count();
        let status = if completed == checks.len() {
            BatchStatus::Completed
        } else {
            BatchStatus::InProgress
        };

        Self {
            id: batch.id.clone(),
            status,
            total: checks.len(),
            completed,
            links: checks.iter().map(CheckReport::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub ledger: String,
    pub queue: String,
    pub version: &'static str,
}
