//! Webhook delivery for completed batches.
//!
//! Delivery is at-most-once: the batch's `webhook_triggered` flag is
//! persisted before the POST is attempted, so a crash or a failed request
//! never causes a duplicate notification.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::models::BatchReport;

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook endpoint returned status {0}")]
    BadStatus(u16),
}

/// Seam for batch-completion notifications.
#[async_trait]
pub trait WebhookSink: Send + Sync {
    async fn deliver(&self, uri: &str, report: &BatchReport) -> Result<(), WebhookError>;
}

/// POSTs the batch report as JSON to the subscriber's endpoint.
pub struct HttpWebhookSink {
    client: reqwest::Client,
}

impl HttpWebhookSink {
    pub fn new(timeout: Duration) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookSink for HttpWebhookSink {
    async fn deliver(&self, uri: &str, report: &BatchReport) -> Result<(), WebhookError> {
        let response = self.client.post(uri).json(report).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(uri, status = status.as_u16(), "Webhook delivery rejected");
            return Err(WebhookError::BadStatus(status.as_u16()));
        }

        info!(uri, batch_id = %report.id, "Webhook delivered");
        Ok(())
    }
}

/// Captures deliveries in memory instead of performing network calls.
/// Used by integration tests to assert exactly-once notification.
#[derive(Default)]
pub struct RecordingSink {
    pub deliveries: std::sync::Mutex<Vec<(String, BatchReport)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<(String, BatchReport)> {
        self.deliveries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl WebhookSink for RecordingSink {
    async fn deliver(&self, uri: &str, report: &BatchReport) -> Result<(), WebhookError> {
        self.deliveries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((uri.to_string(), report.clone()));
        Ok(())
    }
}
