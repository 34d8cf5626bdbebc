//! Batch submission and completion orchestration.
//!
//! Submission deduplicates URIs against the ledger's freshness window and
//! commits everything a batch introduces in one atomic write, so clients
//! never observe a partial batch. Completion is evaluated under a single
//! lock, which makes the webhook decision for a batch serialized and the
//! notification at-most-once.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::models::BatchReport;
use crate::ledger::{LedgerError, LinkStore};
use crate::model::{Batch, Check, Link, normalize_uri};
use crate::observability::Metrics;
use crate::queue::{CheckBroker, QueueError};
use crate::webhook::WebhookSink;

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("A batch must contain at least one URI")]
    NoUris,

    #[error("Too many URIs in batch: {count} exceeds limit of {limit}")]
    TooManyUris { count: usize, limit: usize },

    #[error("checked_within must be greater than zero")]
    InvalidWindow,

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Result of a batch submission.
#[derive(Debug)]
pub struct SubmitOutcome {
    pub batch: Batch,
    /// True when every member check was already complete at submission time
    /// and the batch finished synchronously.
    pub completed: bool,
}

pub struct SubmitRequest {
    pub uris: Vec<String>,
    pub checked_within_secs: u64,
    pub webhook_uri: Option<String>,
}

pub struct Orchestrator {
    store: LinkStore,
    broker: Arc<CheckBroker>,
    completion: Arc<BatchCompletion>,
    metrics: Arc<Metrics>,
    max_uris: usize,
}

impl Orchestrator {
    pub fn new(
        store: LinkStore,
        broker: Arc<CheckBroker>,
        completion: Arc<BatchCompletion>,
        metrics: Arc<Metrics>,
        max_uris: usize,
    ) -> Self {
        Self {
            store,
            broker,
            completion,
            metrics,
            max_uris,
        }
    }

    /// Submit a batch of URIs for checking.
    ///
    /// Each URI resolves to its Link (created if unseen), and each Link to a
    /// Check: the newest existing check is reused when it is still pending
    /// or completed within the freshness window, otherwise a fresh check is
    /// created and scheduled.
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitOutcome, SubmitError> {
        if request.uris.is_empty() {
            return Err(SubmitError::NoUris);
        }
        if request.uris.len() > self.max_uris {
            return Err(SubmitError::TooManyUris {
                count: request.uris.len(),
                limit: self.max_uris,
            });
        }
        if request.checked_within_secs == 0 {
            return Err(SubmitError::InvalidWindow);
        }

        let window = Duration::seconds(request.checked_within_secs as i64);
        let now = Utc::now();

        // Duplicate URIs inside one batch collapse to a single check,
        // keeping first-occurrence order.
        let mut seen = HashSet::new();
        let uris: Vec<String> = request
            .uris
            .iter()
            .map(|raw| normalize_uri(raw))
            .filter(|uri| seen.insert(uri.clone()))
            .collect();

        let mut new_links = Vec::new();
        let mut new_checks = Vec::new();
        let mut member_checks = Vec::new();

        for uri in &uris {
            let link = match self.store.get_link(uri)? {
                Some(link) => link,
                None => {
                    let link = Link::new(uri.clone());
                    new_links.push(link.clone());
                    link
                }
            };

            let reusable = self
                .store
                .latest_check_for_link(&link.id)?
                .filter(|check| !check.is_completed() || check.completed_within(window, now));

            let check = match reusable {
                Some(check) => {
                    debug!(uri, check_id = %check.id, "Reusing existing check");
                    check
                }
                None => {
                    let check = Check::new(&link);
                    new_checks.push(check.clone());
                    check
                }
            };
            member_checks.push(check);
        }

        let check_ids = member_checks.iter().map(|c| c.id.clone()).collect();
        let batch = Batch::new(check_ids, request.webhook_uri);

        self.store.commit_batch(&new_links, &new_checks, &batch)?;
        self.metrics.batch_accepted();

        let completed = member_checks.iter().all(|c| c.is_completed());
        if completed {
            info!(batch_id = %batch.id, "Batch completed synchronously");
        } else {
            // Schedule every unfinished member; the broker collapses checks
            // that are already in flight.
            for check in member_checks.iter().filter(|c| !c.is_completed()) {
                if self.broker.schedule(&check.id).await?.is_some() {
                    self.metrics.check_scheduled();
                }
            }

            info!(
                batch_id = %batch.id,
                uris = uris.len(),
                new_checks = new_checks.len(),
                "Batch accepted"
            );
        }

        // A reused check can reach its terminal state between the freshness
        // read and the commit, in which case its settlement ran before this
        // batch's reverse index existed. Settle once more now that it does;
        // a batch with pending members is left untouched.
        self.completion.settle_batch(&batch.id).await?;

        Ok(SubmitOutcome { batch, completed })
    }

    /// Assemble the client-facing snapshot for a batch.
    pub fn report(&self, batch: &Batch) -> Result<BatchReport, LedgerError> {
        batch_report(&self.store, batch)
    }
}

/// Load a batch's member checks and assemble its report.
pub fn batch_report(store: &LinkStore, batch: &Batch) -> Result<BatchReport, LedgerError> {
    let mut checks = Vec::with_capacity(batch.check_ids.len());
    for check_id in &batch.check_ids {
        let check = store
            .get_check(check_id)?
            .ok_or_else(|| LedgerError::CheckNotFound(check_id.clone()))?;
        checks.push(check);
    }
    Ok(BatchReport::assemble(batch, &checks))
}

/// Evaluates batch completion and fires webhooks.
///
/// All settlement runs under one lock, so two checks finishing at the same
/// time cannot both decide to notify the same batch. The `webhook_triggered`
/// flag is persisted before delivery is attempted.
pub struct BatchCompletion {
    store: LinkStore,
    webhooks: Arc<dyn WebhookSink>,
    lock: Mutex<()>,
    metrics: Arc<Metrics>,
}

impl BatchCompletion {
    pub fn new(store: LinkStore, webhooks: Arc<dyn WebhookSink>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            webhooks,
            lock: Mutex::new(()),
            metrics,
        }
    }

    /// Settle every batch that references the given check. Called by the
    /// worker after a check reaches a terminal state.
    pub async fn settle_check(&self, check_id: &str) -> Result<(), LedgerError> {
        let batches = self.store.batches_for_check(check_id)?;
        for batch in batches {
            self.settle_batch(&batch.id).await?;
        }
        Ok(())
    }

    /// Settle a single batch: if complete and subscribed, notify once.
    pub async fn settle_batch(&self, batch_id: &str) -> Result<(), LedgerError> {
        let _guard = self.lock.lock().await;

        // Reload under the lock; another settlement may have run since.
        let Some(mut batch) = self.store.get_batch(batch_id)? else {
            return Ok(());
        };

        if batch.webhook_uri.is_none() || batch.webhook_triggered {
            return Ok(());
        }
        if !self.store.all_checks_complete(&batch)? {
            return Ok(());
        }

        // Mark before delivering: a crash or failed POST must not lead to a
        // second notification.
        batch.webhook_triggered = true;
        self.store.put_batch(&batch)?;
        self.store.persist()?;

        let report = batch_report(&self.store, &batch)?;
        let uri = batch.webhook_uri.as_deref().unwrap_or_default();
        match self.webhooks.deliver(uri, &report).await {
            Ok(()) => self.metrics.webhook_delivered(),
            Err(err) => {
                warn!(batch_id = %batch.id, error = %err, "Webhook delivery failed");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{CheckEnvelope, CheckQueue, InflightRegistry};
    use crate::webhook::RecordingSink;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    struct Harness {
        orchestrator: Orchestrator,
        store: LinkStore,
        receivers: Vec<mpsc::Receiver<CheckEnvelope>>,
        sink: Arc<RecordingSink>,
        _tmp: TempDir,
    }

    fn harness() -> Harness {
        let tmp = TempDir::new().unwrap();
        let store = LinkStore::open(tmp.path().join("ledger")).unwrap();
        let queue = Arc::new(Mutex::new(
            CheckQueue::open(tmp.path().join("queue")).unwrap(),
        ));
        let inflight = Arc::new(InflightRegistry::new());
        let (broker, receivers) = CheckBroker::new(queue, inflight, 1, 16);
        let metrics = Arc::new(Metrics::new());
        let sink = Arc::new(RecordingSink::new());
        let completion = Arc::new(BatchCompletion::new(
            store.clone(),
            sink.clone(),
            metrics.clone(),
        ));
        let orchestrator =
            Orchestrator::new(store.clone(), Arc::new(broker), completion, metrics, 100);
        Harness {
            orchestrator,
            store,
            receivers,
            sink,
            _tmp: tmp,
        }
    }

    fn request(uris: &[&str]) -> SubmitRequest {
        SubmitRequest {
            uris: uris.iter().map(|s| s.to_string()).collect(),
            checked_within_secs: 86_400,
            webhook_uri: None,
        }
    }

    #[tokio::test]
    async fn rejects_empty_batch() {
        let h = harness();
        let err = h.orchestrator.submit(request(&[])).await.unwrap_err();
        assert!(matches!(err, SubmitError::NoUris));
    }

    #[tokio::test]
    async fn rejects_zero_window() {
        let h = harness();
        let err = h
            .orchestrator
            .submit(SubmitRequest {
                uris: vec!["https://example.org".to_string()],
                checked_within_secs: 0,
                webhook_uri: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::InvalidWindow));
    }

    #[tokio::test]
    async fn rejects_oversized_batch() {
        let tmp = TempDir::new().unwrap();
        let store = LinkStore::open(tmp.path().join("ledger")).unwrap();
        let queue = Arc::new(Mutex::new(
            CheckQueue::open(tmp.path().join("queue")).unwrap(),
        ));
        let (broker, _rx) = CheckBroker::new(queue, Arc::new(InflightRegistry::new()), 1, 16);
        let metrics = Arc::new(Metrics::new());
        let completion = Arc::new(BatchCompletion::new(
            store.clone(),
            Arc::new(RecordingSink::new()),
            metrics.clone(),
        ));
        let orchestrator = Orchestrator::new(store, Arc::new(broker), completion, metrics, 2);

        let err = orchestrator
            .submit(request(&["https://a.example", "https://b.example", "https://c.example"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::TooManyUris { count: 3, limit: 2 }));
    }

    #[tokio::test]
    async fn new_uris_create_pending_checks_and_schedule() {
        let mut h = harness();

        let outcome = h
            .orchestrator
            .submit(request(&["https://example.org", "https://other.example"]))
            .await
            .unwrap();

        assert!(!outcome.completed);
        assert_eq!(outcome.batch.check_ids.len(), 2);

        let report = h.orchestrator.report(&outcome.batch).unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.completed, 0);

        // Both checks were handed to the worker channel.
        let e1 = h.receivers[0].recv().await.unwrap();
        let e2 = h.receivers[0].recv().await.unwrap();
        let mut scheduled = vec![e1.check_id, e2.check_id];
        scheduled.sort();
        let mut expected = outcome.batch.check_ids.clone();
        expected.sort();
        assert_eq!(scheduled, expected);
    }

    #[tokio::test]
    async fn duplicate_uris_collapse_within_a_batch() {
        let h = harness();

        let outcome = h
            .orchestrator
            .submit(request(&[
                "https://example.org",
                "https://example.org/",
                "  https://example.org  ",
            ]))
            .await
            .unwrap();

        assert_eq!(outcome.batch.check_ids.len(), 1);
    }

    #[tokio::test]
    async fn resubmission_reuses_in_flight_check_without_rescheduling() {
        let mut h = harness();

        let first = h.orchestrator.submit(request(&["https://example.org"])).await.unwrap();
        let second = h.orchestrator.submit(request(&["https://example.org"])).await.unwrap();

        assert_eq!(first.batch.check_ids, second.batch.check_ids);

        // Only one envelope was ever delivered.
        let envelope = h.receivers[0].recv().await.unwrap();
        assert_eq!(envelope.check_id, first.batch.check_ids[0]);
        assert!(h.receivers[0].try_recv().is_err());
    }

    #[tokio::test]
    async fn fresh_completed_check_finishes_batch_synchronously() {
        let h = harness();

        let first = h.orchestrator.submit(request(&["https://example.org"])).await.unwrap();
        let check_id = first.batch.check_ids[0].clone();

        let mut check = h.store.get_check(&check_id).unwrap().unwrap();
        check.apply_report(crate::checker::Report::new(), Utc::now());
        h.store.put_check(&check).unwrap();

        let second = h.orchestrator.submit(request(&["https://example.org"])).await.unwrap();
        assert!(second.completed);
        assert_eq!(second.batch.check_ids, vec![check_id]);

        let report = h.orchestrator.report(&second.batch).unwrap();
        assert!(matches!(report.status, crate::api::models::BatchStatus::Completed));
    }

    #[tokio::test]
    async fn stale_completed_check_gets_a_fresh_check() {
        let h = harness();

        let first = h.orchestrator.submit(request(&["https://example.org"])).await.unwrap();
        let check_id = first.batch.check_ids[0].clone();

        let mut check = h.store.get_check(&check_id).unwrap().unwrap();
        check.apply_report(crate::checker::Report::new(), Utc::now() - Duration::hours(48));
        h.store.put_check(&check).unwrap();

        let second = h.orchestrator.submit(request(&["https://example.org"])).await.unwrap();
        assert!(!second.completed);
        assert_ne!(second.batch.check_ids, vec![check_id]);
    }

    #[tokio::test]
    async fn synchronous_completion_fires_webhook_once() {
        let h = harness();

        let first = h.orchestrator.submit(request(&["https://example.org"])).await.unwrap();
        let check_id = first.batch.check_ids[0].clone();
        let mut check = h.store.get_check(&check_id).unwrap().unwrap();
        check.apply_report(crate::checker::Report::new(), Utc::now());
        h.store.put_check(&check).unwrap();

        let outcome = h
            .orchestrator
            .submit(SubmitRequest {
                uris: vec!["https://example.org".to_string()],
                checked_within_secs: 86_400,
                webhook_uri: Some("https://hook.example/notify".to_string()),
            })
            .await
            .unwrap();
        assert!(outcome.completed);

        let deliveries = h.sink.delivered();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].0, "https://hook.example/notify");
        assert_eq!(deliveries[0].1.id, outcome.batch.id);

        let stored = h.store.get_batch(&outcome.batch.id).unwrap().unwrap();
        assert!(stored.webhook_triggered);
    }

    #[tokio::test]
    async fn settle_batch_is_idempotent() {
        let h = harness();

        let first = h.orchestrator.submit(request(&["https://example.org"])).await.unwrap();
        let check_id = first.batch.check_ids[0].clone();
        let mut check = h.store.get_check(&check_id).unwrap().unwrap();
        check.apply_report(crate::checker::Report::new(), Utc::now());
        h.store.put_check(&check).unwrap();

        let outcome = h
            .orchestrator
            .submit(SubmitRequest {
                uris: vec!["https://example.org".to_string()],
                checked_within_secs: 86_400,
                webhook_uri: Some("https://hook.example/notify".to_string()),
            })
            .await
            .unwrap();

        let metrics = Arc::new(Metrics::new());
        let completion = BatchCompletion::new(h.store.clone(), h.sink.clone(), metrics);
        completion.settle_batch(&outcome.batch.id).await.unwrap();
        completion.settle_check(&check_id).await.unwrap();

        assert_eq!(h.sink.delivered().len(), 1);
    }
}
