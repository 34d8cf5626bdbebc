//! Check executor - runs individual scheduled checks against the engine.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::checker::LinkChecker;
use crate::ledger::{LedgerError, LinkStore};
use crate::observability::Metrics;
use crate::orchestrator::BatchCompletion;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

pub type Result<T> = std::result::Result<T, ExecError>;

/// Executes one check at a time: evaluate the URI, persist the findings,
/// and fan completion out to every batch that references the check.
///
/// Execution is idempotent. A check that is already complete (a reused
/// check, or a redelivered queue entry) skips straight to settlement, and
/// terminal report fields are never rewritten.
pub struct CheckExecutor {
    store: LinkStore,
    checker: Arc<LinkChecker>,
    completion: Arc<BatchCompletion>,
    metrics: Arc<Metrics>,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl CheckExecutor {
    pub fn new(
        store: LinkStore,
        checker: Arc<LinkChecker>,
        completion: Arc<BatchCompletion>,
        metrics: Arc<Metrics>,
        max_attempts: u32,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            store,
            checker,
            completion,
            metrics,
            max_attempts,
            retry_backoff,
        }
    }

    /// Run a check to a terminal state. Transient failures are retried with
    /// exponential backoff; once attempts are exhausted the check completes
    /// with a fixed degraded report so batches always make progress.
    pub async fn execute(&self, check_id: &str) -> Result<()> {
        self.execute_with(check_id, || self.attempt(check_id)).await
    }

    /// Retry loop over one attempt seam. Kept separate from [`Self::attempt`]
    /// so the exhaustion path can be driven without a failing store.
    async fn execute_with<F, Fut>(&self, check_id: &str, mut attempt: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        for attempt_no in 1..=self.max_attempts {
            match attempt().await {
                Ok(()) => return Ok(()),
                Err(err) if attempt_no < self.max_attempts => {
                    let backoff = self.retry_backoff * 2u32.pow(attempt_no - 1);
                    warn!(
                        check_id,
                        attempt = attempt_no,
                        error = %err,
                        backoff_ms = backoff.as_millis() as u64,
                        "Check attempt failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => {
                    error!(check_id, error = %err, "Check attempts exhausted");
                    self.complete_with_fallback(check_id).await?;
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    async fn attempt(&self, check_id: &str) -> Result<()> {
        let Some(mut check) = self.store.get_check(check_id)? else {
            warn!(check_id, "Scheduled check no longer exists");
            return Ok(());
        };

        if check.is_completed() {
            // Redelivered or reused entry: nothing to evaluate, but batches
            // referencing it may still be waiting.
            return self.settle(check_id).await;
        }

        if check.started_at.is_none() {
            check.started_at = Some(Utc::now());
            self.store.put_check(&check)?;
        }

        info!(check_id, uri = %check.uri, "Running check");
        let report = self.checker.check(&check.uri).await;

        check.apply_report(report, Utc::now());
        self.store.put_check(&check)?;
        self.metrics.check_completed();
        info!(check_id, uri = %check.uri, "Check completed");

        self.settle(check_id).await
    }

    /// Terminal degraded report when execution could not finish.
    async fn complete_with_fallback(&self, check_id: &str) -> Result<()> {
        let Some(mut check) = self.store.get_check(check_id)? else {
            return Ok(());
        };
        if !check.is_completed() {
            check.apply_fallback(Utc::now());
            self.store.put_check(&check)?;
            self.metrics.check_fallback();
            warn!(check_id, uri = %check.uri, "Check completed with fallback report");
        }
        self.settle(check_id).await
    }

    async fn settle(&self, check_id: &str) -> Result<()> {
        self.completion.settle_check(check_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::{
        CheckerSettings, FetchError, HeadOutcome, NoThreatLookup, UrlFetcher,
    };
    use crate::model::{Batch, Check, Link};
    use crate::webhook::RecordingSink;
    use async_trait::async_trait;
    use tempfile::TempDir;
    use url::Url;

    struct AlwaysOk;

    #[async_trait]
    impl UrlFetcher for AlwaysOk {
        async fn head(&self, _url: &Url) -> std::result::Result<HeadOutcome, FetchError> {
            Ok(HeadOutcome {
                status: 200,
                location: None,
                content_type: Some("text/plain".to_string()),
            })
        }

        async fn get_body(&self, _url: &Url) -> std::result::Result<String, FetchError> {
            Ok(String::new())
        }
    }

    fn executor(tmp: &TempDir, sink: Arc<RecordingSink>) -> (CheckExecutor, LinkStore) {
        let store = LinkStore::open(tmp.path().join("ledger")).unwrap();
        let metrics = Arc::new(Metrics::new());
        let checker = Arc::new(LinkChecker::new(
            Arc::new(AlwaysOk),
            Arc::new(NoThreatLookup),
            CheckerSettings::default(),
        ));
        let completion = Arc::new(BatchCompletion::new(
            store.clone(),
            sink,
            metrics.clone(),
        ));
        let exec = CheckExecutor::new(
            store.clone(),
            checker,
            completion,
            metrics,
            3,
            Duration::from_millis(1),
        );
        (exec, store)
    }

    fn seed(store: &LinkStore, webhook: Option<&str>) -> (Check, Batch) {
        let link = Link::new("https://example.org/");
        let check = Check::new(&link);
        let batch = Batch::new(vec![check.id.clone()], webhook.map(String::from));
        store.commit_batch(&[link], &[check.clone()], &batch).unwrap();
        (check, batch)
    }

    #[tokio::test]
    async fn execute_completes_a_pending_check() {
        let tmp = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink::new());
        let (exec, store) = executor(&tmp, sink);
        let (check, _batch) = seed(&store, None);

        exec.execute(&check.id).await.unwrap();

        let done = store.get_check(&check.id).unwrap().unwrap();
        assert!(done.is_completed());
        assert!(done.started_at.is_some());
        assert!(done.link_errors.is_empty());
    }

    #[tokio::test]
    async fn execute_notifies_webhook_on_batch_completion() {
        let tmp = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink::new());
        let (exec, store) = executor(&tmp, sink.clone());
        let (check, batch) = seed(&store, Some("https://hook.example/done"));

        exec.execute(&check.id).await.unwrap();

        let deliveries = sink.delivered();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].1.id, batch.id);
    }

    #[tokio::test]
    async fn redelivery_of_a_completed_check_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink::new());
        let (exec, store) = executor(&tmp, sink.clone());
        let (check, _batch) = seed(&store, Some("https://hook.example/done"));

        exec.execute(&check.id).await.unwrap();
        let first = store.get_check(&check.id).unwrap().unwrap();

        exec.execute(&check.id).await.unwrap();
        let second = store.get_check(&check.id).unwrap().unwrap();

        assert_eq!(first.completed_at, second.completed_at);
        assert_eq!(sink.delivered().len(), 1);
    }

    #[tokio::test]
    async fn missing_check_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink::new());
        let (exec, _store) = executor(&tmp, sink);
        exec.execute("no-such-check").await.unwrap();
    }

    fn transient_error() -> ExecError {
        ExecError::Ledger(LedgerError::CheckNotFound("transient".to_string()))
    }

    #[tokio::test]
    async fn exhausted_retries_complete_with_degraded_report() {
        let tmp = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink::new());
        let (exec, store) = executor(&tmp, sink.clone());
        let (check, batch) = seed(&store, Some("https://hook.example/done"));

        exec.execute_with(&check.id, || async { Err(transient_error()) })
            .await
            .unwrap();

        let done = store.get_check(&check.id).unwrap().unwrap();
        assert!(done.is_completed());
        assert!(done.link_errors.is_empty());
        assert!(done.link_warnings.contains_key("Could not complete the check."));
        assert_eq!(done.problem_summary.as_deref(), Some("Check failed"));
        assert_eq!(
            done.suggested_fix.as_deref(),
            Some("Speak to your system administrator.")
        );

        // The batch still settles and its subscriber is notified.
        let deliveries = sink.delivered();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].1.id, batch.id);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_before_falling_back() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let tmp = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink::new());
        let (exec, store) = executor(&tmp, sink.clone());
        let (check, _batch) = seed(&store, Some("https://hook.example/done"));

        // First two attempts fail, the third runs for real.
        let failures = AtomicU32::new(2);
        let exec_ref = &exec;
        let check_id = check.id.as_str();
        exec_ref
            .execute_with(check_id, || {
                let fail = failures.load(Ordering::SeqCst) > 0;
                if fail {
                    failures.fetch_sub(1, Ordering::SeqCst);
                }
                async move {
                    if fail {
                        Err(transient_error())
                    } else {
                        exec_ref.attempt(check_id).await
                    }
                }
            })
            .await
            .unwrap();

        let done = store.get_check(&check.id).unwrap().unwrap();
        assert!(done.is_completed());
        assert!(done.link_warnings.is_empty());
        assert!(done.problem_summary.is_none());
        assert_eq!(sink.delivered().len(), 1);
    }
}
