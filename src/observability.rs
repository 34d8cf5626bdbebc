//! Observability stubs (metrics, tracing)

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording counters/gauges
#[derive(Debug, Default)]
pub struct Metrics {
    batches_accepted: AtomicU64,
    checks_scheduled: AtomicU64,
    checks_completed: AtomicU64,
    checks_fallback: AtomicU64,
    webhooks_delivered: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_accepted(&self) {
        self.batches_accepted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "batches_accepted", "Metric incremented");
    }

    pub fn check_scheduled(&self) {
        self.checks_scheduled.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "checks_scheduled", "Metric incremented");
    }

    pub fn check_completed(&self) {
        self.checks_completed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "checks_completed", "Metric incremented");
    }

    pub fn check_fallback(&self) {
        self.checks_fallback.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "checks_fallback", "Metric incremented");
    }

    pub fn webhook_delivered(&self) {
        self.webhooks_delivered.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "webhooks_delivered", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_accepted: self.batches_accepted.load(Ordering::Relaxed),
            checks_scheduled: self.checks_scheduled.load(Ordering::Relaxed),
            checks_completed: self.checks_completed.load(Ordering::Relaxed),
            checks_fallback: self.checks_fallback.load(Ordering::Relaxed),
            webhooks_delivered: self.webhooks_delivered.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub batches_accepted: u64,
    pub checks_scheduled: u64,
    pub checks_completed: u64,
    pub checks_fallback: u64,
    pub webhooks_delivered: u64,
}
