use crate::queue::store::{CheckQueue, QueueError};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

/// CheckEnvelope wraps a scheduled check with its queue sequence number.
#[derive(Clone, Debug)]
pub struct CheckEnvelope {
    pub seq: u64,
    pub check_id: String,
}

/// Tracks checks that are currently scheduled or executing. At most one
/// queue entry exists per check at any time; a second schedule request for
/// the same check collapses into the entry already in flight.
#[derive(Default)]
pub struct InflightRegistry {
    inner: std::sync::Mutex<HashSet<String>>,
}

impl InflightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a check for execution. Returns false if it is already in flight.
    pub fn try_acquire(&self, check_id: &str) -> bool {
        let mut set = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        set.insert(check_id.to_string())
    }

    /// Release a check after its execution finishes.
    pub fn release(&self, check_id: &str) {
        let mut set = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(check_id);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// CheckBroker distributes scheduled checks to the worker pool.
///
/// Flow:
/// 1. Orchestrator calls `broker.schedule(check_id)`
/// 2. Broker claims the check in the in-flight registry (dedup)
/// 3. Broker persists the task to CheckQueue (atomic, get seq)
/// 4. Broker sends CheckEnvelope{seq, check_id} to a worker via mpsc
/// 5. Round-robin distribution, backpressure via bounded channels
///
/// The broker is not a separate task, just a struct with methods called by
/// the orchestrator. Distribution is synchronous via mpsc::send().
pub struct CheckBroker {
    queue: Arc<Mutex<CheckQueue>>,
    inflight: Arc<InflightRegistry>,
    worker_channels: Vec<mpsc::Sender<CheckEnvelope>>,
    next_worker: AtomicUsize,
}

impl CheckBroker {
    /// Create a new CheckBroker with worker channels.
    ///
    /// Returns the broker plus one receiver per worker, for spawning the
    /// worker loops.
    pub fn new(
        queue: Arc<Mutex<CheckQueue>>,
        inflight: Arc<InflightRegistry>,
        num_workers: usize,
        channel_size: usize,
    ) -> (Self, Vec<mpsc::Receiver<CheckEnvelope>>) {
        info!(
            num_workers,
            channel_size, "Creating CheckBroker with worker channels"
        );

        let mut worker_channels = Vec::with_capacity(num_workers);
        let mut worker_receivers = Vec::with_capacity(num_workers);

        for worker_id in 0..num_workers {
            let (tx, rx) = mpsc::channel(channel_size);
            worker_channels.push(tx);
            worker_receivers.push(rx);
            debug!(worker_id, "Created worker channel");
        }

        let broker = Self {
            queue,
            inflight,
            worker_channels,
            next_worker: AtomicUsize::new(0),
        };

        (broker, worker_receivers)
    }

    /// Schedule a check for execution: claim, persist, distribute.
    ///
    /// Returns `Ok(None)` when the check is already in flight and the
    /// request collapsed into the existing queue entry.
    pub async fn schedule(&self, check_id: &str) -> Result<Option<u64>, QueueError> {
        if !self.inflight.try_acquire(check_id) {
            debug!(check_id, "Check already in flight, collapsing");
            return Ok(None);
        }

        // Persist to Fjall before handing to a worker
        let seq = {
            let queue = self.queue.lock().await;
            queue.enqueue(check_id)?
        };

        debug!(seq, check_id, "Check persisted to queue");

        let envelope = CheckEnvelope {
            seq,
            check_id: check_id.to_string(),
        };

        let worker_idx =
            self.next_worker.fetch_add(1, Ordering::Relaxed) % self.worker_channels.len();

        // Bounded channel, may block if full = backpressure
        match self.worker_channels[worker_idx].send(envelope).await {
            Ok(_) => {
                debug!(seq, worker_idx, "Check sent to worker");
                Ok(Some(seq))
            }
            Err(_) => {
                // Worker is dead but the task is already persisted; the
                // pending scan at startup will re-dispatch it. The claim is
                // given back so a later schedule is not collapsed against a
                // worker that will never run it.
                self.inflight.release(check_id);
                warn!(seq, worker_idx, "Worker channel closed, check not delivered");
                Ok(Some(seq))
            }
        }
    }

    /// Get number of active workers
    pub fn num_workers(&self) -> usize {
        self.worker_channels.len()
    }

    /// Check if all worker channels are healthy (not closed)
    pub fn health_check(&self) -> bool {
        self.worker_channels.iter().all(|ch| !ch.is_closed())
    }
}
