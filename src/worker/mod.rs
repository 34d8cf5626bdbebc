//! Check worker pool.
//!
//! Workers receive scheduled checks from the broker's mpsc channels, run
//! them through the executor, then remove the queue entry and release the
//! in-flight claim so the check can be scheduled again later.

pub mod runner;

pub use runner::{CheckExecutor, ExecError};

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::queue::{CheckEnvelope, CheckQueue, InflightRegistry};

/// Spawn one worker task per receiver. Each loop runs until its channel
/// closes (broker dropped on shutdown).
pub fn spawn_workers(
    executor: Arc<CheckExecutor>,
    receivers: Vec<mpsc::Receiver<CheckEnvelope>>,
    queue: Arc<Mutex<CheckQueue>>,
    inflight: Arc<InflightRegistry>,
) -> Vec<JoinHandle<()>> {
    receivers
        .into_iter()
        .enumerate()
        .map(|(worker_id, mut rx)| {
            let executor = executor.clone();
            let queue = queue.clone();
            let inflight = inflight.clone();
            tokio::spawn(async move {
                info!(worker_id, "Worker started");
                while let Some(envelope) = rx.recv().await {
                    let CheckEnvelope { seq, check_id } = envelope;

                    if let Err(err) = executor.execute(&check_id).await {
                        error!(worker_id, seq, check_id, error = %err, "Check execution failed");
                    }

                    if let Err(err) = queue.lock().await.complete(seq) {
                        error!(worker_id, seq, error = %err, "Failed to remove queue entry");
                    }
                    inflight.release(&check_id);
                }
                info!(worker_id, "Worker stopped");
            })
        })
        .collect()
}
