use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("Task not found: seq={0}")]
    TaskNotFound(u64),

    #[error("Corrupt task entry at seq={0}")]
    CorruptTask(u64),
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// CheckQueue persists pending check executions using Fjall.
///
/// Architecture:
/// - `tasks` partition: u64 (big-endian) → check_id (utf8)
/// - `metadata` partition: "next_seq" → u64 (atomic counter)
///
/// Tasks are persisted before being sent to workers via mpsc channels, so a
/// crash between enqueue and execution leaves the entry recoverable. Entries
/// are removed once the worker finishes the check.
pub struct CheckQueue {
    keyspace: Keyspace,
    tasks: PartitionHandle,
    metadata: PartitionHandle,
    seq_counter: Arc<AtomicU64>,
}

impl CheckQueue {
    /// Open or create a queue at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("Opening CheckQueue at: {}", path.as_ref().display());

        let keyspace = Config::new(path).open()?;

        let tasks = keyspace.open_partition("tasks", PartitionCreateOptions::default())?;
        let metadata = keyspace.open_partition("metadata", PartitionCreateOptions::default())?;

        // Load the current sequence counter from metadata
        let current_seq = metadata
            .get(b"next_seq")?
            .map(|bytes| u64::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0u8; 8])))
            .unwrap_or(0);

        info!("CheckQueue opened, current sequence: {}", current_seq);

        Ok(Self {
            keyspace,
            tasks,
            metadata,
            seq_counter: Arc::new(AtomicU64::new(current_seq)),
        })
    }

    /// Enqueue a check execution and return its sequence number.
    ///
    /// The task is persisted before the updated counter, so a crash in
    /// between re-issues a sequence number but never loses a task.
    pub fn enqueue(&self, check_id: &str) -> Result<u64> {
        let seq = self.seq_counter.fetch_add(1, Ordering::SeqCst);

        let key = seq.to_be_bytes();
        self.tasks.insert(key, check_id.as_bytes())?;

        let next_seq = seq + 1;
        self.metadata.insert(b"next_seq", next_seq.to_be_bytes())?;

        debug!(seq, check_id, "Check enqueued");

        Ok(seq)
    }

    /// Retrieve a pending check id by sequence number.
    pub fn get_task(&self, seq: u64) -> Result<Option<String>> {
        let key = seq.to_be_bytes();

        if let Some(bytes) = self.tasks.get(key)? {
            let check_id = String::from_utf8(bytes.to_vec())
                .map_err(|_| QueueError::CorruptTask(seq))?;
            Ok(Some(check_id))
        } else {
            Ok(None)
        }
    }

    /// Remove a finished task from the queue.
    pub fn complete(&self, seq: u64) -> Result<()> {
        self.tasks.remove(seq.to_be_bytes())?;
        debug!(seq, "Check task completed");
        Ok(())
    }

    /// Pending entries that were persisted but never completed, oldest first.
    /// Used on startup to re-dispatch work interrupted by a crash.
    pub fn pending(&self) -> Result<Vec<(u64, String)>> {
        let mut results = Vec::new();

        for item in self.tasks.iter() {
            let (key, value) = item?;
            let seq = u64::from_be_bytes(key.as_ref().try_into().unwrap_or([0u8; 8]));
            let check_id = String::from_utf8(value.to_vec())
                .map_err(|_| QueueError::CorruptTask(seq))?;
            results.push((seq, check_id));
        }

        Ok(results)
    }

    /// Get current sequence counter value
    pub fn current_seq(&self) -> u64 {
        self.seq_counter.load(Ordering::SeqCst)
    }

    /// Flush all writes to disk
    pub fn flush(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Health check - verify database is accessible
    pub fn health_check(&self) -> Result<()> {
        let _ = self.metadata.get(b"next_seq")?;
        Ok(())
    }
}
