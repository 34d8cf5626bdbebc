use std::path::Path;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use tracing::{debug, info};

use crate::model::{Batch, Check, Link};

use super::error::Result;
use super::partitions::{
    encode_batch_key, encode_check_batch_key, encode_check_batch_prefix, encode_check_key,
    encode_link_check_key, encode_link_check_prefix, encode_link_key,
};
use super::pruning::{PruneStats, prune_expired};

/// Fjall-backed persistent storage for links, checks, and batches.
#[derive(Clone)]
pub struct LinkStore {
    keyspace: Keyspace,
    links: PartitionHandle,
    checks: PartitionHandle,
    link_checks: PartitionHandle,
    batches: PartitionHandle,
    check_batches: PartitionHandle,
    metadata: PartitionHandle,
}

impl LinkStore {
    /// Open or create a ledger at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening ledger at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;

        let links = keyspace.open_partition("links", PartitionCreateOptions::default())?;
        let checks = keyspace.open_partition("checks", PartitionCreateOptions::default())?;
        let link_checks =
            keyspace.open_partition("link_checks", PartitionCreateOptions::default())?;
        let batches = keyspace.open_partition("batches", PartitionCreateOptions::default())?;
        let check_batches =
            keyspace.open_partition("check_batches", PartitionCreateOptions::default())?;
        let metadata = keyspace.open_partition("metadata", PartitionCreateOptions::default())?;

        info!("Ledger opened successfully");
        Ok(Self {
            keyspace,
            links,
            checks,
            link_checks,
            batches,
            check_batches,
            metadata,
        })
    }

    /// Look up a link by its normalized URI.
    pub fn get_link(&self, uri: &str) -> Result<Option<Link>> {
        match self.links.get(encode_link_key(uri))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Get a check by id.
    pub fn get_check(&self, check_id: &str) -> Result<Option<Check>> {
        match self.checks.get(encode_check_key(check_id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Store or update a check.
    pub fn put_check(&self, check: &Check) -> Result<()> {
        let value = serde_json::to_vec(check)?;
        self.checks.insert(encode_check_key(&check.id), value)?;
        debug!(check_id = %check.id, "Upserted check");
        Ok(())
    }

    /// The most recently created check for a link, via the recency index.
    pub fn latest_check_for_link(&self, link_id: &str) -> Result<Option<Check>> {
        let prefix = encode_link_check_prefix(link_id);
        let mut iter = self.link_checks.prefix(prefix);

        match iter.next_back() {
            Some(entry) => {
                let (_, value) = entry?;
                let check_id = String::from_utf8_lossy(&value).to_string();
                self.get_check(&check_id)
            }
            None => Ok(None),
        }
    }

    /// Get a batch by id.
    pub fn get_batch(&self, batch_id: &str) -> Result<Option<Batch>> {
        match self.batches.get(encode_batch_key(batch_id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Store or update a batch.
    pub fn put_batch(&self, batch: &Batch) -> Result<()> {
        let value = serde_json::to_vec(batch)?;
        self.batches.insert(encode_batch_key(&batch.id), value)?;
        debug!(batch_id = %batch.id, "Upserted batch");
        Ok(())
    }

    /// Every batch that references the given check, via the reverse index.
    pub fn batches_for_check(&self, check_id: &str) -> Result<Vec<Batch>> {
        let mut result = Vec::new();
        for entry in self.check_batches.prefix(encode_check_batch_prefix(check_id)) {
            let (_, value) = entry?;
            let batch_id = String::from_utf8_lossy(&value).to_string();
            if let Some(batch) = self.get_batch(&batch_id)? {
                result.push(batch);
            }
        }
        Ok(result)
    }

    /// True when every member check of the batch is complete.
    pub fn all_checks_complete(&self, batch: &Batch) -> Result<bool> {
        for check_id in &batch.check_ids {
            match self.get_check(check_id)? {
                Some(check) if check.is_completed() => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Commit a batch and everything it introduced as a single atomic write:
    /// new links, new checks (with their recency-index entries), the batch
    /// record, and the check→batch reverse-index entries. A partial batch is
    /// never observable.
    pub fn commit_batch(
        &self,
        new_links: &[Link],
        new_checks: &[Check],
        batch: &Batch,
    ) -> Result<()> {
        let mut write = self.keyspace.batch();

        for link in new_links {
            write.insert(&self.links, encode_link_key(&link.uri), serde_json::to_vec(link)?);
        }

        for check in new_checks {
            write.insert(
                &self.checks,
                encode_check_key(&check.id),
                serde_json::to_vec(check)?,
            );
            write.insert(
                &self.link_checks,
                encode_link_check_key(
                    &check.link_id,
                    check.created_at.timestamp_millis() as u64,
                    &check.id,
                ),
                check.id.as_bytes(),
            );
        }

        write.insert(
            &self.batches,
            encode_batch_key(&batch.id),
            serde_json::to_vec(batch)?,
        );

        for check_id in &batch.check_ids {
            write.insert(
                &self.check_batches,
                encode_check_batch_key(check_id, &batch.id),
                batch.id.as_bytes(),
            );
        }

        write.commit()?;
        debug!(
            batch_id = %batch.id,
            new_links = new_links.len(),
            new_checks = new_checks.len(),
            "Committed batch"
        );
        Ok(())
    }

    /// Prune expired entries based on retention policies.
    pub fn prune(&self, check_ttl_days: u32, batch_ttl_days: u32) -> Result<PruneStats> {
        info!("Starting pruning process");
        let stats = prune_expired(
            &self.keyspace,
            &self.checks,
            &self.link_checks,
            &self.batches,
            &self.check_batches,
            &self.metadata,
            check_ttl_days,
            batch_ttl_days,
        )?;
        info!("Pruning completed: {:?}", stats);
        Ok(stats)
    }

    /// Persist all pending writes to disk.
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Verify the ledger is accessible.
    pub fn health_check(&self) -> Result<()> {
        let _ = self.metadata.get(b"meta:health")?;
        Ok(())
    }

    /// Internal statistics (for debugging/monitoring).
    pub fn stats(&self) -> Result<StoreStats> {
        let mut link_count = 0;
        let mut check_count = 0;
        let mut batch_count = 0;

        for item in self.links.iter() {
            item?;
            link_count += 1;
        }
        for item in self.checks.iter() {
            item?;
            check_count += 1;
        }
        for item in self.batches.iter() {
            item?;
            batch_count += 1;
        }

        Ok(StoreStats {
            link_count,
            check_count,
            batch_count,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StoreStats {
    pub link_count: usize,
    pub check_count: usize,
    pub batch_count: usize,
}
