/// Pruning and retention policy implementation.
///
/// Old checks and batches are removed once they fall outside the configured
/// retention window. Retention must exceed the largest freshness window in
/// use, otherwise a pruned check could still have been reusable.
use chrono::{Duration, Utc};

use fjall::{Keyspace, PartitionHandle};
use tracing::{debug, info};

use crate::model::{Batch, Check};

use super::error::Result;
use super::partitions::{
    encode_check_batch_prefix, encode_link_check_key, encode_meta_key,
};

/// Metadata keys for pruning state
const META_LAST_PRUNE_CHECKS: &str = "last_prune_checks";
const META_LAST_PRUNE_BATCHES: &str = "last_prune_batches";

/// Pruning statistics
#[derive(Debug, Default)]
pub struct PruneStats {
    pub checks_pruned: usize,
    pub batches_pruned: usize,
}

/// Prune expired entries from all partitions.
#[allow(clippy::too_many_arguments)]
pub fn prune_expired(
    keyspace: &Keyspace,
    checks: &PartitionHandle,
    link_checks: &PartitionHandle,
    batches: &PartitionHandle,
    check_batches: &PartitionHandle,
    metadata: &PartitionHandle,
    check_ttl_days: u32,
    batch_ttl_days: u32,
) -> Result<PruneStats> {
    let mut stats = PruneStats::default();

    stats.batches_pruned = prune_batches(batches, metadata, batch_ttl_days)?;
    stats.checks_pruned = prune_checks(checks, link_checks, check_batches, metadata, check_ttl_days)?;

    // Flush so reclaimed space is durable.
    keyspace.persist(fjall::PersistMode::SyncAll)?;
    info!("Pruning complete: {:?}", stats);

    Ok(stats)
}

/// Remove batches created before the retention cutoff. Batches are pruned
/// before checks so a surviving batch never references a pruned check.
fn prune_batches(
    batches: &PartitionHandle,
    metadata: &PartitionHandle,
    ttl_days: u32,
) -> Result<usize> {
    let cutoff = Utc::now() - Duration::days(i64::from(ttl_days));

    let mut expired = Vec::new();
    for item in batches.iter() {
        let (key, value) = item?;
        let batch: Batch = serde_json::from_slice(&value)?;
        if batch.created_at < cutoff {
            expired.push(key);
        }
    }

    for key in &expired {
        batches.remove(key.clone())?;
    }

    record_prune_time(metadata, META_LAST_PRUNE_BATCHES)?;
    debug!(pruned = expired.len(), "Pruned old batches");
    Ok(expired.len())
}

/// Remove checks created before the retention cutoff, along with their
/// recency-index and reverse-index entries.
fn prune_checks(
    checks: &PartitionHandle,
    link_checks: &PartitionHandle,
    check_batches: &PartitionHandle,
    metadata: &PartitionHandle,
    ttl_days: u32,
) -> Result<usize> {
    let cutoff = Utc::now() - Duration::days(i64::from(ttl_days));

    let mut expired = Vec::new();
    for item in checks.iter() {
        let (key, value) = item?;
        let check: Check = serde_json::from_slice(&value)?;
        if check.created_at < cutoff {
            expired.push((key, check));
        }
    }

    for (key, check) in &expired {
        checks.remove(key.clone())?;
        link_checks.remove(encode_link_check_key(
            &check.link_id,
            check.created_at.timestamp_millis() as u64,
            &check.id,
        ))?;

        let reverse_keys: Vec<_> = check_batches
            .prefix(encode_check_batch_prefix(&check.id))
            .map(|entry| entry.map(|(key, _)| key))
            .collect::<std::result::Result<_, _>>()?;
        for reverse_key in reverse_keys {
            check_batches.remove(reverse_key)?;
        }
    }

    record_prune_time(metadata, META_LAST_PRUNE_CHECKS)?;
    debug!(pruned = expired.len(), "Pruned old checks");
    Ok(expired.len())
}

fn record_prune_time(metadata: &PartitionHandle, key: &str) -> Result<()> {
    metadata.insert(
        encode_meta_key(key),
        Utc::now().timestamp().to_string().as_bytes(),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LinkStore;
    use crate::model::Link;
    use tempfile::TempDir;

    #[test]
    fn prunes_expired_checks_and_batches() {
        let temp_dir = TempDir::new().unwrap();
        let store = LinkStore::open(temp_dir.path().join("ledger")).unwrap();

        let link = Link::new("https://example.org/");
        let mut old_check = Check::new(&link);
        old_check.created_at = Utc::now() - Duration::days(60);
        let mut old_batch = Batch::new(vec![old_check.id.clone()], None);
        old_batch.created_at = Utc::now() - Duration::days(60);
        store
            .commit_batch(&[link.clone()], &[old_check.clone()], &old_batch)
            .unwrap();

        let fresh_check = Check::new(&link);
        let fresh_batch = Batch::new(vec![fresh_check.id.clone()], None);
        store
            .commit_batch(&[], &[fresh_check.clone()], &fresh_batch)
            .unwrap();

        let stats = store.prune(30, 30).unwrap();
        assert_eq!(stats.checks_pruned, 1);
        assert_eq!(stats.batches_pruned, 1);

        assert!(store.get_check(&old_check.id).unwrap().is_none());
        assert!(store.get_batch(&old_batch.id).unwrap().is_none());
        assert!(store.get_check(&fresh_check.id).unwrap().is_some());
        assert!(store.get_batch(&fresh_batch.id).unwrap().is_some());

        // The recency index no longer resolves to the pruned check.
        let latest = store.latest_check_for_link(&link.id).unwrap().unwrap();
        assert_eq!(latest.id, fresh_check.id);
    }

    #[test]
    fn prune_with_nothing_expired_is_a_noop() {
        let temp_dir = TempDir::new().unwrap();
        let store = LinkStore::open(temp_dir.path().join("ledger")).unwrap();

        let link = Link::new("https://example.org/");
        let check = Check::new(&link);
        let batch = Batch::new(vec![check.id.clone()], None);
        store.commit_batch(&[link], &[check], &batch).unwrap();

        let stats = store.prune(30, 30).unwrap();
        assert_eq!(stats.checks_pruned, 0);
        assert_eq!(stats.batches_pruned, 0);
    }
}
