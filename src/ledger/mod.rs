//! Persistent ledger for links, checks, and batches.
//!
//! Backed by fjall, an embedded LSM keyspace. All mutations that must be
//! observed together (batch submission) go through a single atomic write.

pub mod error;
pub mod partitions;
pub mod pruning;
pub mod store;

pub use error::{LedgerError, Result};
pub use pruning::PruneStats;
pub use store::{LinkStore, StoreStats};
