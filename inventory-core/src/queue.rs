//! Per-key write serialization
//!
//! All mutating operations for one `(company, collection)` key run strictly
//! in arrival order: an operation acquires the key's mutex before touching
//! the file and holds it until it finishes. Tokio's mutex wakes waiters in
//! FIFO order, so the guard realizes the same queue semantics the desktop
//! app needs to prevent two concurrent postings from racing on a
//! read-modify-write of the same file.
//!
//! A failure inside one operation only fails that operation: the guard is
//! released on drop and later operations proceed unaffected. Different keys
//! never contend. There is no cancellation or timeout.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Collections a company's ledger directory is made of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Append-only transaction log
    Transactions,
    /// Voucher documents
    Vouchers,
    /// Tracking number records
    Tracking,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QueueKey {
    company: String,
    collection: Collection,
}

/// Registry of per-key write locks, owned by the store instance.
#[derive(Debug, Default)]
pub struct WriteQueues {
    locks: DashMap<QueueKey, Arc<Mutex<()>>>,
}

impl WriteQueues {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for all earlier writers on this key, then take the write slot.
    /// The slot is released when the returned guard drops.
    pub async fn acquire(&self, company: &str, collection: Collection) -> OwnedMutexGuard<()> {
        let key = QueueKey {
            company: company.to_string(),
            collection,
        };
        let lock = self.locks.entry(key).or_default().value().clone();
        lock.lock_owned().await
    }
}
