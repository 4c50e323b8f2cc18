//! Per-document serialization

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Async mutex per document id
///
/// Ingest, delete and reindex of one document hold its lock for their
/// whole duration; different documents never contend.
#[derive(Default)]
pub struct DocumentLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `document_id`
    pub async fn acquire(&self, document_id: &str) -> DocumentGuard<'_> {
        let lock = self
            .locks
            .entry(document_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        DocumentGuard {
            guard: Some(lock.lock_owned().await),
            id: document_id.to_string(),
            locks: self,
        }
    }

    /// Number of ids with a live lock entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held lock; the map entry is dropped once nobody else holds or awaits it
pub struct DocumentGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    id: String,
    locks: &'a DocumentLocks,
}

impl Drop for DocumentGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own Arc left means no holder and no waiter
        self.locks
            .locks
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
