//! Batch storage.
//!
//! The store maps batch identifiers to [`BatchSlot`]s. Each slot carries its
//! own lock, so contributions to unrelated batches never contend; the map
//! lock is only held long enough to find or insert a slot.

use crate::batch::model::Batch;

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// Mutable state of one batch.
#[derive(Debug)]
pub(crate) struct SlotState {
    pub(crate) batch: Batch,
    /// Set under the lock by the contribution that triggers analysis.
    pub(crate) analysis_started: bool,
}

/// One batch behind its own lock.
#[derive(Debug)]
pub struct BatchSlot {
    state: Mutex<SlotState>,
}

impl BatchSlot {
    /// Wraps a new batch.
    pub fn new(batch: Batch) -> Self {
        Self {
            state: Mutex::new(SlotState {
                batch,
                analysis_started: false,
            }),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns a deep copy of the batch.
    pub fn snapshot(&self) -> Batch {
        self.lock().batch.clone()
    }

    /// Returns `true` once analysis has been scheduled.
    pub fn analysis_started(&self) -> bool {
        self.lock().analysis_started
    }
}

/// Storage for batches.
pub trait BatchStore: Send + Sync + Debug {
    /// Returns the slot for `batch_id`, creating it from `init` if absent.
    ///
    /// Insert-if-absent must be atomic: concurrent callers with the same
    /// identifier receive the same slot.
    fn get_or_insert_with(&self, batch_id: &str, init: &dyn Fn() -> Batch) -> Arc<BatchSlot>;

    /// Returns the slot for `batch_id`, if any.
    fn get(&self, batch_id: &str) -> Option<Arc<BatchSlot>>;

    /// Number of batches held.
    fn len(&self) -> usize;

    /// Returns `true` if no batch is held.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory batch store.
///
/// Batches live for the lifetime of the process.
#[derive(Debug, Default)]
pub struct InMemoryBatchStore {
    slots: RwLock<HashMap<String, Arc<BatchSlot>>>,
}

impl InMemoryBatchStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl BatchStore for InMemoryBatchStore {
    fn get_or_insert_with(&self, batch_id: &str, init: &dyn Fn() -> Batch) -> Arc<BatchSlot> {
        if let Some(slot) = self.get(batch_id) {
            return slot;
        }

        let mut slots = self
            .slots
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slots
            .entry(batch_id.to_string())
            .or_insert_with(|| Arc::new(BatchSlot::new(init())))
            .clone()
    }

    fn get(&self, batch_id: &str) -> Option<Arc<BatchSlot>> {
        self.slots
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(batch_id)
            .cloned()
    }

    fn len(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_if_absent_keeps_first() {
        let store = InMemoryBatchStore::new();
        let first = store.get_or_insert_with("b", &|| Batch::new("b", "alice", 5));
        let second = store.get_or_insert_with("b", &|| Batch::new("b", "mallory", 5));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.snapshot().owner_id, "alice");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let store = InMemoryBatchStore::new();
        let slot = store.get_or_insert_with("b", &|| Batch::new("b", "alice", 5));
        let mut copy = slot.snapshot();
        copy.results.insert("api_a".into(), serde_json::json!(1));

        assert_eq!(slot.snapshot().received_count(), 0);
        assert!(store.get("missing").is_none());
    }
}
