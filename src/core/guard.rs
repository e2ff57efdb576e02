//! Mutual exclusion around the shared heap
//!
//! One `Guard` wraps the process-wide `HeapStore`. Every mutation runs
//! inside a scoped `parking_lot` lock; the lock is released when the
//! guard object drops, including on early error returns.

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::HeapStore;
use crate::error::HeapError;

/// Serialized access to a single [`HeapStore`].
pub struct Guard {
    store: Mutex<HeapStore>,
    capacity: usize,
}

impl Guard {
    pub fn new(store: HeapStore) -> Self {
        let capacity = store.capacity();
        Self {
            store: Mutex::new(store),
            capacity,
        }
    }

    /// Shorthand for `Guard::new(HeapStore::new(capacity))`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(HeapStore::new(capacity))
    }

    /// Insert under the lock. Returns the size after insertion.
    pub fn insert(&self, value: i32) -> Result<usize, HeapError> {
        let mut store = self.store.lock();

        if let Err(err) = store.insert(value) {
            warn!(value, capacity = self.capacity, "heap full, insert rejected");
            return Err(err);
        }

        let size = store.len();
        debug!(value, size, "inserted");
        Ok(size)
    }

    pub fn extract_min(&self) -> Result<i32, HeapError> {
        let mut store = self.store.lock();

        let value = store.extract_min()?;
        debug!(value, size = store.len(), "extracted minimum");
        Ok(value)
    }

    pub fn clear(&self) {
        let mut store = self.store.lock();

        let dropped = store.len();
        store.clear();
        debug!(dropped, "cleared");
    }

    /// Current size. Diagnostic only: may be stale by the time it is read.
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    /// Diagnostic only, see [`Guard::len`].
    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Run `f` with the heap locked. Used by tests and diagnostics that need
    /// a consistent view of the backing array.
    pub fn inspect<R>(&self, f: impl FnOnce(&HeapStore) -> R) -> R {
        let store = self.store.lock();
        f(&store)
    }
}
