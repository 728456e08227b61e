//! Active stream collection shared between a store and its stream handles.

use parking_lot::{RwLock, RwLockWriteGuard};
use std::sync::Arc;

/// Unordered set of registered streams.
///
/// Readers take point-in-time snapshots; writers lock the whole set so that
/// registration and the subscriber-state transition happen together.
pub(crate) struct StreamSet<T> {
    entries: RwLock<Vec<Arc<T>>>,
}

impl<T> StreamSet<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Clone the current membership under the read lock.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn lock(&self) -> RwLockWriteGuard<'_, Vec<Arc<T>>> {
        self.entries.write()
    }
}

/// Remove `target` by swapping the last entry into its slot.
pub(crate) fn swap_out<T>(entries: &mut Vec<Arc<T>>, target: &Arc<T>) -> bool {
    match entries.iter().position(|entry| Arc::ptr_eq(entry, target)) {
        Some(index) => {
            entries.swap_remove(index);
            true
        }
        None => false,
    }
}
