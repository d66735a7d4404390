//! crates/timetable_core/src/locks.rs
//!
//! Per-timetable async locks. Mutations of one timetable run one at a time
//! inside this process; the store's version check covers other processes.

use crate::domain::TimetableId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct TimetableLocks {
    inner: DashMap<TimetableId, Arc<Mutex<()>>>,
}

/// Exclusive access to one timetable. Dropping it releases the lock and
/// removes the map entry once nobody else holds or awaits it.
pub struct TimetableGuard<'a> {
    locks: &'a DashMap<TimetableId, Arc<Mutex<()>>>,
    id: TimetableId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TimetableGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own clone of the Arc, so their entry survives.
        self.locks
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl TimetableLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `id`. Released when the guard drops.
    pub async fn acquire(&self, id: TimetableId) -> TimetableGuard<'_> {
        // Clone the Arc out so the map shard is not held across the await.
        let lock = self.inner.entry(id).or_default().clone();
        let guard = lock.lock_owned().await;
        TimetableGuard {
            locks: &self.inner,
            id,
            guard: Some(guard),
        }
    }
}
