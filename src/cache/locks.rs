//! Per-habit locks
//!
//! One async mutex per habit, created on first use and kept for the lifetime
//! of the owning manager. Insertion goes through the map's shard lock, so two
//! callers racing on a new habit always end up with the same mutex.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::HabitId;

/// Guard for a habit's critical section.
///
/// Released on drop, including when the holder returns early with an error.
pub struct HabitGuard {
    _guard: OwnedMutexGuard<()>,
    /// The caller had to wait for another holder
    pub contended: bool,
}

/// Lazily created mutex per habit
#[derive(Debug, Default)]
pub struct HabitLocks {
    locks: DashMap<HabitId, Arc<Mutex<()>>>,
}

impl HabitLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock handle for a habit, creating it if absent.
    fn handle(&self, habit_id: &HabitId) -> Arc<Mutex<()>> {
        self.locks
            .entry(habit_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquire the habit's lock, waiting if another task holds it.
    pub async fn acquire(&self, habit_id: &HabitId) -> HabitGuard {
        let handle = self.handle(habit_id);

        match handle.clone().try_lock_owned() {
            Ok(guard) => HabitGuard {
                _guard: guard,
                contended: false,
            },
            Err(_) => HabitGuard {
                _guard: handle.lock_owned().await,
                contended: true,
            },
        }
    }

    /// Number of lock handles created so far.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
