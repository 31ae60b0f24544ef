//! Memory tier entry

use std::time::{Duration, Instant};

use crate::domain::StreakState;

/// A streak state held in process memory until `expires_at`.
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    pub state: StreakState,
    pub expires_at: Instant,
}

impl MemoryEntry {
    pub fn new(state: StreakState, ttl: Duration) -> Self {
        Self {
            state,
            expires_at: Instant::now() + ttl,
        }
    }

    /// An entry is only served while `expires_at` is strictly in the future.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}
