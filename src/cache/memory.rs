//! Memory Tier
//!
//! Process-local TTL map from habit to streak state. Entries are replaced
//! whole, so readers never observe a partially written state.

use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

use super::entry::MemoryEntry;
use crate::domain::{HabitId, StreakState};

/// Result of a memory tier lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryLookup {
    Hit(StreakState),
    /// An entry existed but had expired; it has been dropped
    Expired,
    Miss,
}

/// In-process TTL cache of streak states
#[derive(Debug)]
pub struct MemoryTier {
    entries: DashMap<HabitId, MemoryEntry>,
    ttl: Duration,
}

impl MemoryTier {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a habit, dropping the entry if it has expired.
    pub fn get(&self, habit_id: &HabitId) -> MemoryLookup {
        // The read guard must be released before remove_if touches the shard.
        let expired = match self.entries.get(habit_id) {
            Some(entry) if !entry.is_expired() => return MemoryLookup::Hit(entry.state.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(habit_id, |_, entry| entry.is_expired());
            MemoryLookup::Expired
        } else {
            MemoryLookup::Miss
        }
    }

    /// Store a state with a fresh TTL.
    pub fn insert(&self, habit_id: HabitId, state: StreakState) {
        self.entries
            .insert(habit_id, MemoryEntry::new(state, self.ttl));
    }

    /// Drop the entry for a habit. Returns whether one was present.
    pub fn invalidate(&self, habit_id: &HabitId) -> bool {
        self.entries.remove(habit_id).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> MemoryStats {
        let total = self.entries.len();
        let expired = self
            .entries
            .iter()
            .filter(|entry| entry.is_expired())
            .count();

        MemoryStats {
            total_entries: total,
            expired_entries: expired,
            active_entries: total.saturating_sub(expired),
        }
    }
}

/// Memory tier occupancy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub active_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn state(current: u32) -> StreakState {
        let mut s = StreakState::empty(Utc::now());
        s.current_streak = current;
        s.longest_streak = current;
        s
    }

    #[test]
    fn test_insert_and_hit() {
        let tier = MemoryTier::new(Duration::from_secs(60));
        let habit = HabitId::new("h-1");
        let stored = state(3);
        tier.insert(habit.clone(), stored.clone());

        assert_eq!(tier.get(&habit), MemoryLookup::Hit(stored));
    }

    #[test]
    fn test_miss() {
        let tier = MemoryTier::new(Duration::from_secs(60));
        assert_eq!(tier.get(&HabitId::new("nope")), MemoryLookup::Miss);
    }

    #[test]
    fn test_expired_entry_dropped() {
        let tier = MemoryTier::new(Duration::ZERO);
        let habit = HabitId::new("h-1");
        tier.insert(habit.clone(), state(1));
        assert_eq!(tier.stats().expired_entries, 1);

        assert_eq!(tier.get(&habit), MemoryLookup::Expired);
        assert!(tier.is_empty());
        assert_eq!(tier.get(&habit), MemoryLookup::Miss);
    }

    #[test]
    fn test_invalidate() {
        let tier = MemoryTier::new(Duration::from_secs(60));
        let habit = HabitId::new("h-1");
        tier.insert(habit.clone(), state(1));

        assert!(tier.invalidate(&habit));
        assert!(!tier.invalidate(&habit));
        assert_eq!(tier.get(&habit), MemoryLookup::Miss);
    }

    #[test]
    fn test_insert_replaces_whole_entry() {
        let tier = MemoryTier::new(Duration::from_secs(60));
        let habit = HabitId::new("h-1");
        tier.insert(habit.clone(), state(1));
        tier.insert(habit.clone(), state(2));

        assert_eq!(tier.len(), 1);
        match tier.get(&habit) {
            MemoryLookup::Hit(s) => assert_eq!(s.current_streak, 2),
            other => panic!("expected hit, got {:?}", other),
        }
    }

    #[test]
    fn test_stats_and_clear() {
        let tier = MemoryTier::new(Duration::from_secs(60));
        tier.insert(HabitId::new("a"), state(1));
        tier.insert(HabitId::new("b"), state(1));

        let stats = tier.stats();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.active_entries, 2);

        tier.clear();
        assert!(tier.is_empty());
    }
}
