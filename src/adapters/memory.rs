//! In-memory adapters
//!
//! Implementations of the collaborator ports backed by process memory. Used
//! by the CLI and by tests; the completion log can simulate latency and
//! outages, and the streak record store counts its calls.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::domain::{
    CompletionLog, CompletionLogStore, CompletionLogWriter, CompletionRecord, HabitId,
    Partnership, PartnershipDirectory, PartnershipId, StreakRecordStore, StreakState,
};
use crate::error::{Error, Result};

// =============================================================================
// Partnerships
// =============================================================================

/// Partnership directory held in a map
#[derive(Debug, Default)]
pub struct InMemoryPartnershipDirectory {
    partnerships: DashMap<PartnershipId, Partnership>,
}

impl InMemoryPartnershipDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, partnership: Partnership) {
        self.partnerships.insert(partnership.id.clone(), partnership);
    }
}

#[async_trait]
impl PartnershipDirectory for InMemoryPartnershipDirectory {
    async fn members(&self, partnership_id: &PartnershipId) -> Result<Partnership> {
        self.partnerships
            .get(partnership_id)
            .map(|p| p.clone())
            .ok_or_else(|| Error::partnership_not_found(partnership_id))
    }
}

// =============================================================================
// Completion Log
// =============================================================================

/// Completion log keyed by habit.
///
/// `upsert` replaces the record for the same (user, day); `insert_raw` appends
/// as-is, which lets tests seed malformed or duplicate documents.
#[derive(Debug, Default)]
pub struct InMemoryCompletionLog {
    records: DashMap<HabitId, Vec<CompletionRecord>>,
    latency: RwLock<Option<Duration>>,
    unavailable: AtomicBool,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl InMemoryCompletionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw record without upsert semantics.
    pub fn insert_raw(&self, habit_id: &HabitId, record: CompletionRecord) {
        self.records.entry(habit_id.clone()).or_default().push(record);
    }

    /// Append every record of a JSON export (an array of completion
    /// documents). Returns how many were loaded.
    pub fn load_json(&self, habit_id: &HabitId, json: &str) -> Result<usize> {
        let records: Vec<CompletionRecord> = serde_json::from_str(json)?;
        let count = records.len();
        self.records
            .entry(habit_id.clone())
            .or_default()
            .extend(records);
        Ok(count)
    }

    /// Delay every read by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write() = Some(latency);
    }

    /// Make every call fail with `StoreUnavailable` until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Upserts that reached the log.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::store_unavailable("completion log", "simulated outage"));
        }
        Ok(())
    }
}

#[async_trait]
impl CompletionLogStore for InMemoryCompletionLog {
    async fn completions_for_habit(&self, habit_id: &HabitId) -> Result<Vec<CompletionRecord>> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.check_available()?;

        Ok(self
            .records
            .get(habit_id)
            .map(|records| records.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl CompletionLogWriter for InMemoryCompletionLog {
    async fn upsert(&self, log: CompletionLog) -> Result<()> {
        self.check_available()?;
        self.writes.fetch_add(1, Ordering::SeqCst);

        let record = log.to_record();
        let mut records = self.records.entry(log.habit_id.clone()).or_default();
        let existing = records
            .iter()
            .position(|r| r.user_id == log.user_id && r.day() == Some(log.log_date));
        match existing {
            Some(index) => records[index] = record,
            None => records.push(record),
        }
        Ok(())
    }
}

// =============================================================================
// Streak Records
// =============================================================================

/// A persisted streak record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredStreak {
    pub partnership_id: PartnershipId,
    pub state: StreakState,
}

/// Streak record store held in a map, with call counters
#[derive(Debug, Default)]
pub struct InMemoryStreakRecordStore {
    records: DashMap<HabitId, StoredStreak>,
    unavailable: AtomicBool,
    reads: AtomicU64,
    upserts: AtomicU64,
}

impl InMemoryStreakRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored record for a habit, bypassing the counters.
    pub fn stored(&self, habit_id: &HabitId) -> Option<StoredStreak> {
        self.records.get(habit_id).map(|r| r.clone())
    }

    /// Make every call fail with `StoreUnavailable` until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn upsert_count(&self) -> u64 {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::store_unavailable(
                "streak record store",
                "simulated outage",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StreakRecordStore for InMemoryStreakRecordStore {
    async fn read(&self, habit_id: &HabitId) -> Result<Option<StreakState>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.records.get(habit_id).map(|r| r.state.clone()))
    }

    async fn upsert(
        &self,
        habit_id: &HabitId,
        partnership_id: &PartnershipId,
        state: &StreakState,
    ) -> Result<()> {
        self.check_available()?;
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.records.insert(
            habit_id.clone(),
            StoredStreak {
                partnership_id: partnership_id.clone(),
                state: state.clone(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{NaiveDate, Utc};

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_partnership_lookup() {
        let dir = InMemoryPartnershipDirectory::new();
        dir.insert(Partnership::new("p", "alice", "bob"));

        let p = dir.members(&PartnershipId::new("p")).await.unwrap();
        assert_eq!(p.user_a.as_str(), "alice");

        let err = dir.members(&PartnershipId::new("q")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_completion_upsert_replaces_same_day() {
        let log = InMemoryCompletionLog::new();
        let habit = HabitId::new("h");
        log.upsert(CompletionLog::new("h", "alice", day("2024-01-01"), false))
            .await
            .unwrap();
        log.upsert(CompletionLog::new("h", "alice", day("2024-01-01"), true))
            .await
            .unwrap();
        log.upsert(CompletionLog::new("h", "alice", day("2024-01-02"), true))
            .await
            .unwrap();

        let records = log.completions_for_habit(&habit).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.completed));
        assert_eq!(log.read_count(), 1);
        assert_eq!(log.write_count(), 3);
    }

    #[tokio::test]
    async fn test_load_json_export() {
        let log = InMemoryCompletionLog::new();
        let habit = HabitId::new("h");
        let json = r#"[
            {"user_id": "alice", "log_date": "2024-01-01", "completed": true},
            {"user_id": "bob", "log_date": "2024-01-01T09:30:00"},
            {"user_id": "bob", "completed": true}
        ]"#;

        assert_eq!(log.load_json(&habit, json).unwrap(), 3);
        let records = log.completions_for_habit(&habit).await.unwrap();
        assert!(!records[1].completed);
        assert_eq!(records[2].log_date, None);

        let err = log.load_json(&habit, "{not json").unwrap_err();
        assert_matches!(err, Error::Json(_));
        assert_eq!(log.completions_for_habit(&habit).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_completion_outage() {
        let log = InMemoryCompletionLog::new();
        log.set_unavailable(true);
        let err = log
            .completions_for_habit(&HabitId::new("h"))
            .await
            .unwrap_err();
        assert_matches!(err, Error::StoreUnavailable { .. });

        let err = log
            .upsert(CompletionLog::new("h", "alice", day("2024-01-01"), true))
            .await
            .unwrap_err();
        assert_matches!(err, Error::StoreUnavailable { .. });
        assert_eq!(log.write_count(), 0);

        log.set_unavailable(false);
        assert!(log
            .completions_for_habit(&HabitId::new("h"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_streak_store_upsert_overwrites() {
        let store = InMemoryStreakRecordStore::new();
        let habit = HabitId::new("h");
        let partnership = PartnershipId::new("p");

        assert_eq!(store.read(&habit).await.unwrap(), None);

        let mut state = StreakState::empty(Utc::now());
        store.upsert(&habit, &partnership, &state).await.unwrap();
        state.current_streak = 4;
        state.longest_streak = 4;
        store.upsert(&habit, &partnership, &state).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.upsert_count(), 2);
        assert_eq!(store.read(&habit).await.unwrap(), Some(state));
        assert_eq!(store.stored(&habit).unwrap().partnership_id, partnership);
    }
}
