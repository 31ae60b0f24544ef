//! Streak Cache Manager
//!
//! Serves streak state through three tiers:
//!
//! 1. process memory (TTL)
//! 2. the persistent streak record store
//! 3. derivation from the completion log, under a per-habit lock
//!
//! Writes do not refresh the persistent tier on their own. The write path has
//! to call [`StreakCacheManager::recompute_and_persist`]; until it does, reads
//! may serve the previous record.

use std::future::Future;
use std::sync::Arc;

use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::locks::HabitLocks;
use super::memory::{MemoryLookup, MemoryStats, MemoryTier};
use super::metrics::{CacheMetrics, MetricsSnapshot};
use crate::config::EngineConfig;
use crate::domain::{
    Clock, CompletionLogStore, DerivationReason, EventPublisher, HabitId, PartnershipDirectory,
    PartnershipId, StreakEvent, StreakRecordStore, StreakState, SystemClock,
};
use crate::error::{Error, Result};
use crate::streak::derive_streak;

/// Which tier answered a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    Memory,
    Store,
    Derived,
}

impl std::fmt::Display for CacheTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheTier::Memory => write!(f, "memory"),
            CacheTier::Store => write!(f, "store"),
            CacheTier::Derived => write!(f, "derived"),
        }
    }
}

/// Lookup result
#[derive(Debug, Clone)]
pub struct StreakLookup {
    pub state: StreakState,
    pub tier: CacheTier,
}

/// Point-in-time view of the manager
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub metrics: MetricsSnapshot,
    pub memory: MemoryStats,
    pub lock_handles: usize,
}

/// Which read of the tiers a lookup is on. Only the first is counted, so
/// one lookup adds at most one hit or miss per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    First,
    Recheck,
}

/// Layered streak cache
pub struct StreakCacheManager {
    partnerships: Arc<dyn PartnershipDirectory>,
    completions: Arc<dyn CompletionLogStore>,
    records: Arc<dyn StreakRecordStore>,
    events: Option<Arc<dyn EventPublisher>>,
    clock: Arc<dyn Clock>,
    memory: MemoryTier,
    locks: HabitLocks,
    metrics: CacheMetrics,
    config: EngineConfig,
}

impl StreakCacheManager {
    /// Create a manager with default configuration
    pub fn new(
        partnerships: Arc<dyn PartnershipDirectory>,
        completions: Arc<dyn CompletionLogStore>,
        records: Arc<dyn StreakRecordStore>,
    ) -> Self {
        Self::with_config(EngineConfig::default(), partnerships, completions, records)
    }

    /// Create a manager with custom configuration
    pub fn with_config(
        config: EngineConfig,
        partnerships: Arc<dyn PartnershipDirectory>,
        completions: Arc<dyn CompletionLogStore>,
        records: Arc<dyn StreakRecordStore>,
    ) -> Self {
        Self {
            partnerships,
            completions,
            records,
            events: None,
            clock: Arc::new(SystemClock),
            memory: MemoryTier::new(config.memory_ttl),
            locks: HabitLocks::new(),
            metrics: CacheMetrics::new(),
            config,
        }
    }

    /// Use a different source of "today".
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish domain events to `publisher`.
    pub fn with_event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(publisher);
        self
    }

    // =========================================================================
    // Read path
    // =========================================================================

    /// Current streak for a habit.
    pub async fn get_streak(
        &self,
        habit_id: &HabitId,
        partnership_id: &PartnershipId,
    ) -> Result<StreakState> {
        self.lookup(habit_id, partnership_id)
            .await
            .map(|lookup| lookup.state)
    }

    /// Current streak for several habits of one partnership.
    pub async fn get_streaks(
        &self,
        habit_ids: &[HabitId],
        partnership_id: &PartnershipId,
    ) -> Result<Vec<(HabitId, StreakState)>> {
        try_join_all(habit_ids.iter().map(|habit_id| async move {
            let state = self.get_streak(habit_id, partnership_id).await?;
            Ok::<_, Error>((habit_id.clone(), state))
        }))
        .await
    }

    /// Current streak plus the tier that served it.
    #[instrument(skip(self), fields(habit_id = %habit_id, partnership_id = %partnership_id))]
    pub async fn lookup(
        &self,
        habit_id: &HabitId,
        partnership_id: &PartnershipId,
    ) -> Result<StreakLookup> {
        if let Some(state) = self.from_memory(habit_id, Pass::First) {
            return Ok(StreakLookup {
                state,
                tier: CacheTier::Memory,
            });
        }

        if let Some(state) = self.from_store(habit_id, Pass::First).await? {
            return Ok(StreakLookup {
                state,
                tier: CacheTier::Store,
            });
        }

        // Cold start. Another caller may be deriving the same habit; wait for
        // it and re-check both tiers before paying for a derivation.
        let guard = self.locks.acquire(habit_id).await;
        if guard.contended {
            self.metrics.record_lock_wait();
            debug!("Waited for in-flight derivation");
        }

        if let Some(state) = self.from_memory(habit_id, Pass::Recheck) {
            return Ok(StreakLookup {
                state,
                tier: CacheTier::Memory,
            });
        }
        if let Some(state) = self.from_store(habit_id, Pass::Recheck).await? {
            return Ok(StreakLookup {
                state,
                tier: CacheTier::Store,
            });
        }

        let state = self
            .derive_and_persist(habit_id, partnership_id, DerivationReason::ColdStart)
            .await?;
        self.memory.insert(habit_id.clone(), state.clone());

        Ok(StreakLookup {
            state,
            tier: CacheTier::Derived,
        })
    }

    // =========================================================================
    // Write path
    // =========================================================================

    /// Derive from the completion log, overwrite the persistent record, and
    /// drop the memory entry so the next read reloads it.
    #[instrument(skip(self), fields(habit_id = %habit_id, partnership_id = %partnership_id))]
    pub async fn recompute_and_persist(
        &self,
        habit_id: &HabitId,
        partnership_id: &PartnershipId,
    ) -> Result<StreakState> {
        let guard = self.locks.acquire(habit_id).await;
        if guard.contended {
            self.metrics.record_lock_wait();
        }

        let state = self
            .derive_and_persist(habit_id, partnership_id, DerivationReason::Forced)
            .await?;
        self.invalidate(habit_id);

        Ok(state)
    }

    /// Drop the memory entry for a habit.
    ///
    /// The persistent record is left alone and may still be stale.
    pub fn invalidate(&self, habit_id: &HabitId) -> bool {
        self.metrics.record_invalidation();
        let removed = self.memory.invalidate(habit_id);
        debug!(habit_id = %habit_id, removed, "Invalidated memory entry");
        removed
    }

    /// Drop every memory entry. Lock handles are kept.
    pub fn clear_memory(&self) {
        self.memory.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            metrics: self.metrics.snapshot(),
            memory: self.memory.stats(),
            lock_handles: self.locks.len(),
        }
    }

    // =========================================================================
    // Tiers
    // =========================================================================

    fn from_memory(&self, habit_id: &HabitId, pass: Pass) -> Option<StreakState> {
        let lookup = self.memory.get(habit_id);
        if pass == Pass::First {
            match &lookup {
                MemoryLookup::Hit(_) => self.metrics.record_memory_hit(),
                MemoryLookup::Expired => self.metrics.record_memory_expired(),
                MemoryLookup::Miss => self.metrics.record_memory_miss(),
            }
        }
        match lookup {
            MemoryLookup::Hit(state) => Some(state),
            MemoryLookup::Expired | MemoryLookup::Miss => None,
        }
    }

    /// Read the persistent tier, repopulating memory on a hit.
    async fn from_store(&self, habit_id: &HabitId, pass: Pass) -> Result<Option<StreakState>> {
        let stored = self
            .bounded("streak record store", self.records.read(habit_id))
            .await?;
        if pass == Pass::First {
            match &stored {
                Some(_) => self.metrics.record_store_hit(),
                None => self.metrics.record_store_miss(),
            }
        }
        if let Some(state) = &stored {
            self.memory.insert(habit_id.clone(), state.clone());
        }
        Ok(stored)
    }

    /// Caller must hold the habit's lock.
    async fn derive_and_persist(
        &self,
        habit_id: &HabitId,
        partnership_id: &PartnershipId,
        reason: DerivationReason,
    ) -> Result<StreakState> {
        let partnership = self
            .bounded("partnership directory", self.partnerships.members(partnership_id))
            .await?;
        let records = self
            .bounded(
                "completion log",
                self.completions.completions_for_habit(habit_id),
            )
            .await?;

        let state = derive_streak(&partnership, &records, self.clock.today(), self.clock.now());

        self.bounded(
            "streak record store",
            self.records.upsert(habit_id, partnership_id, &state),
        )
        .await?;

        match reason {
            DerivationReason::ColdStart => self.metrics.record_cold_start(),
            DerivationReason::Forced => self.metrics.record_forced(),
        }

        info!(
            habit_id = %habit_id,
            reason = %reason,
            records = records.len(),
            current_streak = state.current_streak,
            longest_streak = state.longest_streak,
            "Derived streak"
        );

        self.publish(StreakEvent::derived(habit_id, partnership_id, &state, reason))
            .await;

        Ok(state)
    }

    /// Run a collaborator call under the configured timeout.
    pub(crate) async fn bounded<T, F>(&self, store: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let result = match self.config.store_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(Error::store_unavailable(
                    store,
                    format!("timed out after {:?}", limit),
                )),
            },
            None => call.await,
        };

        if let Err(e) = &result {
            self.metrics.record_error();
            if e.is_not_found() {
                debug!(store, error = %e, "Collaborator lookup found nothing");
            } else {
                warn!(store, error = %e, retryable = e.is_retryable(), "Collaborator call failed");
            }
        }
        result
    }

    pub(crate) async fn publish(&self, event: StreakEvent) {
        if !self.config.publish_events {
            return;
        }
        if let Some(publisher) = &self.events {
            let event_type = event.event_type();
            let habit_id = event.habit_id().to_string();
            if let Err(e) = publisher.publish(event).await {
                warn!(event_type, habit_id = %habit_id, error = %e, "Failed to publish streak event");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{
        InMemoryCompletionLog, InMemoryEventCollector, InMemoryPartnershipDirectory,
        InMemoryStreakRecordStore,
    };
    use crate::domain::{CompletionLog, CompletionLogWriter, FixedClock, Partnership};
    use assert_matches::assert_matches;
    use chrono::NaiveDate;
    use std::time::Duration;

    struct Fixture {
        completions: Arc<InMemoryCompletionLog>,
        records: Arc<InMemoryStreakRecordStore>,
        events: Arc<InMemoryEventCollector>,
        manager: StreakCacheManager,
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn fixture(config: EngineConfig) -> Fixture {
        let partnerships = Arc::new(InMemoryPartnershipDirectory::new());
        partnerships.insert(Partnership::new("p", "alice", "bob"));
        let completions = Arc::new(InMemoryCompletionLog::new());
        let records = Arc::new(InMemoryStreakRecordStore::new());
        let events = Arc::new(InMemoryEventCollector::new());

        let manager =
            StreakCacheManager::with_config(config, partnerships, completions.clone(), records.clone())
                .with_clock(Arc::new(FixedClock::new(day("2024-01-03"))))
                .with_event_publisher(events.clone());

        Fixture {
            completions,
            records,
            events,
            manager,
        }
    }

    async fn log_both(completions: &InMemoryCompletionLog, date: &str) {
        for user in ["alice", "bob"] {
            completions
                .upsert(CompletionLog::new("h", user, day(date), true))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_tiers_in_order() {
        let f = fixture(EngineConfig::default());
        log_both(&f.completions, "2024-01-03").await;
        let (h, p) = (HabitId::new("h"), PartnershipId::new("p"));

        let first = f.manager.lookup(&h, &p).await.unwrap();
        assert_eq!(first.tier, CacheTier::Derived);
        assert_eq!(first.state.current_streak, 1);

        let second = f.manager.lookup(&h, &p).await.unwrap();
        assert_eq!(second.tier, CacheTier::Memory);

        f.manager.invalidate(&h);
        let third = f.manager.lookup(&h, &p).await.unwrap();
        assert_eq!(third.tier, CacheTier::Store);
        assert_eq!(f.records.upsert_count(), 1);
    }

    #[tokio::test]
    async fn test_cold_start_counts_each_tier_once() {
        let f = fixture(EngineConfig::default());
        let (h, p) = (HabitId::new("h"), PartnershipId::new("p"));
        f.manager.get_streak(&h, &p).await.unwrap();

        let metrics = f.manager.stats().metrics;
        assert_eq!(metrics.memory_misses, 1);
        assert_eq!(metrics.memory_hits, 0);
        assert_eq!(metrics.store_misses, 1);
        assert_eq!(metrics.store_hits, 0);
        assert_eq!(metrics.cold_start_derivations, 1);

        f.manager.get_streak(&h, &p).await.unwrap();
        let metrics = f.manager.stats().metrics;
        assert_eq!(metrics.memory_hits, 1);
        assert_eq!(metrics.memory_misses, 1);
        assert_eq!(metrics.memory_hit_ratio, 0.5);
    }

    #[tokio::test]
    async fn test_recompute_invalidates_memory() {
        let f = fixture(EngineConfig::default());
        let (h, p) = (HabitId::new("h"), PartnershipId::new("p"));
        f.manager.get_streak(&h, &p).await.unwrap();

        log_both(&f.completions, "2024-01-03").await;
        let fresh = f.manager.recompute_and_persist(&h, &p).await.unwrap();
        assert_eq!(fresh.current_streak, 1);
        assert_eq!(f.manager.stats().memory.total_entries, 0);

        let next = f.manager.lookup(&h, &p).await.unwrap();
        assert_eq!(next.tier, CacheTier::Store);
        assert_eq!(next.state.current_streak, 1);
    }

    #[tokio::test]
    async fn test_unknown_partnership_is_not_found() {
        let f = fixture(EngineConfig::default());
        let err = f
            .manager
            .get_streak(&HabitId::new("h"), &PartnershipId::new("missing"))
            .await
            .unwrap_err();
        assert_matches!(err, Error::NotFound { entity: "partnership", .. });
        assert_eq!(f.records.upsert_count(), 0);
    }

    #[tokio::test]
    async fn test_store_timeout_surfaces_as_unavailable() {
        let f = fixture(EngineConfig::default().with_store_timeout(Some(Duration::from_millis(10))));
        f.completions.set_latency(Duration::from_millis(200));

        let err = f
            .manager
            .get_streak(&HabitId::new("h"), &PartnershipId::new("p"))
            .await
            .unwrap_err();
        assert_matches!(err, Error::StoreUnavailable { store: "completion log", .. });
        assert_eq!(f.manager.stats().metrics.errors, 1);
    }

    #[tokio::test]
    async fn test_events_published_on_derivation() {
        let f = fixture(EngineConfig::default());
        let (h, p) = (HabitId::new("h"), PartnershipId::new("p"));
        f.manager.get_streak(&h, &p).await.unwrap();
        f.manager.recompute_and_persist(&h, &p).await.unwrap();

        let events = f.events.events_of_type("StreakDerived");
        assert_eq!(events.len(), 2);
        assert_matches!(
            &events[0],
            StreakEvent::StreakDerived { reason: DerivationReason::ColdStart, .. }
        );
        assert_matches!(
            &events[1],
            StreakEvent::StreakDerived { reason: DerivationReason::Forced, .. }
        );
    }

    #[tokio::test]
    async fn test_events_can_be_disabled() {
        let f = fixture(EngineConfig::default().with_events(false));
        f.manager
            .get_streak(&HabitId::new("h"), &PartnershipId::new("p"))
            .await
            .unwrap();
        assert!(f.events.is_empty());
    }

    #[tokio::test]
    async fn test_get_streaks_batch() {
        let f = fixture(EngineConfig::default());
        log_both(&f.completions, "2024-01-03").await;
        let habits = vec![HabitId::new("h"), HabitId::new("other")];

        let streaks = f
            .manager
            .get_streaks(&habits, &PartnershipId::new("p"))
            .await
            .unwrap();
        assert_eq!(streaks.len(), 2);
        assert_eq!(streaks[0].1.current_streak, 1);
        assert_eq!(streaks[1].1.current_streak, 0);
        assert_eq!(f.manager.stats().lock_handles, 2);
    }

    mod properties {
        use super::*;
        use crate::domain::{CompletionRecord, UserId};
        use crate::streak::derive_streak;
        use proptest::prelude::*;

        fn record_strategy() -> impl Strategy<Value = CompletionRecord> {
            (0usize..2, 0i64..10, any::<bool>()).prop_map(|(user, offset, completed)| {
                let log_date = day("2023-12-25") + chrono::Duration::days(offset);
                CompletionRecord {
                    user_id: UserId::new(["alice", "bob"][user]),
                    log_date: Some(log_date.format("%Y-%m-%d").to_string()),
                    completed,
                }
            })
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            /// Property: every tier answers with what direct derivation gives.
            #[test]
            fn prop_tiers_agree_with_derivation(
                records in prop::collection::vec(record_strategy(), 0..40),
            ) {
                let f = fixture(EngineConfig::default());
                let habit = HabitId::new("h");
                let partnership_id = PartnershipId::new("p");
                for record in &records {
                    f.completions.insert_raw(&habit, record.clone());
                }
                let expected = derive_streak(
                    &Partnership::new("p", "alice", "bob"),
                    &records,
                    day("2024-01-03"),
                    chrono::Utc::now(),
                );

                let derived = tokio_test::block_on(f.manager.lookup(&habit, &partnership_id));
                let derived = tokio_test::assert_ok!(derived);
                prop_assert_eq!(derived.tier, CacheTier::Derived);
                prop_assert!(derived.state.same_streak(&expected));

                let cached = tokio_test::block_on(f.manager.lookup(&habit, &partnership_id));
                let cached = tokio_test::assert_ok!(cached);
                prop_assert_eq!(cached.tier, CacheTier::Memory);
                prop_assert_eq!(cached.state, derived.state);

                f.manager.invalidate(&habit);
                let stored = tokio_test::block_on(f.manager.lookup(&habit, &partnership_id));
                let stored = tokio_test::assert_ok!(stored);
                prop_assert_eq!(stored.tier, CacheTier::Store);
                prop_assert!(stored.state.same_streak(&expected));
            }
        }
    }
}
