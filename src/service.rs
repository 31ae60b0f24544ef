//! Check-in service
//!
//! The write path in front of the streak cache. A check-in is upserted into
//! the completion log, the habit's memory entry is dropped, and the streak is
//! recomputed so the persistent tier reflects the new log.
//!
//! Writes that reach the completion log any other way leave the persistent
//! tier stale until the next recompute.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::cache::StreakCacheManager;
use crate::domain::{
    CompletionLog, CompletionLogWriter, HabitId, PartnershipDirectory, PartnershipId,
    StreakEvent, StreakState,
};
use crate::error::{Error, Result};

/// Write path that keeps streaks in step with check-ins
pub struct CheckInService {
    writer: Arc<dyn CompletionLogWriter>,
    partnerships: Arc<dyn PartnershipDirectory>,
    streaks: Arc<StreakCacheManager>,
}

impl CheckInService {
    pub fn new(
        writer: Arc<dyn CompletionLogWriter>,
        partnerships: Arc<dyn PartnershipDirectory>,
        streaks: Arc<StreakCacheManager>,
    ) -> Self {
        Self {
            writer,
            partnerships,
            streaks,
        }
    }

    pub fn streaks(&self) -> &StreakCacheManager {
        &self.streaks
    }

    /// Record a completion and return the recomputed streak.
    #[instrument(skip(self, log), fields(habit_id = %log.habit_id, user_id = %log.user_id, log_date = %log.log_date))]
    pub async fn log_completion(
        &self,
        partnership_id: &PartnershipId,
        log: CompletionLog,
    ) -> Result<StreakState> {
        let partnership = self
            .streaks
            .bounded("partnership directory", self.partnerships.members(partnership_id))
            .await?;
        if !partnership.contains(&log.user_id) {
            return Err(Error::NotFound {
                entity: "partnership member",
                id: log.user_id.to_string(),
            });
        }

        self.streaks
            .bounded("completion log", self.writer.upsert(log.clone()))
            .await?;
        self.streaks.invalidate(&log.habit_id);
        self.streaks.publish(StreakEvent::logged(&log)).await;

        let state = self
            .streaks
            .recompute_and_persist(&log.habit_id, partnership_id)
            .await?;

        info!(
            current_streak = state.current_streak,
            longest_streak = state.longest_streak,
            "Check-in recorded"
        );
        Ok(state)
    }

    /// Explicit "recalculate" action.
    pub async fn recalculate(
        &self,
        habit_id: &HabitId,
        partnership_id: &PartnershipId,
    ) -> Result<StreakState> {
        self.streaks
            .recompute_and_persist(habit_id, partnership_id)
            .await
    }
}
