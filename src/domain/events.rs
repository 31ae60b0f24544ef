//! Domain Events
//!
//! Immutable records of things the streak engine did. Used for audit logging
//! and to let the excluded notification layer react to streak changes.
//!
//! # Example
//!
//! ```ignore
//! let event = StreakEvent::derived(&habit_id, &partnership_id, &state, DerivationReason::ColdStart);
//! event_publisher.publish(event).await?;
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ports::{CompletionLog, HabitId, PartnershipId, StreakState};

/// Why a derivation ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivationReason {
    /// Neither cache tier held the habit
    ColdStart,
    /// Explicit recompute (recalculate action or after a check-in)
    Forced,
}

impl std::fmt::Display for DerivationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DerivationReason::ColdStart => write!(f, "cold_start"),
            DerivationReason::Forced => write!(f, "forced"),
        }
    }
}

/// Domain event emitted by the streak engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreakEvent {
    /// A streak was derived from completion history and persisted.
    StreakDerived {
        habit_id: String,
        partnership_id: String,
        reason: DerivationReason,
        current_streak: u32,
        longest_streak: u32,
        last_both_completed_date: Option<NaiveDate>,
        timestamp: DateTime<Utc>,
    },

    /// A partner logged (or corrected) a completion through the check-in path.
    CompletionLogged {
        habit_id: String,
        user_id: String,
        log_date: NaiveDate,
        completed: bool,
        timestamp: DateTime<Utc>,
    },
}

impl StreakEvent {
    pub fn derived(
        habit_id: &HabitId,
        partnership_id: &PartnershipId,
        state: &StreakState,
        reason: DerivationReason,
    ) -> Self {
        StreakEvent::StreakDerived {
            habit_id: habit_id.to_string(),
            partnership_id: partnership_id.to_string(),
            reason,
            current_streak: state.current_streak,
            longest_streak: state.longest_streak,
            last_both_completed_date: state.last_both_completed_date,
            timestamp: state.updated_at,
        }
    }

    pub fn logged(log: &CompletionLog) -> Self {
        StreakEvent::CompletionLogged {
            habit_id: log.habit_id.to_string(),
            user_id: log.user_id.to_string(),
            log_date: log.log_date,
            completed: log.completed,
            timestamp: Utc::now(),
        }
    }

    /// Event type name, matching the serde tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            StreakEvent::StreakDerived { .. } => "StreakDerived",
            StreakEvent::CompletionLogged { .. } => "CompletionLogged",
        }
    }

    /// A derivation that found an earlier streak but none running now.
    pub fn is_lapsed(&self) -> bool {
        matches!(
            self,
            StreakEvent::StreakDerived {
                current_streak: 0,
                longest_streak,
                ..
            } if *longest_streak > 0
        )
    }

    pub fn habit_id(&self) -> &str {
        match self {
            StreakEvent::StreakDerived { habit_id, .. }
            | StreakEvent::CompletionLogged { habit_id, .. } => habit_id,
        }
    }
}
