//! Domain Ports (DDD Port/Adapter Pattern)
//!
//! This module defines the value objects the streak engine works with and the
//! traits (ports) through which it reaches its external collaborators.
//! Infrastructure adapters implement these traits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Domain Layer                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │ PartnershipDirectory │ CompletionLogStore │ ...     │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                  Adapters (Impls)                    │    │
//! │  │  InMemoryCompletionLog │ InMemoryStreakRecordStore  │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// Identifiers
// =============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Habit identifier (value object).
    HabitId
);

string_id!(
    /// Partnership identifier (value object).
    PartnershipId
);

string_id!(
    /// User identifier (value object).
    UserId
);

// =============================================================================
// Value Objects
// =============================================================================

/// The two members of a partnership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partnership {
    pub id: PartnershipId,
    pub user_a: UserId,
    pub user_b: UserId,
}

impl Partnership {
    pub fn new(
        id: impl Into<PartnershipId>,
        user_a: impl Into<UserId>,
        user_b: impl Into<UserId>,
    ) -> Self {
        Self {
            id: id.into(),
            user_a: user_a.into(),
            user_b: user_b.into(),
        }
    }

    /// Check whether a user belongs to this partnership.
    pub fn contains(&self, user: &UserId) -> bool {
        &self.user_a == user || &self.user_b == user
    }
}

/// Offset-less timestamp layouts found in stored completion logs.
const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// A completion record as returned by the completion log store.
///
/// The date is kept raw because stored documents are not guaranteed to carry
/// a usable one; see [`CompletionRecord::day`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub user_id: UserId,
    #[serde(default)]
    pub log_date: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

impl CompletionRecord {
    pub fn new(user_id: impl Into<UserId>, log_date: impl Into<String>, completed: bool) -> Self {
        Self {
            user_id: user_id.into(),
            log_date: Some(log_date.into()),
            completed,
        }
    }

    /// The calendar day this record refers to.
    ///
    /// Accepts `YYYY-MM-DD`, an RFC 3339 timestamp (its UTC date), or a
    /// timestamp without offset, which is taken to be UTC already.
    pub fn parse_day(&self) -> Result<NaiveDate> {
        let raw = self
            .log_date
            .as_deref()
            .map(str::trim)
            .ok_or_else(|| Error::MalformedRecord(format!("no date for user {}", self.user_id)))?;

        if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Ok(day);
        }
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(ts.with_timezone(&Utc).date_naive());
        }
        NAIVE_TIMESTAMP_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .map(|ts| ts.date())
            .ok_or_else(|| {
                Error::MalformedRecord(format!("unparseable date {:?} for user {}", raw, self.user_id))
            })
    }

    /// [`parse_day`](Self::parse_day), discarding the reason.
    pub fn day(&self) -> Option<NaiveDate> {
        self.parse_day().ok()
    }
}

/// A completion log written by the check-in path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionLog {
    pub habit_id: HabitId,
    pub user_id: UserId,
    pub log_date: NaiveDate,
    pub completed: bool,
}

impl CompletionLog {
    pub fn new(
        habit_id: impl Into<HabitId>,
        user_id: impl Into<UserId>,
        log_date: NaiveDate,
        completed: bool,
    ) -> Self {
        Self {
            habit_id: habit_id.into(),
            user_id: user_id.into(),
            log_date,
            completed,
        }
    }

    /// The read-side form of this log.
    pub fn to_record(&self) -> CompletionRecord {
        CompletionRecord {
            user_id: self.user_id.clone(),
            log_date: Some(self.log_date.format("%Y-%m-%d").to_string()),
            completed: self.completed,
        }
    }
}

/// Derived streak state for one habit.
///
/// Invariant: `longest_streak >= current_streak`. Both are zero and both
/// dates are absent when no day ever had both partners completing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub streak_started_at: Option<NaiveDate>,
    pub last_both_completed_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

impl StreakState {
    /// A state for a habit with no both-completed days.
    pub fn empty(updated_at: DateTime<Utc>) -> Self {
        Self {
            current_streak: 0,
            longest_streak: 0,
            streak_started_at: None,
            last_both_completed_date: None,
            updated_at,
        }
    }

    /// Compare everything except `updated_at`.
    pub fn same_streak(&self, other: &StreakState) -> bool {
        self.current_streak == other.current_streak
            && self.longest_streak == other.longest_streak
            && self.streak_started_at == other.streak_started_at
            && self.last_both_completed_date == other.last_both_completed_date
    }
}

// =============================================================================
// Clock Port
// =============================================================================

/// Source of "now" and "today".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// The current calendar day (UTC).
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a calendar day, for tests and offline evaluation.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    today: NaiveDate,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        // The day is pinned; the time of day still moves.
        let time = Utc::now().time();
        self.today.and_time(time).and_utc()
    }

    fn today(&self) -> NaiveDate {
        self.today
    }
}

// =============================================================================
// Partnership Port
// =============================================================================

/// Port for resolving partnership membership.
#[async_trait]
pub trait PartnershipDirectory: Send + Sync {
    /// Get both members of a partnership.
    ///
    /// Returns `Error::NotFound` for an unknown partnership.
    async fn members(&self, partnership_id: &PartnershipId) -> Result<Partnership>;
}

// =============================================================================
// Completion Log Ports
// =============================================================================

/// Port for reading completion history.
#[async_trait]
pub trait CompletionLogStore: Send + Sync {
    /// All completion records for a habit, regardless of date.
    async fn completions_for_habit(&self, habit_id: &HabitId) -> Result<Vec<CompletionRecord>>;
}

/// Port for the check-in write path.
#[async_trait]
pub trait CompletionLogWriter: Send + Sync {
    /// Insert or replace the log for (habit, user, date).
    async fn upsert(&self, log: CompletionLog) -> Result<()>;
}

// =============================================================================
// Streak Record Port
// =============================================================================

/// Port for the persistent streak record tier.
#[async_trait]
pub trait StreakRecordStore: Send + Sync {
    /// Read the stored streak for a habit.
    async fn read(&self, habit_id: &HabitId) -> Result<Option<StreakState>>;

    /// Store the streak for a habit, overwriting any previous record.
    async fn upsert(
        &self,
        habit_id: &HabitId,
        partnership_id: &PartnershipId,
        state: &StreakState,
    ) -> Result<()>;
}

// =============================================================================
// Event Publisher Port
// =============================================================================

use super::events::StreakEvent;

/// Port for publishing domain events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a domain event.
    async fn publish(&self, event: StreakEvent) -> Result<()>;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_habit_id() {
        let id = HabitId::new("habit-1");
        assert_eq!(id.as_str(), "habit-1");
        assert_eq!(id.to_string(), "habit-1");
        assert_eq!(HabitId::from("habit-1"), id);
    }

    #[test]
    fn test_partnership_contains() {
        let p = Partnership::new("p-1", "alice", "bob");
        assert!(p.contains(&UserId::new("alice")));
        assert!(p.contains(&UserId::new("bob")));
        assert!(!p.contains(&UserId::new("carol")));
    }

    #[test]
    fn test_record_day_plain_date() {
        let r = CompletionRecord::new("alice", "2024-01-03", true);
        assert_eq!(r.day(), Some(day("2024-01-03")));
    }

    #[test]
    fn test_record_day_timestamp_uses_utc_date() {
        let r = CompletionRecord::new("alice", "2024-01-03T23:30:00-02:00", true);
        assert_eq!(r.day(), Some(day("2024-01-04")));
    }

    #[test]
    fn test_record_day_naive_timestamp() {
        for raw in [
            "2024-01-03T08:15:00",
            "2024-01-03T23:59:59.123456",
            "2024-01-03 08:15:00",
        ] {
            let r = CompletionRecord::new("alice", raw, true);
            assert_eq!(r.day(), Some(day("2024-01-03")), "{}", raw);
        }
    }

    #[test]
    fn test_record_day_missing_or_malformed() {
        let missing = CompletionRecord {
            user_id: UserId::new("alice"),
            log_date: None,
            completed: true,
        };
        assert_eq!(missing.day(), None);
        assert_eq!(CompletionRecord::new("alice", "yesterday", true).day(), None);
        assert_eq!(CompletionRecord::new("alice", "2024-13-40", true).day(), None);
        assert_eq!(CompletionRecord::new("alice", "2024-01-03T25:00:00", true).day(), None);
    }

    #[test]
    fn test_parse_day_reports_malformed() {
        let err = CompletionRecord::new("alice", "soon", true).parse_day().unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(_)));
    }

    #[test]
    fn test_completion_log_to_record() {
        let log = CompletionLog::new("h", "alice", day("2024-02-09"), true);
        let record = log.to_record();
        assert_eq!(record.day(), Some(day("2024-02-09")));
        assert!(record.completed);
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock::new(day("2024-02-10"));
        assert_eq!(clock.today(), day("2024-02-10"));
        assert_eq!(clock.now().date_naive(), day("2024-02-10"));
    }

    #[test]
    fn test_streak_state_same_streak_ignores_timestamp() {
        let a = StreakState::empty(Utc::now());
        let mut b = a.clone();
        b.updated_at = a.updated_at + chrono::Duration::seconds(5);
        assert!(a.same_streak(&b));
    }
}
