//! Streak Derivation
//!
//! Pure derivation of a [`StreakState`] from a habit's full completion
//! history. No I/O; the cache manager feeds it records and the current day.
//!
//! # Rules
//!
//! - A day qualifies when both partners have a `completed = true` record for it.
//! - The current streak is anchored on today, or on yesterday when today does
//!   not qualify yet, and walks backwards over consecutive qualifying days.
//! - The longest streak is the longest consecutive run anywhere in history.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, trace};

use crate::domain::{CompletionRecord, Partnership, StreakState, UserId};

/// A record with a usable day.
#[derive(Debug, Clone, Copy)]
struct ValidRecord<'a> {
    user_id: &'a UserId,
    day: NaiveDate,
    completed: bool,
}

impl<'a> ValidRecord<'a> {
    fn from_record(record: &'a CompletionRecord) -> Option<Self> {
        match record.parse_day() {
            Ok(day) => Some(Self {
                user_id: &record.user_id,
                day,
                completed: record.completed,
            }),
            Err(e) => {
                trace!(error = %e, "Skipping completion record");
                None
            }
        }
    }
}

/// Days on which both partners completed the habit, ascending.
///
/// Records without a usable date are skipped. Duplicate records for the same
/// (user, day) count once.
pub fn both_completed_days(
    partnership: &Partnership,
    records: &[CompletionRecord],
) -> BTreeSet<NaiveDate> {
    let mut per_day: BTreeMap<NaiveDate, [bool; 2]> = BTreeMap::new();
    let mut skipped = 0usize;

    for record in records {
        let Some(valid) = ValidRecord::from_record(record) else {
            skipped += 1;
            continue;
        };
        if !valid.completed {
            continue;
        }

        let flags = per_day.entry(valid.day).or_default();
        if valid.user_id == &partnership.user_a {
            flags[0] = true;
        }
        if valid.user_id == &partnership.user_b {
            flags[1] = true;
        }
    }

    if skipped > 0 {
        debug!(
            partnership_id = %partnership.id,
            skipped,
            "Skipped completion records without a usable date"
        );
    }

    per_day
        .into_iter()
        .filter(|(_, [a, b])| *a && *b)
        .map(|(day, _)| day)
        .collect()
}

/// Length of the longest run of consecutive days.
pub fn longest_run(days: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0u32;
    let mut run = 0u32;
    let mut prev: Option<NaiveDate> = None;

    for &day in days {
        run = match prev.and_then(|p| p.succ_opt()) {
            Some(next) if next == day => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        prev = Some(day);
    }

    longest
}

/// Current run anchored on `today` or yesterday.
///
/// Returns the run length and its first day, or `(0, None)` when neither
/// today nor yesterday qualifies.
pub fn current_run(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> (u32, Option<NaiveDate>) {
    let anchor = if days.contains(&today) {
        Some(today)
    } else {
        today.pred_opt().filter(|yesterday| days.contains(yesterday))
    };

    let Some(anchor) = anchor else {
        return (0, None);
    };

    let mut count = 0u32;
    let mut start = anchor;
    let mut cursor = Some(anchor);
    while let Some(day) = cursor.filter(|d| days.contains(d)) {
        count += 1;
        start = day;
        cursor = day.pred_opt();
    }

    (count, Some(start))
}

/// Derive the streak state for a habit.
pub fn derive_streak(
    partnership: &Partnership,
    records: &[CompletionRecord],
    today: NaiveDate,
    now: DateTime<Utc>,
) -> StreakState {
    let days = both_completed_days(partnership, records);

    let Some(&last) = days.last() else {
        return StreakState::empty(now);
    };

    let (current_streak, streak_started_at) = current_run(&days, today);

    StreakState {
        current_streak,
        // The current run is one of the runs scanned here.
        longest_streak: longest_run(&days),
        streak_started_at,
        last_both_completed_date: Some(last),
        updated_at: now,
    }
}

// =============================================================================
// Tests
// =============================================================================
