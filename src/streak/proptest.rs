//! Property-Based Tests for Streak Derivation
//!
//! # Test Properties
//!
//! 1. **Idempotence**: deriving twice gives the same streak (ignoring `updated_at`)
//! 2. **Invariant**: `longest_streak >= current_streak`
//! 3. **Monotonic longest**: earlier history never lowers the longest streak
//! 4. **Exactness**: results match a brute-force reference

#![cfg(test)]

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate, Utc};
use proptest::prelude::*;

use super::calculator::{both_completed_days, derive_streak};
use crate::domain::{CompletionRecord, Partnership, UserId};

// =============================================================================
// Property Strategies
// =============================================================================

fn base_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn partnership() -> Partnership {
    Partnership::new("p-prop", "alice", "bob")
}

/// One record: user index (2 = outsider), day offset, completed, malformed.
fn record_strategy(days: std::ops::Range<i64>) -> impl Strategy<Value = CompletionRecord> {
    (0usize..3, days, any::<bool>(), prop::bool::weighted(0.05)).prop_map(
        |(user, offset, completed, malformed)| {
            let user_id = ["alice", "bob", "carol"][user];
            let log_date = if malformed {
                None
            } else {
                Some((base_day() + Duration::days(offset)).format("%Y-%m-%d").to_string())
            };
            CompletionRecord {
                user_id: UserId::new(user_id),
                log_date,
                completed,
            }
        },
    )
}

fn records_strategy(days: std::ops::Range<i64>) -> impl Strategy<Value = Vec<CompletionRecord>> {
    prop::collection::vec(record_strategy(days), 0..120)
}

// =============================================================================
// Reference Implementation
// =============================================================================

fn brute_force_longest(days: &BTreeSet<NaiveDate>) -> u32 {
    days.iter()
        .map(|&start| {
            let mut len = 0u32;
            let mut d = start;
            while days.contains(&d) {
                len += 1;
                d += Duration::days(1);
            }
            len
        })
        .max()
        .unwrap_or(0)
}

fn brute_force_current(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let count_back = |anchor: NaiveDate| {
        let mut len = 0u32;
        let mut d = anchor;
        while days.contains(&d) {
            len += 1;
            d -= Duration::days(1);
        }
        len
    };
    match count_back(today) {
        0 => count_back(today - Duration::days(1)),
        n => n,
    }
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: Deriving twice over the same records gives the same streak.
    #[test]
    fn prop_derivation_idempotent(
        records in records_strategy(0..40),
        today_offset in 0i64..45,
    ) {
        let today = base_day() + Duration::days(today_offset);
        let first = derive_streak(&partnership(), &records, today, Utc::now());
        let second = derive_streak(&partnership(), &records, today, Utc::now());
        prop_assert!(first.same_streak(&second), "{:?} != {:?}", first, second);
    }

    /// Property: longest is never below current.
    #[test]
    fn prop_longest_at_least_current(
        records in records_strategy(0..40),
        today_offset in 0i64..45,
    ) {
        let today = base_day() + Duration::days(today_offset);
        let state = derive_streak(&partnership(), &records, today, Utc::now());
        prop_assert!(state.longest_streak >= state.current_streak);
        if state.longest_streak == 0 {
            prop_assert_eq!(state.streak_started_at, None);
            prop_assert_eq!(state.last_both_completed_date, None);
        }
    }

    /// Property: Results match the brute-force reference.
    #[test]
    fn prop_matches_reference(
        records in records_strategy(0..40),
        today_offset in 40i64..45,
    ) {
        let today = base_day() + Duration::days(today_offset);
        let days = both_completed_days(&partnership(), &records);
        let state = derive_streak(&partnership(), &records, today, Utc::now());

        prop_assert_eq!(state.longest_streak, brute_force_longest(&days));
        prop_assert_eq!(state.current_streak, brute_force_current(&days, today));
        prop_assert_eq!(state.last_both_completed_date, days.last().copied());
        if let Some(start) = state.streak_started_at {
            let anchor = start + Duration::days(state.current_streak as i64 - 1);
            prop_assert!(anchor >= today - Duration::days(1));
        }
    }

    /// Property: Adding records for earlier dates never lowers the longest
    /// streak, and never pushes it past the true longest run.
    #[test]
    fn prop_earlier_history_monotonic(
        recent in records_strategy(20..40),
        earlier in records_strategy(0..20),
    ) {
        let today = base_day() + Duration::days(40);
        let before = derive_streak(&partnership(), &recent, today, Utc::now());

        let mut combined = earlier.clone();
        combined.extend(recent.iter().cloned());
        let after = derive_streak(&partnership(), &combined, today, Utc::now());

        prop_assert!(after.longest_streak >= before.longest_streak);
        let days = both_completed_days(&partnership(), &combined);
        prop_assert_eq!(after.longest_streak, brute_force_longest(&days));
    }
}
