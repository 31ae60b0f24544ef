//! Streak derivation.
//!
//! Turns a habit's completion history into a [`StreakState`](crate::domain::StreakState).

pub mod calculator;
mod proptest;

pub use calculator::{both_completed_days, current_run, derive_streak, longest_run};
