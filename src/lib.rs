//! pairstreak - Partner Habit Streak Engine
//!
//! Computes and caches streaks for habits shared by two partners. A streak
//! counts consecutive days on which **both** partners completed the habit.
//!
//! # Architecture
//!
//! ```text
//! read:  StreakCacheManager → memory tier → streak record store → derivation
//! write: CheckInService → completion log → invalidate → recompute & persist
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - In-memory implementations of the domain ports
//! - [`cache`] - Layered cache with per-habit locking
//! - [`config`] - Engine configuration
//! - [`domain`] - Value objects, ports and events
//! - [`error`] - Error types
//! - [`service`] - Check-in write path
//! - [`streak`] - Streak derivation

pub mod adapters;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod streak;

// Re-export commonly used types
pub use cache::{CacheTier, StreakCacheManager};
pub use config::EngineConfig;
pub use domain::{HabitId, PartnershipId, StreakState, UserId};
pub use error::{Error, Result};
pub use service::CheckInService;
