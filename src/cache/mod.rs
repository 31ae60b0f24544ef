//! Layered Streak Cache
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     StreakCacheManager                            │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  Memory tier        │ Streak record store   │ Derivation         │
//! │  ┌──────────────┐   │ ┌──────────────────┐  │ ┌────────────────┐ │
//! │  │ DashMap + TTL│ → │ │ one record/habit │ → │ │ completion log │ │
//! │  │ (60s)        │   │ │ (persistent)     │  │ │ + per-habit    │ │
//! │  └──────────────┘   │ └──────────────────┘  │ │   lock         │ │
//! │                     │                       │ └────────────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The memory tier is per process. Nothing keeps copies in separate
//! processes coherent.

mod entry;
mod locks;
mod manager;
mod memory;
mod metrics;

pub use entry::MemoryEntry;
pub use locks::{HabitGuard, HabitLocks};
pub use manager::{CacheStats, CacheTier, StreakCacheManager, StreakLookup};
pub use memory::{MemoryLookup, MemoryStats, MemoryTier};
pub use metrics::{CacheMetrics, MetricsSnapshot};
