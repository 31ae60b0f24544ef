//! Domain Layer
//!
//! Value objects, ports and events for the streak engine.
//!
//! - **Ports** (`ports.rs`) - Trait abstractions for external collaborators
//! - **Events** (`events.rs`) - Domain events for audit and decoupling
//!
//! # Usage
//!
//! ```ignore
//! use pairstreak::domain::{CompletionLogStore, HabitId};
//!
//! async fn history<S: CompletionLogStore>(store: &S, habit: &HabitId) -> Result<usize> {
//!     Ok(store.completions_for_habit(habit).await?.len())
//! }
//! ```

pub mod events;
pub mod ports;

pub use events::{DerivationReason, StreakEvent};
pub use ports::{
    Clock, CompletionLog, CompletionLogStore, CompletionLogWriter, CompletionRecord,
    EventPublisher, FixedClock, HabitId, Partnership, PartnershipDirectory, PartnershipId,
    StreakRecordStore, StreakState, SystemClock, UserId,
};
