//! Infrastructure Adapters
//!
//! Adapter implementations of the domain ports, following the Port/Adapter
//! (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │ PartnershipDirectory │ CompletionLogStore │ StreakRecordStore│ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ InMemoryPartnershipDirectory │ InMemoryCompletionLog       │ │
//! │  │ InMemoryStreakRecordStore    │ LoggingEventPublisher       │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Database-backed adapters live with the REST service that owns the
//! document store; they implement the same ports.

mod event_publisher;
mod memory;

pub use event_publisher::{InMemoryEventCollector, LoggingEventPublisher};
pub use memory::{
    InMemoryCompletionLog, InMemoryPartnershipDirectory, InMemoryStreakRecordStore, StoredStreak,
};
