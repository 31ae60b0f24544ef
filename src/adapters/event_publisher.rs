//! Event Publisher Adapters
//!
//! Implements the `EventPublisher` port with tracing and in-memory backends.

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::domain::{EventPublisher, StreakEvent};
use crate::error::Result;

/// Logging-based event publisher.
///
/// Writes each event as structured tracing fields. A derivation that finds a
/// lapsed streak is logged at info even by a debug-level publisher.
#[derive(Debug, Clone)]
pub struct LoggingEventPublisher {
    /// Whether to log events at info level (true) or debug level (false)
    info_level: bool,
}

macro_rules! emit {
    ($info:expr, $($arg:tt)+) => {
        if $info {
            info!($($arg)+)
        } else {
            debug!($($arg)+)
        }
    };
}

impl LoggingEventPublisher {
    /// Create a publisher that logs at info level.
    pub fn info_level() -> Self {
        Self { info_level: true }
    }

    /// Create a publisher that logs at debug level.
    pub fn debug_level() -> Self {
        Self { info_level: false }
    }
}

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish(&self, event: StreakEvent) -> Result<()> {
        let lapsed = event.is_lapsed();
        match &event {
            StreakEvent::StreakDerived {
                habit_id,
                partnership_id,
                reason,
                current_streak,
                longest_streak,
                last_both_completed_date,
                ..
            } => emit!(
                self.info_level || lapsed,
                habit_id = %habit_id,
                partnership_id = %partnership_id,
                reason = %reason,
                current_streak = *current_streak,
                longest_streak = *longest_streak,
                last_both_completed_date = ?last_both_completed_date,
                lapsed,
                "Streak derived"
            ),
            StreakEvent::CompletionLogged {
                habit_id,
                user_id,
                log_date,
                completed,
                ..
            } => emit!(
                self.info_level,
                habit_id = %habit_id,
                user_id = %user_id,
                log_date = %log_date,
                completed = *completed,
                "Completion logged"
            ),
        }

        Ok(())
    }
}

/// In-memory event collector for testing.
#[derive(Debug, Default)]
pub struct InMemoryEventCollector {
    events: RwLock<Vec<StreakEvent>>,
}

impl InMemoryEventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Get events of a specific type.
    pub fn events_of_type(&self, event_type: &str) -> Vec<StreakEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventCollector {
    async fn publish(&self, event: StreakEvent) -> Result<()> {
        self.events.write().push(event);
        Ok(())
    }
}
