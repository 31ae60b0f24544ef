//! Cache Metrics Collection
//!
//! Counters for monitoring how often each tier answers and how often the
//! engine has to derive from scratch.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Cache metrics collector
#[derive(Debug, Default)]
pub struct CacheMetrics {
    // Memory tier
    memory_hits: AtomicU64,
    memory_misses: AtomicU64,
    memory_expired: AtomicU64,

    // Persistent tier
    store_hits: AtomicU64,
    store_misses: AtomicU64,

    // Derivation
    cold_start_derivations: AtomicU64,
    forced_derivations: AtomicU64,
    lock_waits: AtomicU64,

    invalidations: AtomicU64,
    errors: AtomicU64,
}

impl CacheMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_memory_miss(&self) {
        self.memory_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// An expired entry counts as a miss as well.
    pub fn record_memory_expired(&self) {
        self.memory_expired.fetch_add(1, Ordering::Relaxed);
        self.memory_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_hit(&self) {
        self.store_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_miss(&self) {
        self.store_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cold_start(&self) {
        self.cold_start_derivations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forced(&self) {
        self.forced_derivations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lock_wait(&self) {
        self.lock_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn memory_hit_ratio(&self) -> f64 {
        let hits = self.memory_hits.load(Ordering::Relaxed) as f64;
        let total = hits + self.memory_misses.load(Ordering::Relaxed) as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            memory_misses: self.memory_misses.load(Ordering::Relaxed),
            memory_expired: self.memory_expired.load(Ordering::Relaxed),
            memory_hit_ratio: self.memory_hit_ratio(),
            store_hits: self.store_hits.load(Ordering::Relaxed),
            store_misses: self.store_misses.load(Ordering::Relaxed),
            cold_start_derivations: self.cold_start_derivations.load(Ordering::Relaxed),
            forced_derivations: self.forced_derivations.load(Ordering::Relaxed),
            lock_waits: self.lock_waits.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of all cache metrics
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub memory_expired: u64,
    pub memory_hit_ratio: f64,
    pub store_hits: u64,
    pub store_misses: u64,
    pub cold_start_derivations: u64,
    pub forced_derivations: u64,
    pub lock_waits: u64,
    pub invalidations: u64,
    pub errors: u64,
}

impl MetricsSnapshot {
    pub fn derivations(&self) -> u64 {
        self.cold_start_derivations + self.forced_derivations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = CacheMetrics::new();
        assert_eq!(metrics.memory_hit_ratio(), 0.0);
        assert_eq!(metrics.snapshot().derivations(), 0);
    }

    #[test]
    fn test_hit_tracking() {
        let metrics = CacheMetrics::new();
        metrics.record_memory_hit();
        metrics.record_memory_hit();
        metrics.record_memory_hit();
        metrics.record_memory_expired();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.memory_hits, 3);
        assert_eq!(snapshot.memory_misses, 1);
        assert_eq!(snapshot.memory_expired, 1);
        assert!((snapshot.memory_hit_ratio - 0.75).abs() < 0.001);
    }

    #[test]
    fn test_derivation_tracking() {
        let metrics = CacheMetrics::new();
        metrics.record_cold_start();
        metrics.record_forced();
        metrics.record_forced();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cold_start_derivations, 1);
        assert_eq!(snapshot.forced_derivations, 2);
        assert_eq!(snapshot.derivations(), 3);
    }
}
