// Assignment metrics module
//
// Provides lightweight counters for what the engine did to the vault

use crate::services::AssignOutcome;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters for identifier assignment and key migration
///
/// Uses atomic operations so per-document tasks can record results without
/// locks. Logged at the end of each command and when the watcher stops.
#[derive(Debug)]
pub struct Metrics {
    /// Documents that received a fresh identifier
    pub assigned: AtomicUsize,

    /// Documents that already had an identifier
    pub already_present: AtomicUsize,

    /// Documents left alone because of ignore patterns
    pub excluded: AtomicUsize,

    /// Documents whose identifier moved to a new key
    pub migrated: AtomicUsize,

    /// Documents that failed to read or write
    pub failed: AtomicUsize,

    /// Change notifications handled by the watcher
    pub events_handled: AtomicUsize,

    /// Start time
    start_time: Instant,
}

/// Plain copy of the counters at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub assigned: usize,
    pub already_present: usize,
    pub excluded: usize,
    pub migrated: usize,
    pub failed: usize,
    pub events_handled: usize,
}

impl Metrics {
    /// Create a new Metrics instance
    pub fn new() -> Self {
        Self {
            assigned: AtomicUsize::new(0),
            already_present: AtomicUsize::new(0),
            excluded: AtomicUsize::new(0),
            migrated: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            events_handled: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record the outcome of one assignment
    pub fn record_outcome(&self, outcome: &AssignOutcome) {
        let counter = match outcome {
            AssignOutcome::Assigned(_) => &self.assigned,
            AssignOutcome::AlreadyPresent => &self.already_present,
            AssignOutcome::Excluded(_) => &self.excluded,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_excluded(&self) {
        self.excluded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a whole batch left alone, e.g. when the ignore patterns are invalid
    pub fn record_excluded_count(&self, count: usize) {
        self.excluded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_migrated(&self) {
        self.migrated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event(&self) {
        self.events_handled.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            assigned: self.assigned.load(Ordering::Relaxed),
            already_present: self.already_present.load(Ordering::Relaxed),
            excluded: self.excluded.load(Ordering::Relaxed),
            migrated: self.migrated.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            events_handled: self.events_handled.load(Ordering::Relaxed),
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        let snapshot = self.snapshot();
        tracing::info!("=== vaultid summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Notes: {} assigned, {} already had an ID, {} ignored, {} migrated, {} failed",
            snapshot.assigned,
            snapshot.already_present,
            snapshot.excluded,
            snapshot.migrated,
            snapshot.failed
        );
        if snapshot.events_handled > 0 {
            tracing::info!("Change events handled: {}", snapshot.events_handled);
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
