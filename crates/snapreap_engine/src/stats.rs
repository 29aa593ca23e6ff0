//! Deletion statistics.
//!
//! Counters are atomic so worker threads can record outcomes while the run
//! is in progress. A run resets them at start and reads them once at the end.

use std::sync::atomic::{AtomicU64, Ordering};

/// Accumulated results of a deletion run.
#[derive(Debug, Default)]
pub struct DeletionStats {
    /// Nodes reached by the delete phase, whatever their outcome.
    deleted_count: AtomicU64,
    /// Sum of the approximate data length of those nodes.
    deleted_bytes: AtomicU64,

    // Per-outcome counters
    removed: AtomicU64,
    already_absent: AtomicU64,
    version_mismatches: AtomicU64,
    failures: AtomicU64,
    skipped: AtomicU64,
    retries: AtomicU64,
}

impl DeletionStats {
    /// Creates zeroed stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        for counter in [
            &self.deleted_count,
            &self.deleted_bytes,
            &self.removed,
            &self.already_absent,
            &self.version_mismatches,
            &self.failures,
            &self.skipped,
            &self.retries,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    // === Increment methods ===

    /// Records a node reached by the delete phase.
    pub(crate) fn record_node(&self, bytes: u64) {
        self.deleted_count.fetch_add(1, Ordering::Relaxed);
        self.deleted_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_removed(&self) {
        self.removed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_already_absent(&self) {
        self.already_absent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_version_mismatch(&self) {
        self.version_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    // === Getter methods ===

    /// Nodes counted as deleted.
    pub fn deleted_count(&self) -> u64 {
        self.deleted_count.load(Ordering::Relaxed)
    }

    /// Approximate bytes counted as freed.
    pub fn deleted_bytes(&self) -> u64 {
        self.deleted_bytes.load(Ordering::Relaxed)
    }

    /// Deletes the live service acknowledged.
    pub fn removed(&self) -> u64 {
        self.removed.load(Ordering::Relaxed)
    }

    /// Nodes already gone from the live service.
    pub fn already_absent(&self) -> u64 {
        self.already_absent.load(Ordering::Relaxed)
    }

    /// Nodes whose live version had moved on.
    pub fn version_mismatches(&self) -> u64 {
        self.version_mismatches.load(Ordering::Relaxed)
    }

    /// Nodes whose delete failed for any other reason.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Nodes skipped because the run was dry.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Retried delete attempts.
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Returns a point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            deleted_count: self.deleted_count(),
            deleted_bytes: self.deleted_bytes(),
            removed: self.removed(),
            already_absent: self.already_absent(),
            version_mismatches: self.version_mismatches(),
            failures: self.failures(),
            skipped: self.skipped(),
            retries: self.retries(),
        }
    }
}

/// A point-in-time copy of [`DeletionStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Nodes counted as deleted.
    pub deleted_count: u64,
    /// Approximate bytes counted as freed.
    pub deleted_bytes: u64,
    /// Deletes the live service acknowledged.
    pub removed: u64,
    /// Nodes already gone from the live service.
    pub already_absent: u64,
    /// Nodes whose live version had moved on.
    pub version_mismatches: u64,
    /// Nodes whose delete failed for any other reason.
    pub failures: u64,
    /// Nodes skipped because the run was dry.
    pub skipped: u64,
    /// Retried delete attempts.
    pub retries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = DeletionStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn record_and_reset() {
        let stats = DeletionStats::new();
        stats.record_node(100);
        stats.record_node(20);
        stats.record_removed();
        stats.record_version_mismatch();
        assert_eq!(stats.deleted_count(), 2);
        assert_eq!(stats.deleted_bytes(), 120);
        assert_eq!(stats.removed(), 1);
        assert_eq!(stats.version_mismatches(), 1);

        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(DeletionStats::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let s = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    s.record_node(3);
                    s.record_skipped();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(stats.deleted_count(), 800);
        assert_eq!(stats.deleted_bytes(), 2400);
        assert_eq!(stats.skipped(), 800);
    }
}
