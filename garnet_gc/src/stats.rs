//! GC statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Statistics about collector activity.
#[derive(Debug, Default)]
pub struct GcStats {
    /// Number of collections performed.
    pub collections: AtomicU64,
    /// Number of compactions performed.
    pub compactions: AtomicU64,
    /// Objects marked by the last collection.
    pub last_marked: AtomicU64,
    /// Total time spent collecting (nanoseconds).
    pub gc_time_ns: AtomicU64,
}

impl GcStats {
    /// Create new empty statistics.
    pub const fn new() -> Self {
        Self {
            collections: AtomicU64::new(0),
            compactions: AtomicU64::new(0),
            last_marked: AtomicU64::new(0),
            gc_time_ns: AtomicU64::new(0),
        }
    }

    /// Record a completed collection; returns its 1-based ordinal.
    pub fn record_collection(&self, marked: usize, duration: Duration) -> u64 {
        self.last_marked.store(marked as u64, Ordering::Relaxed);
        self.gc_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        self.collections.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record a compaction.
    #[inline]
    pub fn record_compaction(&self) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot.
    pub fn snapshot(&self) -> GcStatsSnapshot {
        GcStatsSnapshot {
            collections: self.collections.load(Ordering::Relaxed),
            compactions: self.compactions.load(Ordering::Relaxed),
            last_marked: self.last_marked.load(Ordering::Relaxed),
            gc_time: Duration::from_nanos(self.gc_time_ns.load(Ordering::Relaxed)),
        }
    }
}

/// Snapshot of [`GcStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GcStatsSnapshot {
    /// Number of collections performed.
    pub collections: u64,
    /// Number of compactions performed.
    pub compactions: u64,
    /// Objects marked by the last collection.
    pub last_marked: u64,
    /// Total collection time.
    pub gc_time: Duration,
}
