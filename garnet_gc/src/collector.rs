//! Collector driver.
//!
//! `Gc` owns the root set, the compaction epoch and statistics. A collection
//! marks everything reachable from the permanent roots and, on the schedule
//! given by [`GcConfig`], compacts. The runtime's own objects are reference
//! counted, so "compaction" here only advances the epoch that debug builds
//! use to flush pointer-identity assumptions out of call caches.

use crate::compaction::CompactionEpoch;
use crate::config::GcConfig;
use crate::roots::{RootId, RootSet};
use crate::stats::GcStats;
use crate::trace::{MarkSet, Trace};
use crate::GcService;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of a garbage collection.
#[derive(Debug)]
pub struct CollectionResult {
    /// Objects reachable from the roots.
    pub marks: MarkSet,
    /// Number of distinct objects marked.
    pub marked: usize,
    /// Whether this collection compacted.
    pub compacted: bool,
    /// Compaction epoch after the collection.
    pub epoch: u64,
    /// Time spent in the collection.
    pub duration: Duration,
}

/// The collector service.
#[derive(Debug)]
pub struct Gc {
    config: GcConfig,
    roots: RootSet,
    epoch: CompactionEpoch,
    stats: GcStats,
}

impl Gc {
    /// Create a collector with the given configuration.
    pub fn new(config: GcConfig) -> Self {
        let roots = RootSet::with_capacity(config.initial_root_capacity);
        Self {
            config,
            roots,
            epoch: CompactionEpoch::new(),
            stats: GcStats::new(),
        }
    }

    /// Configuration in effect.
    #[inline]
    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    /// Collector statistics.
    #[inline]
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    /// Run a full collection.
    pub fn collect(&self) -> CollectionResult {
        let start = Instant::now();
        let mut marks = MarkSet::new();
        self.roots.trace(&mut marks);

        let ordinal = self
            .stats
            .record_collection(marks.len(), start.elapsed());
        let compacted = self.config.should_compact(ordinal);
        let epoch = if compacted {
            self.compact()
        } else {
            self.epoch.current()
        };

        let duration = start.elapsed();
        tracing::debug!(
            marked = marks.len(),
            compacted,
            epoch,
            ?duration,
            "collection finished"
        );

        CollectionResult {
            marked: marks.len(),
            marks,
            compacted,
            epoch,
            duration,
        }
    }

    /// Compact the heap and return the new epoch.
    pub fn compact(&self) -> u64 {
        self.stats.record_compaction();
        let epoch = self.epoch.advance();
        tracing::debug!(epoch, "heap compacted");
        epoch
    }
}

impl Default for Gc {
    fn default() -> Self {
        Self::new(GcConfig::default())
    }
}

impl GcService for Gc {
    fn register_permanent_root(&self, root: Arc<dyn Trace + Send + Sync>) -> RootId {
        self.roots.register_permanent(root)
    }

    fn permanent_root_count(&self) -> usize {
        self.roots.permanent_count()
    }

    #[inline]
    fn compaction_epoch(&self) -> u64 {
        self.epoch.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::Tracer;

    struct Holder(Arc<u64>);

    impl Trace for Holder {
        fn trace(&self, tracer: &mut dyn Tracer) {
            tracer.trace_ptr(Arc::as_ptr(&self.0).cast());
        }
    }

    #[test]
    fn test_collect_marks_permanent_roots() {
        let gc = Gc::new(GcConfig::non_moving());
        let target = Arc::new(42u64);
        gc.register_permanent_root(Arc::new(Holder(Arc::clone(&target))));

        let result = gc.collect();
        assert_eq!(result.marked, 1);
        assert!(result.marks.is_marked(Arc::as_ptr(&target).cast()));
        assert!(!result.compacted);
    }

    #[test]
    fn test_shared_target_marked_once() {
        let gc = Gc::new(GcConfig::non_moving());
        let target = Arc::new(7u64);
        gc.register_permanent_root(Arc::new(Holder(Arc::clone(&target))));
        gc.register_permanent_root(Arc::new(Holder(Arc::clone(&target))));

        assert_eq!(gc.permanent_root_count(), 2);
        assert_eq!(gc.collect().marked, 1);
    }

    #[test]
    fn test_periodic_compaction_advances_epoch() {
        let gc = Gc::new(GcConfig {
            compact_every: 2,
            ..Default::default()
        });

        assert_eq!(gc.compaction_epoch(), 0);
        assert!(!gc.collect().compacted);
        let second = gc.collect();
        assert!(second.compacted);
        assert_eq!(second.epoch, 1);
        assert_eq!(gc.compaction_epoch(), 1);

        let snapshot = gc.stats().snapshot();
        assert_eq!(snapshot.collections, 2);
        assert_eq!(snapshot.compactions, 1);
    }

    #[test]
    fn test_explicit_compact() {
        let gc = Gc::new(GcConfig::non_moving());
        assert_eq!(gc.compact(), 1);
        assert_eq!(gc.compact(), 2);
        assert_eq!(gc.compaction_epoch(), 2);
    }
}
