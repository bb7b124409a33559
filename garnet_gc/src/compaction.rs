//! Compaction epoch counter.
//!
//! Bumped each time the collector relocates live objects. Only debug builds
//! of the dispatch core consult it: a call cache populated under an older
//! epoch is re-resolved even when every serial still matches.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic compaction counter.
#[derive(Debug, Default)]
pub struct CompactionEpoch(AtomicU64);

impl CompactionEpoch {
    /// Create a counter at epoch 0.
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Current epoch.
    #[inline]
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Record a compaction and return the new epoch.
    #[inline]
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}
