//! Dispatch statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for inline-cache behaviour.
#[derive(Debug, Default)]
pub struct DispatchStats {
    /// Calls dispatched.
    calls: AtomicU64,
    /// Calls served from a valid cache.
    hits: AtomicU64,
    /// Calls that went through resolution.
    slow_paths: AtomicU64,
    /// Slow paths that added a class to an existing line.
    polymorphic_extends: AtomicU64,
    /// Calls that reached the missing-method handler.
    missing: AtomicU64,
    /// Ad hoc call sites allocated.
    adhoc_sites: AtomicU64,
    /// Cached definition lookups answered without a search.
    lookup_hits: AtomicU64,
    /// Cached definition lookups that searched and refilled.
    lookup_fills: AtomicU64,
}

impl DispatchStats {
    /// Create new zeroed stats.
    pub const fn new() -> Self {
        Self {
            calls: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            slow_paths: AtomicU64::new(0),
            polymorphic_extends: AtomicU64::new(0),
            missing: AtomicU64::new(0),
            adhoc_sites: AtomicU64::new(0),
            lookup_hits: AtomicU64::new(0),
            lookup_fills: AtomicU64::new(0),
        }
    }

    /// Record a cache hit.
    #[inline]
    pub fn record_hit(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a slow-path resolution.
    #[inline]
    pub fn record_slow_path(&self, extended: bool) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.slow_paths.fetch_add(1, Ordering::Relaxed);
        if extended {
            self.polymorphic_extends.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a missing-method dispatch.
    #[inline]
    pub fn record_missing(&self) {
        self.missing.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an ad hoc site allocation.
    #[inline]
    pub fn record_adhoc_site(&self) {
        self.adhoc_sites.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a definition lookup served from cache.
    #[inline]
    pub fn record_lookup_hit(&self) {
        self.lookup_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a definition lookup that had to search.
    #[inline]
    pub fn record_lookup_fill(&self) {
        self.lookup_fills.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot.
    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            slow_paths: self.slow_paths.load(Ordering::Relaxed),
            polymorphic_extends: self.polymorphic_extends.load(Ordering::Relaxed),
            missing: self.missing.load(Ordering::Relaxed),
            adhoc_sites: self.adhoc_sites.load(Ordering::Relaxed),
            lookup_hits: self.lookup_hits.load(Ordering::Relaxed),
            lookup_fills: self.lookup_fills.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.calls.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.slow_paths.store(0, Ordering::Relaxed);
        self.polymorphic_extends.store(0, Ordering::Relaxed);
        self.missing.store(0, Ordering::Relaxed);
        self.adhoc_sites.store(0, Ordering::Relaxed);
        self.lookup_hits.store(0, Ordering::Relaxed);
        self.lookup_fills.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of [`DispatchStats`].
///
/// Lookup counters are kept apart from call counters: a definition query
/// is not a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStatsSnapshot {
    /// Calls dispatched.
    pub calls: u64,
    /// Calls served from a valid cache.
    pub hits: u64,
    /// Calls that went through resolution.
    pub slow_paths: u64,
    /// Slow paths that added a class to an existing line.
    pub polymorphic_extends: u64,
    /// Calls that reached the missing-method handler.
    pub missing: u64,
    /// Ad hoc call sites allocated.
    pub adhoc_sites: u64,
    /// Definition lookups served from cache.
    pub lookup_hits: u64,
    /// Definition lookups that searched.
    pub lookup_fills: u64,
}

impl DispatchStatsSnapshot {
    /// Fraction of calls served from cache.
    pub fn hit_rate(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.hits as f64 / self.calls as f64
        }
    }

    /// Counter deltas since `earlier`.
    pub fn since(&self, earlier: &Self) -> Self {
        Self {
            calls: self.calls - earlier.calls,
            hits: self.hits - earlier.hits,
            slow_paths: self.slow_paths - earlier.slow_paths,
            polymorphic_extends: self.polymorphic_extends - earlier.polymorphic_extends,
            missing: self.missing - earlier.missing,
            adhoc_sites: self.adhoc_sites - earlier.adhoc_sites,
            lookup_hits: self.lookup_hits - earlier.lookup_hits,
            lookup_fills: self.lookup_fills - earlier.lookup_fills,
        }
    }
}
