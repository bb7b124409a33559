//! Serial numbers used as cache-invalidation fingerprints.
//!
//! A serial is a monotonically increasing 64-bit stamp. Caches record the
//! serials they were populated under and compare them on every use: any
//! mismatch means the underlying state changed and the cache is stale.
//!
//! # Authority
//!
//! - **next_serial**: a fresh serial, strictly greater than every serial
//!   issued before it. Used for per-class serials and method definitions.
//! - **global method state**: a separate serial bumped for changes that are
//!   not attributable to a single class (global hooks, full invalidation).
//!
//! Serials are never reused. Exhausting the 64-bit space aborts the process,
//! since every cache in the system relies on uniqueness for correctness.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Serial
// =============================================================================

/// A serial stamp.
///
/// `Serial::ZERO` is never issued and marks an empty cache slot.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Serial(u64);

impl Serial {
    /// The never-issued serial.
    pub const ZERO: Serial = Serial(0);

    /// Create a serial from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// True for the empty-slot marker.
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Serial({})", self.0)
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Serial Authority
// =============================================================================

/// Issues serials and owns the global method-state serial.
///
/// Shared by the class registry (which stamps classes and method definitions)
/// and the VM (which validates call caches). Both counters are read on every
/// cache check and written only on class-graph mutation.
#[derive(Debug)]
pub struct SerialAuthority {
    /// Last serial handed out.
    next: AtomicU64,
    /// Global method state.
    method_state: AtomicU64,
}

impl SerialAuthority {
    /// Create a new authority. The first issued serial is 1.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Create an authority whose next serial is `last + 1`.
    ///
    /// The global method state starts at its own fresh serial.
    #[must_use]
    pub fn starting_at(last: u64) -> Self {
        let authority = Self {
            next: AtomicU64::new(last),
            method_state: AtomicU64::new(0),
        };
        let initial = authority.next_serial();
        authority.method_state.store(initial.0, Ordering::Release);
        authority
    }

    /// Issue a fresh serial.
    ///
    /// Aborts the process if the serial space is exhausted.
    #[inline]
    pub fn next_serial(&self) -> Serial {
        let prev = self.next.fetch_add(1, Ordering::AcqRel);
        if prev == u64::MAX {
            exhausted();
        }
        Serial(prev + 1)
    }

    /// Current global method state.
    #[inline]
    pub fn global_method_state(&self) -> Serial {
        Serial(self.method_state.load(Ordering::Acquire))
    }

    /// Replace the global method state with a fresh serial.
    ///
    /// Invalidates every call cache in the process.
    pub fn bump_global_method_state(&self) -> Serial {
        let serial = self.next_serial();
        self.method_state.store(serial.0, Ordering::Release);
        tracing::debug!(%serial, "global method state bumped");
        serial
    }

    /// Number of serials issued so far.
    #[inline]
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Acquire)
    }
}

impl Default for SerialAuthority {
    fn default() -> Self {
        Self::new()
    }
}

#[cold]
#[inline(never)]
fn exhausted() -> ! {
    tracing::error!("serial space exhausted; cache invalidation can no longer be trusted");
    std::process::abort()
}

// =============================================================================
// Tests
// =============================================================================
