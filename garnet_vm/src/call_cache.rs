//! The per-call-site inline cache.
//!
//! A [`CallCache`] remembers the outcome of the last resolution at one call
//! site together with the serials that were current at the time. On the
//! next call the cache is trusted only if every serial still matches:
//!
//! - the global method state,
//! - the receiver class serial, which must be in one of the polymorphic
//!   slots,
//! - the resolved definition's serial (the entry must also still be alive),
//! - in debug builds, the GC compaction epoch.
//!
//! The struct is `#[repr(C)]` and must fit one 64-byte cache line.
//!
//! # Layout (release, 64-bit)
//!
//! ```text
//! 0   method_state      u64
//! 8   class_serials     [u64; 3]
//! 32  method_entry      Weak<MethodEntry>
//! 40  method_serial     u64
//! 48  aux               CacheAux (8)
//! 56  strategy, next    u8, u8
//! ```
//!
//! Debug builds trade the third class slot for the compaction epoch.

use crate::dispatch::DispatchStrategy;
use garnet_core::{MissingReason, Serial};
use garnet_runtime::MethodEntry;
use std::fmt;
use std::sync::{Arc, Weak};

/// Number of receiver-class slots.
#[cfg(not(debug_assertions))]
pub const CLASS_SERIAL_SLOTS: usize = 3;
/// Number of receiver-class slots.
#[cfg(debug_assertions)]
pub const CLASS_SERIAL_SLOTS: usize = 2;

/// Cache line size the cache must fit.
pub const CACHE_LINE_SIZE: usize = 64;

const _: () = assert!(std::mem::size_of::<CallCache>() <= CACHE_LINE_SIZE);

/// Strategy-specific payload.
///
/// Which variant is meaningful is decided by the cache's strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheAux {
    /// No payload.
    #[default]
    Empty,
    /// Instance variable slot for attribute strategies.
    AttrIndex(u32),
    /// Deferred failure for the missing-method strategy.
    Missing(MissingReason),
}

/// Result of a fast-path probe.
#[derive(Debug)]
pub enum Probe {
    /// Cached outcome is valid. Missing-method outcomes carry no entry.
    Hit(Option<Arc<MethodEntry>>),
    /// Resolution is required.
    Miss,
}

/// What a fill did to the cache line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// The line was reset to the new outcome.
    Replaced,
    /// Same outcome; the receiver class was added to a polymorphic slot.
    Extended,
}

/// An inline method cache.
#[repr(C)]
pub struct CallCache {
    method_state: Serial,
    class_serials: [Serial; CLASS_SERIAL_SLOTS],
    method_entry: Option<Weak<MethodEntry>>,
    method_serial: Serial,
    #[cfg(debug_assertions)]
    compaction_epoch: u64,
    aux: CacheAux,
    strategy: DispatchStrategy,
    next_slot: u8,
}

impl CallCache {
    /// An empty cache; never valid because serials are never zero.
    pub const fn empty() -> Self {
        Self {
            method_state: Serial::ZERO,
            class_serials: [Serial::ZERO; CLASS_SERIAL_SLOTS],
            method_entry: None,
            method_serial: Serial::ZERO,
            #[cfg(debug_assertions)]
            compaction_epoch: 0,
            aux: CacheAux::Empty,
            strategy: DispatchStrategy::MissingThunk,
            next_slot: 0,
        }
    }

    /// Fast-path validity check.
    ///
    /// `epoch` is only compared in debug builds.
    #[inline]
    pub fn probe(&self, class_serial: Serial, global: Serial, epoch: u64) -> Probe {
        if self.method_state != global || !self.class_serials.contains(&class_serial) {
            return Probe::Miss;
        }
        #[cfg(debug_assertions)]
        if self.compaction_epoch != epoch {
            return Probe::Miss;
        }
        #[cfg(not(debug_assertions))]
        let _ = epoch;

        match self.aux {
            // Caller-dependent; always re-resolve.
            CacheAux::Missing(MissingReason::Protected) => Probe::Miss,
            CacheAux::Missing(_) => Probe::Hit(None),
            _ => match self.entry() {
                Some(entry) if entry.method_serial() == self.method_serial => {
                    Probe::Hit(Some(entry))
                }
                _ => Probe::Miss,
            },
        }
    }

    /// Convenience wrapper over [`probe`](Self::probe).
    #[inline]
    pub fn is_valid(&self, class_serial: Serial, global: Serial, epoch: u64) -> bool {
        matches!(self.probe(class_serial, global, epoch), Probe::Hit(_))
    }

    /// Record a resolution outcome for a receiver class.
    ///
    /// When the outcome is identical to the cached one under the same
    /// global state, the class serial is added to a free slot (evicting
    /// round-robin when full) instead of resetting the line.
    pub fn fill(
        &mut self,
        entry: Option<&Arc<MethodEntry>>,
        strategy: DispatchStrategy,
        aux: CacheAux,
        class_serial: Serial,
        global: Serial,
        epoch: u64,
    ) -> Fill {
        let method_serial = entry.map_or(Serial::ZERO, |e| e.method_serial());
        if self.same_outcome(entry, strategy, aux, method_serial, global, epoch) {
            if !self.class_serials.contains(&class_serial) {
                self.add_class(class_serial);
            }
            return Fill::Extended;
        }

        *self = Self::empty();
        self.method_state = global;
        self.class_serials[0] = class_serial;
        self.method_entry = entry.map(Arc::downgrade);
        self.method_serial = method_serial;
        #[cfg(debug_assertions)]
        {
            self.compaction_epoch = epoch;
        }
        #[cfg(not(debug_assertions))]
        let _ = epoch;
        self.aux = aux;
        self.strategy = strategy;
        Fill::Replaced
    }

    fn same_outcome(
        &self,
        entry: Option<&Arc<MethodEntry>>,
        strategy: DispatchStrategy,
        aux: CacheAux,
        method_serial: Serial,
        global: Serial,
        epoch: u64,
    ) -> bool {
        #[cfg(debug_assertions)]
        if self.compaction_epoch != epoch {
            return false;
        }
        #[cfg(not(debug_assertions))]
        let _ = epoch;

        let same_entry = match (&self.method_entry, entry) {
            (Some(cached), Some(new)) => std::ptr::eq(cached.as_ptr(), Arc::as_ptr(new)),
            (None, None) => true,
            _ => false,
        };
        !self.method_state.is_zero()
            && self.method_state == global
            && self.strategy == strategy
            && self.aux == aux
            && self.method_serial == method_serial
            && same_entry
    }

    fn add_class(&mut self, class_serial: Serial) {
        if let Some(free) = self.class_serials.iter().position(|s| s.is_zero()) {
            self.class_serials[free] = class_serial;
            return;
        }
        let victim = usize::from(self.next_slot) % CLASS_SERIAL_SLOTS;
        self.class_serials[victim] = class_serial;
        self.next_slot = ((victim + 1) % CLASS_SERIAL_SLOTS) as u8;
    }

    /// Reset to the empty state.
    #[inline]
    pub fn clear(&mut self) {
        *self = Self::empty();
    }

    /// The cached entry, if it is still alive.
    #[inline]
    pub fn entry(&self) -> Option<Arc<MethodEntry>> {
        self.method_entry.as_ref().and_then(Weak::upgrade)
    }

    /// Dispatch strategy of the cached outcome.
    #[inline]
    pub fn strategy(&self) -> DispatchStrategy {
        self.strategy
    }

    /// Strategy payload.
    #[inline]
    pub fn aux(&self) -> CacheAux {
        self.aux
    }

    /// Instance variable slot, for attribute strategies.
    #[inline]
    pub fn attr_index(&self) -> Option<u32> {
        match self.aux {
            CacheAux::AttrIndex(idx) => Some(idx),
            _ => None,
        }
    }

    /// Deferred failure reason, for the missing-method strategy.
    #[inline]
    pub fn missing_reason(&self) -> MissingReason {
        match self.aux {
            CacheAux::Missing(reason) => reason,
            _ => MissingReason::NoEntry,
        }
    }

    /// Global method state at population.
    #[inline]
    pub fn method_state(&self) -> Serial {
        self.method_state
    }

    /// Serial of the cached definition.
    #[inline]
    pub fn method_serial(&self) -> Serial {
        self.method_serial
    }

    /// Polymorphic receiver-class slots.
    #[inline]
    pub fn class_serials(&self) -> &[Serial] {
        &self.class_serials
    }

    /// Number of occupied class slots.
    pub fn occupied_slots(&self) -> usize {
        self.class_serials.iter().filter(|s| !s.is_zero()).count()
    }

    /// Compaction epoch at population (debug builds).
    #[cfg(debug_assertions)]
    #[inline]
    pub fn compaction_epoch(&self) -> u64 {
        self.compaction_epoch
    }
}

impl Default for CallCache {
    fn default() -> Self {
        Self::empty()
    }
}

impl Clone for CallCache {
    fn clone(&self) -> Self {
        Self {
            method_state: self.method_state,
            class_serials: self.class_serials,
            method_entry: self.method_entry.clone(),
            method_serial: self.method_serial,
            #[cfg(debug_assertions)]
            compaction_epoch: self.compaction_epoch,
            aux: self.aux,
            strategy: self.strategy,
            next_slot: self.next_slot,
        }
    }
}

impl fmt::Debug for CallCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallCache")
            .field("method_state", &self.method_state)
            .field("class_serials", &self.class_serials)
            .field("method_serial", &self.method_serial)
            .field("strategy", &self.strategy)
            .field("aux", &self.aux)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garnet_core::Ident;
    use garnet_runtime::{ClassId, MethodBody, Visibility};

    fn entry(serial: u64) -> Arc<MethodEntry> {
        Arc::new(MethodEntry::new(
            Ident::new("size"),
            ClassId(50),
            Visibility::Public,
            MethodBody::AttrReader(Ident::new("@size")),
            Serial::new(serial),
            false,
        ))
    }

    const G: Serial = Serial::new(1);

    #[test]
    fn test_fits_cache_line() {
        assert!(std::mem::size_of::<CallCache>() <= CACHE_LINE_SIZE);
    }

    #[test]
    fn test_empty_cache_never_hits() {
        let cc = CallCache::empty();
        assert!(!cc.is_valid(Serial::new(5), G, 0));
        assert!(!cc.is_valid(Serial::ZERO, Serial::ZERO, 0));
        assert_eq!(cc.occupied_slots(), 0);
    }

    #[test]
    fn test_fill_then_hit() {
        let e = entry(10);
        let mut cc = CallCache::empty();
        let fill = cc.fill(
            Some(&e),
            DispatchStrategy::AttrReader,
            CacheAux::AttrIndex(2),
            Serial::new(7),
            G,
            0,
        );
        assert_eq!(fill, Fill::Replaced);
        assert!(matches!(cc.probe(Serial::new(7), G, 0), Probe::Hit(Some(_))));
        assert_eq!(cc.attr_index(), Some(2));
        assert!(!cc.is_valid(Serial::new(8), G, 0));
        assert!(!cc.is_valid(Serial::new(7), Serial::new(2), 0));
    }

    #[test]
    fn test_dead_entry_misses() {
        let mut cc = CallCache::empty();
        {
            let e = entry(10);
            cc.fill(
                Some(&e),
                DispatchStrategy::PlainMethod,
                CacheAux::Empty,
                Serial::new(7),
                G,
                0,
            );
        }
        assert!(cc.entry().is_none());
        assert!(!cc.is_valid(Serial::new(7), G, 0));
    }

    #[test]
    fn test_same_outcome_extends_slots() {
        let e = entry(10);
        let mut cc = CallCache::empty();
        cc.fill(Some(&e), DispatchStrategy::PlainMethod, CacheAux::Empty, Serial::new(7), G, 0);
        let fill = cc.fill(Some(&e), DispatchStrategy::PlainMethod, CacheAux::Empty, Serial::new(9), G, 0);
        assert_eq!(fill, Fill::Extended);
        assert_eq!(cc.occupied_slots(), 2);
        assert!(cc.is_valid(Serial::new(7), G, 0));
        assert!(cc.is_valid(Serial::new(9), G, 0));
    }

    #[test]
    fn test_full_slots_evict_round_robin() {
        let e = entry(10);
        let mut cc = CallCache::empty();
        let base = 100u64;
        for i in 0..CLASS_SERIAL_SLOTS as u64 {
            cc.fill(Some(&e), DispatchStrategy::PlainMethod, CacheAux::Empty, Serial::new(base + i), G, 0);
        }
        assert_eq!(cc.occupied_slots(), CLASS_SERIAL_SLOTS);

        // One more class evicts the oldest.
        let newcomer = Serial::new(base + 50);
        cc.fill(Some(&e), DispatchStrategy::PlainMethod, CacheAux::Empty, newcomer, G, 0);
        assert!(cc.is_valid(newcomer, G, 0));
        assert!(!cc.is_valid(Serial::new(base), G, 0));
        assert_eq!(cc.occupied_slots(), CLASS_SERIAL_SLOTS);
    }

    #[test]
    fn test_different_outcome_replaces_line() {
        let a = entry(10);
        let b = entry(11);
        let mut cc = CallCache::empty();
        cc.fill(Some(&a), DispatchStrategy::PlainMethod, CacheAux::Empty, Serial::new(7), G, 0);
        let fill = cc.fill(Some(&b), DispatchStrategy::PlainMethod, CacheAux::Empty, Serial::new(9), G, 0);
        assert_eq!(fill, Fill::Replaced);
        assert_eq!(cc.occupied_slots(), 1);
        assert!(!cc.is_valid(Serial::new(7), G, 0));
    }

    #[test]
    fn test_missing_outcomes_hit_except_protected() {
        let mut cc = CallCache::empty();
        cc.fill(
            None,
            DispatchStrategy::MissingThunk,
            CacheAux::Missing(MissingReason::Private),
            Serial::new(7),
            G,
            0,
        );
        assert!(matches!(cc.probe(Serial::new(7), G, 0), Probe::Hit(None)));
        assert_eq!(cc.missing_reason(), MissingReason::Private);

        cc.fill(
            None,
            DispatchStrategy::MissingThunk,
            CacheAux::Missing(MissingReason::Protected),
            Serial::new(7),
            G,
            0,
        );
        assert!(!cc.is_valid(Serial::new(7), G, 0));
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_epoch_mismatch_misses_in_debug() {
        let e = entry(10);
        let mut cc = CallCache::empty();
        cc.fill(Some(&e), DispatchStrategy::PlainMethod, CacheAux::Empty, Serial::new(7), G, 3);
        assert!(cc.is_valid(Serial::new(7), G, 3));
        assert!(!cc.is_valid(Serial::new(7), G, 4));
        assert_eq!(cc.compaction_epoch(), 3);
    }
}
