//! Call-site descriptions.
//!
//! A [`CallInfo`] is fixed when a call site is compiled: the method name,
//! the syntactic form of the call and the argument count. Resolution reads
//! the flags to decide visibility and which missing reason to record.

use garnet_core::{Ident, MissingReason};
use std::fmt;

bitflags::bitflags! {
    /// Syntactic form of a call site.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CallFlags: u16 {
        /// `f(*args)`
        const ARGS_SPLAT  = 1 << 0;
        /// `f(&blk)`
        const BLOCK_ARG   = 1 << 1;
        /// Implicit receiver: `foo()` or `foo` (private methods allowed).
        const FCALL       = 1 << 2;
        /// Bare identifier that could have been a local variable.
        const VCALL       = 1 << 3;
        /// Only plain positional arguments.
        const ARGS_SIMPLE = 1 << 4;
        /// `super` / `super(...)`.
        const SUPER       = 1 << 5;
    }
}

/// Immutable description of one call site.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallInfo {
    mid: Ident,
    flags: CallFlags,
    argc: u16,
}

impl CallInfo {
    /// Create call info with explicit flags.
    #[inline]
    pub const fn new(mid: Ident, flags: CallFlags, argc: u16) -> Self {
        Self { mid, flags, argc }
    }

    /// `recv.mid(args)`
    #[inline]
    pub const fn method(mid: Ident, argc: u16) -> Self {
        Self::new(mid, CallFlags::ARGS_SIMPLE, argc)
    }

    /// `mid(args)` with implicit receiver.
    #[inline]
    pub const fn fcall(mid: Ident, argc: u16) -> Self {
        Self::new(
            mid,
            CallFlags::FCALL.union(CallFlags::ARGS_SIMPLE),
            argc,
        )
    }

    /// Bare `mid`.
    #[inline]
    pub const fn vcall(mid: Ident) -> Self {
        Self::new(
            mid,
            CallFlags::FCALL
                .union(CallFlags::VCALL)
                .union(CallFlags::ARGS_SIMPLE),
            0,
        )
    }

    /// `super(args)` inside method `mid`.
    #[inline]
    pub const fn super_call(mid: Ident, argc: u16) -> Self {
        Self::new(
            mid,
            CallFlags::FCALL
                .union(CallFlags::SUPER)
                .union(CallFlags::ARGS_SIMPLE),
            argc,
        )
    }

    /// Method name.
    #[inline]
    pub const fn mid(&self) -> Ident {
        self.mid
    }

    /// Call-site flags.
    #[inline]
    pub const fn flags(&self) -> CallFlags {
        self.flags
    }

    /// Argument count.
    #[inline]
    pub const fn argc(&self) -> u16 {
        self.argc
    }

    /// Whether the receiver is implicit (private methods are callable).
    #[inline]
    pub fn is_fcall(&self) -> bool {
        self.flags.intersects(CallFlags::FCALL | CallFlags::VCALL)
    }

    /// Whether this is a bare identifier with no receiver and no arguments.
    #[inline]
    pub fn is_vcall(&self) -> bool {
        self.flags.contains(CallFlags::VCALL)
    }

    /// Whether this site is a `super` call.
    #[inline]
    pub fn is_super(&self) -> bool {
        self.flags.contains(CallFlags::SUPER)
    }

    /// Reason to record when no method is found for this site.
    pub fn not_found_reason(&self) -> MissingReason {
        if self.is_super() {
            MissingReason::Super
        } else if self.is_vcall() {
            MissingReason::VCall
        } else if self.flags.contains(CallFlags::FCALL) {
            MissingReason::FCall
        } else {
            MissingReason::NoEntry
        }
    }
}

impl fmt::Debug for CallInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallInfo({}/{} {:?})", self.mid, self.argc, self.flags)
    }
}
