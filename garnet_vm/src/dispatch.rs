//! Dispatch strategies and the call entry point.
//!
//! Every cached outcome carries a [`DispatchStrategy`]. The strategy indexes
//! a static function pointer table, so a cache hit costs one serial compare
//! and one indirect call.

use crate::call_cache::Probe;
use crate::call_data::CallData;
use crate::context::ExecutionContext;
use crate::error::VmResult;
use crate::frame::Frame;
use crate::handlers;
use crate::resolver;
use garnet_runtime::{MethodBody, MethodEntry, Value, Visibility};
use std::sync::Arc;

// =============================================================================
// Strategies
// =============================================================================

/// How a resolved call is executed.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchStrategy {
    /// User-defined body.
    PlainMethod = 0,
    /// Native function.
    NativeMethod = 1,
    /// Generated instance variable reader.
    AttrReader = 2,
    /// Generated instance variable writer.
    AttrWriter = 3,
    /// No callable method; route to `method_missing` or raise.
    MissingThunk = 4,
    /// `super` forwarding to the next definition in the ancestry.
    SuperForward = 5,
}

impl DispatchStrategy {
    /// Number of strategies (size of the dispatch table).
    pub const COUNT: usize = 6;

    /// All strategies in table order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::PlainMethod,
        Self::NativeMethod,
        Self::AttrReader,
        Self::AttrWriter,
        Self::MissingThunk,
        Self::SuperForward,
    ];

    /// Strategy for an ordinary (non-`super`) call to a method with `body`.
    pub const fn for_body(body: &MethodBody) -> Self {
        match body {
            MethodBody::Iseq { .. } => Self::PlainMethod,
            MethodBody::Native { .. } => Self::NativeMethod,
            MethodBody::AttrReader(_) => Self::AttrReader,
            MethodBody::AttrWriter(_) => Self::AttrWriter,
            MethodBody::Undefined => Self::MissingThunk,
        }
    }

    /// Short name for diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            Self::PlainMethod => "plain",
            Self::NativeMethod => "native",
            Self::AttrReader => "attr_reader",
            Self::AttrWriter => "attr_writer",
            Self::MissingThunk => "missing",
            Self::SuperForward => "super",
        }
    }
}

// =============================================================================
// Dispatch Table
// =============================================================================

/// Arguments of one dispatched call.
#[derive(Debug)]
pub struct CallingInfo<'a> {
    /// Receiver.
    pub recv: &'a Value,
    /// Positional arguments.
    pub args: &'a [Value],
    /// Resolved entry; `None` for missing-method dispatch.
    pub entry: Option<Arc<MethodEntry>>,
}

/// Strategy handler.
///
/// `caller` is the frame that was current when the call was made.
pub type StrategyHandler =
    fn(&mut ExecutionContext<'_>, &Frame, &CallingInfo<'_>, &CallData) -> VmResult<Value>;

const fn build_dispatch_table() -> [StrategyHandler; DispatchStrategy::COUNT] {
    let mut table: [StrategyHandler; DispatchStrategy::COUNT] =
        [handlers::call_missing; DispatchStrategy::COUNT];

    table[DispatchStrategy::PlainMethod as usize] = handlers::call_plain;
    table[DispatchStrategy::NativeMethod as usize] = handlers::call_native;
    table[DispatchStrategy::AttrReader as usize] = handlers::call_attr_reader;
    table[DispatchStrategy::AttrWriter as usize] = handlers::call_attr_writer;
    table[DispatchStrategy::MissingThunk as usize] = handlers::call_missing;
    table[DispatchStrategy::SuperForward as usize] = handlers::call_super;

    table
}

/// Static handler table indexed by [`DispatchStrategy`].
pub static DISPATCH_TABLE: [StrategyHandler; DispatchStrategy::COUNT] = build_dispatch_table();

/// Handler for a strategy.
#[inline(always)]
pub fn get_handler(strategy: DispatchStrategy) -> StrategyHandler {
    DISPATCH_TABLE[strategy as usize]
}

// =============================================================================
// Entry Point
// =============================================================================

/// Dispatch one call through `cd`'s inline cache.
///
/// On a valid cache the stored strategy runs directly. Otherwise the call is
/// resolved, the outcome is stored in the cache and then run. Missing-method
/// outcomes are cached too and raised (or routed to `method_missing`) by the
/// handler.
pub fn vm_call(
    ec: &mut ExecutionContext<'_>,
    cd: &mut CallData,
    recv: &Value,
    args: &[Value],
) -> VmResult<Value> {
    let registry = ec.registry();
    let class = registry.class_of(recv);

    // Read before resolving so a concurrent change leaves a stale key behind.
    let class_serial = class.serial();
    let global = ec.global_state();
    let epoch = ec.compaction_epoch();

    let caller = ec.current_frame().clone();

    let hit = match cd.cache().probe(class_serial, global, epoch) {
        Probe::Hit(Some(entry))
            if entry.visibility == Visibility::Protected
                && !cd.info().is_fcall()
                && !resolver::protected_allowed(registry, &caller, entry.owner) =>
        {
            None
        }
        Probe::Hit(entry) => Some(entry),
        Probe::Miss => None,
    };

    let entry = match hit {
        Some(entry) => {
            ec.vm().stats().record_hit();
            entry
        }
        None => {
            resolver::search_method_slowpath(ec, &caller, cd, &class, recv, class_serial, global, epoch)
                .entry
        }
    };

    let calling = CallingInfo { recv, args, entry };
    get_handler(cd.cache().strategy())(ec, &caller, &calling, cd)
}
