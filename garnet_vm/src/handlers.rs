//! Strategy handlers.
//!
//! One function per [`DispatchStrategy`](crate::DispatchStrategy), installed
//! in the dispatch table. Handlers run with the cache already filled, so
//! the cache's aux payload is valid for this receiver.

use crate::adhoc::SiteKey;
use crate::call_data::CallData;
use crate::context::ExecutionContext;
use crate::dispatch::CallingInfo;
use crate::error::{VmResult, frozen_receiver, missing_method};
use crate::frame::{Frame, FrameKind};
use garnet_core::{GarnetError, Ident, MissingReason};
use garnet_runtime::{Arity, MethodBody, MethodEntry, MethodFn, NativeFn, Value};
use smallvec::SmallVec;
use std::sync::{Arc, LazyLock};

static METHOD_MISSING: LazyLock<Ident> = LazyLock::new(|| Ident::new("method_missing"));

// =============================================================================
// Table Entries
// =============================================================================

pub(crate) fn call_plain(
    ec: &mut ExecutionContext<'_>,
    _caller: &Frame,
    calling: &CallingInfo<'_>,
    _cd: &CallData,
) -> VmResult<Value> {
    let entry = bound_entry(calling)?;
    match &entry.definition.body {
        MethodBody::Iseq { arity, body } => run_iseq(ec, entry, *arity, body, calling.recv, calling.args),
        _ => run_entry(ec, entry, calling.recv, calling.args),
    }
}

pub(crate) fn call_native(
    ec: &mut ExecutionContext<'_>,
    _caller: &Frame,
    calling: &CallingInfo<'_>,
    _cd: &CallData,
) -> VmResult<Value> {
    let entry = bound_entry(calling)?;
    match &entry.definition.body {
        MethodBody::Native { arity, func } => run_native(ec, entry, *arity, *func, calling.recv, calling.args),
        _ => run_entry(ec, entry, calling.recv, calling.args),
    }
}

pub(crate) fn call_attr_reader(
    _ec: &mut ExecutionContext<'_>,
    _caller: &Frame,
    calling: &CallingInfo<'_>,
    cd: &CallData,
) -> VmResult<Value> {
    Arity::exact(0).check(calling.args.len())?;
    Ok(match (calling.recv, cd.cache().attr_index()) {
        (Value::Object(obj), Some(index)) => obj.ivar_get(index),
        _ => Value::Nil,
    })
}

pub(crate) fn call_attr_writer(
    _ec: &mut ExecutionContext<'_>,
    _caller: &Frame,
    calling: &CallingInfo<'_>,
    cd: &CallData,
) -> VmResult<Value> {
    Arity::exact(1).check(calling.args.len())?;
    let value = calling.args[0].clone();
    match (calling.recv, cd.cache().attr_index()) {
        (Value::Object(obj), Some(index)) => {
            obj.ivar_set(index, value.clone())?;
            Ok(value)
        }
        (recv, _) => Err(frozen_receiver(recv)),
    }
}

/// Runs the next definition found by a `super` resolution.
pub(crate) fn call_super(
    ec: &mut ExecutionContext<'_>,
    _caller: &Frame,
    calling: &CallingInfo<'_>,
    _cd: &CallData,
) -> VmResult<Value> {
    let entry = bound_entry(calling)?;
    run_entry(ec, entry, calling.recv, calling.args)
}

/// Missing-method dispatch.
///
/// A user-defined `method_missing` receives the method name as a symbol
/// followed by the original arguments. The default one is never called:
/// its behaviour is to raise, and raising here keeps the cached reason.
///
/// The `method_missing` lookup goes through a cached ad hoc site, so a
/// repeated missing call does not search until the hierarchy changes.
pub(crate) fn call_missing(
    ec: &mut ExecutionContext<'_>,
    _caller: &Frame,
    calling: &CallingInfo<'_>,
    cd: &CallData,
) -> VmResult<Value> {
    let vm = ec.vm();
    vm.stats().record_missing();
    let mid = cd.info().mid();
    let reason = cd.cache().missing_reason();

    let class = vm.registry().class_of(calling.recv);
    let Some(handler) = vm.binder().lookup(vm, SiteKey::here(), &class, *METHOD_MISSING) else {
        return Err(missing_method(mid, calling.recv, MissingReason::Missing));
    };
    if handler.is_basic() {
        return Err(missing_method(mid, calling.recv, reason));
    }

    tracing::trace!(method = %mid, ?reason, "forwarding to method_missing");
    let mut argv: SmallVec<[Value; 8]> = SmallVec::with_capacity(calling.args.len() + 1);
    argv.push(Value::Symbol(mid));
    argv.extend(calling.args.iter().cloned());
    run_entry(ec, &handler, calling.recv, &argv)
}

// =============================================================================
// Body Execution
// =============================================================================

/// Run any entry by its body kind, without a cache.
///
/// Used where the strategy was not chosen from the body: `super` forwarding
/// and `method_missing` forwarding.
pub(crate) fn run_entry(
    ec: &mut ExecutionContext<'_>,
    entry: &Arc<MethodEntry>,
    recv: &Value,
    args: &[Value],
) -> VmResult<Value> {
    match &entry.definition.body {
        MethodBody::Iseq { arity, body } => run_iseq(ec, entry, *arity, body, recv, args),
        MethodBody::Native { arity, func } => run_native(ec, entry, *arity, *func, recv, args),
        MethodBody::AttrReader(ivar) => {
            Arity::exact(0).check(args.len())?;
            Ok(match recv {
                Value::Object(obj) => obj
                    .class()
                    .ivar_index_if_present(*ivar)
                    .map_or(Value::Nil, |index| obj.ivar_get(index)),
                _ => Value::Nil,
            })
        }
        MethodBody::AttrWriter(ivar) => {
            Arity::exact(1).check(args.len())?;
            let value = args[0].clone();
            match recv {
                Value::Object(obj) => {
                    obj.ivar_set(obj.class().ivar_index(*ivar), value.clone())?;
                    Ok(value)
                }
                _ => Err(frozen_receiver(recv)),
            }
        }
        MethodBody::Undefined => Err(missing_method(entry.name, recv, MissingReason::NoEntry)),
    }
}

fn run_iseq(
    ec: &mut ExecutionContext<'_>,
    entry: &Arc<MethodEntry>,
    arity: Arity,
    body: &Arc<MethodFn>,
    recv: &Value,
    args: &[Value],
) -> VmResult<Value> {
    arity.check(args.len())?;
    ec.push_frame(Frame::method(FrameKind::Method, recv.clone(), Arc::clone(entry)))?;
    let body: &MethodFn = &**body;
    let result = body(ec, recv, args);
    ec.pop_frame();
    result
}

fn run_native(
    ec: &mut ExecutionContext<'_>,
    entry: &Arc<MethodEntry>,
    arity: Arity,
    func: NativeFn,
    recv: &Value,
    args: &[Value],
) -> VmResult<Value> {
    arity.check(args.len())?;
    ec.push_frame(Frame::method(FrameKind::Native, recv.clone(), Arc::clone(entry)))?;
    let result = func(ec, recv, args);
    ec.pop_frame();
    result
}

/// The entry a non-missing strategy was cached with.
#[inline]
fn bound_entry<'a>(calling: &'a CallingInfo<'_>) -> VmResult<&'a Arc<MethodEntry>> {
    calling
        .entry
        .as_ref()
        .ok_or_else(|| GarnetError::raised("RuntimeError", "call cache lost its method entry"))
}
