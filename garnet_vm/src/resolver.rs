//! Method resolution: the slow path behind every cache miss.
//!
//! Resolution walks the receiver class's ancestors, applies visibility
//! rules for the call site's syntax and turns the outcome into a
//! [`Resolution`]: an entry plus the dispatch strategy and payload to cache.
//! Failures are not raised here. They become a missing-method outcome that
//! is cached like any other and only raised if the missing-method handler
//! finds no `method_missing` override.

use crate::call_cache::{CacheAux, Fill};
use crate::call_data::CallData;
use crate::call_info::CallInfo;
use crate::context::ExecutionContext;
use crate::dispatch::DispatchStrategy;
use crate::frame::Frame;
use crate::vm::Vm;
use garnet_core::{Ident, MissingReason, Serial};
use garnet_runtime::{ClassId, ClassRef, ClassRegistry, MethodBody, MethodEntry, Value, Visibility};
use std::sync::Arc;

/// Outcome of resolving one call.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Resolved entry; `None` for missing-method outcomes.
    pub entry: Option<Arc<MethodEntry>>,
    /// How to run it.
    pub strategy: DispatchStrategy,
    /// Strategy payload.
    pub aux: CacheAux,
}

impl Resolution {
    /// A deferred failure.
    #[inline]
    pub fn missing(reason: MissingReason) -> Self {
        Self {
            entry: None,
            strategy: DispatchStrategy::MissingThunk,
            aux: CacheAux::Missing(reason),
        }
    }

    fn found(entry: Arc<MethodEntry>, recv: &Value) -> Self {
        let (strategy, aux) = match &entry.definition.body {
            MethodBody::Iseq { .. } => (DispatchStrategy::PlainMethod, CacheAux::Empty),
            MethodBody::Native { .. } => (DispatchStrategy::NativeMethod, CacheAux::Empty),
            MethodBody::AttrReader(ivar) => (DispatchStrategy::AttrReader, attr_slot(recv, *ivar)),
            MethodBody::AttrWriter(ivar) => (DispatchStrategy::AttrWriter, attr_slot(recv, *ivar)),
            MethodBody::Undefined => return Self::missing(MissingReason::NoEntry),
        };
        Self {
            entry: Some(entry),
            strategy,
            aux,
        }
    }

    /// Missing reason, if this is a failure.
    #[inline]
    pub fn missing_reason(&self) -> Option<MissingReason> {
        match self.aux {
            CacheAux::Missing(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Instance variable slot for `ivar` on `recv`'s layout.
///
/// Receivers without instance variable storage get no slot.
fn attr_slot(recv: &Value, ivar: Ident) -> CacheAux {
    match recv {
        Value::Object(obj) => CacheAux::AttrIndex(obj.class().ivar_index(ivar)),
        _ => CacheAux::Empty,
    }
}

/// Visibility-agnostic lookup of `mid` starting at `class`.
#[inline]
pub fn search_method(registry: &ClassRegistry, class: &ClassRef, mid: Ident) -> Option<Arc<MethodEntry>> {
    registry.search_method(class, mid)
}

/// Whether `recv` has a method `mid`, as `respond_to?` sees it.
///
/// Private methods count only when `include_private` is set.
pub fn method_defined(registry: &ClassRegistry, recv: &Value, mid: Ident, include_private: bool) -> bool {
    let class = registry.class_of(recv);
    registry
        .search_method(&class, mid)
        .is_some_and(|entry| include_private || entry.visibility != Visibility::Private)
}

/// Whether the caller's `self` may call a protected method owned by `owner`.
pub(crate) fn protected_allowed(registry: &ClassRegistry, caller: &Frame, owner: ClassId) -> bool {
    let caller_class = registry.class_of(caller.self_value());
    registry.is_kind_of(&caller_class, owner)
}

/// Resolve a call without touching any cache.
pub fn resolve(
    registry: &ClassRegistry,
    caller: &Frame,
    ci: &CallInfo,
    class: &ClassRef,
    recv: &Value,
) -> Resolution {
    if ci.is_super() {
        let Some(owner) = caller.defined_class() else {
            return Resolution::missing(MissingReason::Super);
        };
        return match registry.search_super(class, owner, ci.mid()) {
            Some(entry) => Resolution {
                entry: Some(entry),
                strategy: DispatchStrategy::SuperForward,
                aux: CacheAux::Empty,
            },
            None => Resolution::missing(MissingReason::Super),
        };
    }

    let Some(entry) = registry.search_method(class, ci.mid()) else {
        return Resolution::missing(ci.not_found_reason());
    };

    match entry.visibility {
        Visibility::Private if !ci.is_fcall() => Resolution::missing(MissingReason::Private),
        Visibility::Protected if !ci.is_fcall() && !protected_allowed(registry, caller, entry.owner) => {
            Resolution::missing(MissingReason::Protected)
        }
        _ => Resolution::found(entry, recv),
    }
}

/// Resolve a call and record the outcome in `cd`'s cache.
///
/// The serials must have been read before resolution starts: if the class
/// graph changes while resolving, the cached outcome is keyed on the old
/// serials and will miss on the next call.
#[allow(clippy::too_many_arguments)]
pub fn search_method_slowpath(
    ec: &ExecutionContext<'_>,
    caller: &Frame,
    cd: &mut CallData,
    class: &ClassRef,
    recv: &Value,
    class_serial: Serial,
    global: Serial,
    epoch: u64,
) -> Resolution {
    let resolution = resolve(ec.registry(), caller, cd.info(), class, recv);
    let fill = cd.cache_mut().fill(
        resolution.entry.as_ref(),
        resolution.strategy,
        resolution.aux,
        class_serial,
        global,
        epoch,
    );
    ec.vm().stats().record_slow_path(fill == Fill::Extended);
    tracing::trace!(
        method = %cd.info().mid(),
        class = %class.name(),
        strategy = ?resolution.strategy,
        missing = ?resolution.missing_reason(),
        ?fill,
        "call cache filled"
    );
    resolution
}

/// Visibility-agnostic lookup of the site's method from `class`, recorded
/// in `cd`'s cache.
///
/// Serves definition queries that need the entry but make no call. Same
/// serial discipline as [`search_method_slowpath`].
pub fn lookup_slowpath(
    vm: &Vm,
    cd: &mut CallData,
    class: &ClassRef,
    class_serial: Serial,
    global: Serial,
    epoch: u64,
) -> Option<Arc<MethodEntry>> {
    let entry = vm.registry().search_method(class, cd.info().mid());
    let (strategy, aux) = match &entry {
        Some(entry) => (DispatchStrategy::for_body(&entry.definition.body), CacheAux::Empty),
        None => (DispatchStrategy::MissingThunk, CacheAux::Missing(MissingReason::NoEntry)),
    };
    let fill = cd
        .cache_mut()
        .fill(entry.as_ref(), strategy, aux, class_serial, global, epoch);
    vm.stats().record_lookup_fill();
    tracing::trace!(
        method = %cd.info().mid(),
        class = %class.name(),
        found = entry.is_some(),
        ?fill,
        "lookup cache filled"
    );
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use garnet_core::SerialAuthority;
    use garnet_runtime::Arity;

    fn registry() -> ClassRegistry {
        ClassRegistry::new(Arc::new(SerialAuthority::new()))
    }

    fn body() -> MethodBody {
        MethodBody::Iseq {
            arity: Arity::exact(0),
            body: Arc::new(|_: &mut dyn garnet_runtime::Invoke, _: &Value, _: &[Value]| Ok(Value::Nil)),
        }
    }

    #[test]
    fn test_private_needs_implicit_receiver() {
        let reg = registry();
        let c = reg.define_class("Vault", None).unwrap();
        let mid = Ident::new("code");
        reg.define_method(&c, mid, body(), Visibility::Private);
        let obj = reg.new_object(&c).unwrap();
        let top = Frame::top(obj.clone());

        let explicit = resolve(&reg, &top, &CallInfo::method(mid, 0), &c, &obj);
        assert_eq!(explicit.missing_reason(), Some(MissingReason::Private));

        let implicit = resolve(&reg, &top, &CallInfo::fcall(mid, 0), &c, &obj);
        assert_eq!(implicit.strategy, DispatchStrategy::PlainMethod);
        assert!(implicit.entry.is_some());
    }

    #[test]
    fn test_protected_checks_caller_self() {
        let reg = registry();
        let c = reg.define_class("Peer", None).unwrap();
        let mid = Ident::new("secret");
        reg.define_method(&c, mid, body(), Visibility::Protected);
        let obj = reg.new_object(&c).unwrap();

        let from_peer = resolve(&reg, &Frame::top(obj.clone()), &CallInfo::method(mid, 0), &c, &obj);
        assert!(from_peer.entry.is_some());

        let from_outside = resolve(&reg, &Frame::top(Value::Int(1)), &CallInfo::method(mid, 0), &c, &obj);
        assert_eq!(from_outside.missing_reason(), Some(MissingReason::Protected));
    }

    #[test]
    fn test_attr_resolution_allocates_slot() {
        let reg = registry();
        let c = reg.define_class("Box", None).unwrap();
        reg.define_attr_accessor(&c, "width");
        let obj = reg.new_object(&c).unwrap();
        let top = Frame::top(Value::Nil);

        let reader = resolve(&reg, &top, &CallInfo::method(Ident::new("width"), 0), &c, &obj);
        assert_eq!(reader.strategy, DispatchStrategy::AttrReader);
        assert_eq!(reader.aux, CacheAux::AttrIndex(0));

        let writer = resolve(&reg, &top, &CallInfo::method(Ident::new("width="), 1), &c, &obj);
        assert_eq!(writer.strategy, DispatchStrategy::AttrWriter);
        assert_eq!(writer.aux, CacheAux::AttrIndex(0));
    }

    #[test]
    fn test_super_outside_method_is_missing() {
        let reg = registry();
        let c = reg.define_class("Lonely", None).unwrap();
        let obj = reg.new_object(&c).unwrap();
        let res = resolve(
            &reg,
            &Frame::top(obj.clone()),
            &CallInfo::super_call(Ident::new("x"), 0),
            &c,
            &obj,
        );
        assert_eq!(res.missing_reason(), Some(MissingReason::Super));
    }

    #[test]
    fn test_method_defined_respects_private_flag() {
        let reg = registry();
        let c = reg.define_class("Door", None).unwrap();
        reg.define_method(&c, Ident::new("open"), body(), Visibility::Public);
        reg.define_method(&c, Ident::new("hinge"), body(), Visibility::Private);
        let obj = reg.new_object(&c).unwrap();

        assert!(method_defined(&reg, &obj, Ident::new("open"), false));
        assert!(!method_defined(&reg, &obj, Ident::new("hinge"), false));
        assert!(method_defined(&reg, &obj, Ident::new("hinge"), true));
        assert!(!method_defined(&reg, &obj, Ident::new("slam"), true));
        assert!(search_method(&reg, &c, Ident::new("open")).is_some());
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let reg = registry();
        let c = reg.define_class("Stable", None).unwrap();
        let mid = Ident::new("value");
        reg.define_method(&c, mid, body(), Visibility::Public);
        let obj = reg.new_object(&c).unwrap();
        let top = Frame::top(Value::Nil);
        let ci = CallInfo::method(mid, 0);

        let a = resolve(&reg, &top, &ci, &c, &obj);
        let b = resolve(&reg, &top, &ci, &c, &obj);
        assert_eq!(a.strategy, b.strategy);
        assert!(Arc::ptr_eq(a.entry.as_ref().unwrap(), b.entry.as_ref().unwrap()));
    }
}
