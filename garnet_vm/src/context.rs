//! Execution context: the frame stack of one thread of execution.

use crate::adhoc::SiteKey;
use crate::call_data::CallData;
use crate::call_info::CallInfo;
use crate::dispatch;
use crate::error::{VmResult, stack_overflow};
use crate::frame::Frame;
use crate::vm::Vm;
use garnet_core::{GarnetError, GarnetResult, Ident, Serial};
use garnet_runtime::{ClassRegistry, Invoke, Value};

/// Frame stack and call entry points for one thread of execution.
///
/// The top frame is never popped, so there is always a current frame.
pub struct ExecutionContext<'vm> {
    vm: &'vm Vm,
    top: Frame,
    frames: Vec<Frame>,
}

impl<'vm> ExecutionContext<'vm> {
    /// Context whose top-level `self` is the VM's main object.
    pub fn new(vm: &'vm Vm) -> Self {
        Self::with_self(vm, vm.main().clone())
    }

    /// Context with an explicit top-level `self`.
    pub fn with_self(vm: &'vm Vm, self_value: Value) -> Self {
        Self {
            vm,
            top: Frame::top(self_value),
            frames: Vec::with_capacity(16),
        }
    }

    /// The VM this context runs in.
    #[inline]
    pub fn vm(&self) -> &'vm Vm {
        self.vm
    }

    /// Shorthand for the VM's class registry.
    #[inline]
    pub fn registry(&self) -> &'vm ClassRegistry {
        self.vm.registry()
    }

    /// The innermost frame.
    #[inline]
    pub fn current_frame(&self) -> &Frame {
        self.frames.last().unwrap_or(&self.top)
    }

    /// Number of method frames above the top frame.
    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn push_frame(&mut self, frame: Frame) -> VmResult<()> {
        let max = self.vm.config().max_call_depth;
        if self.frames.len() >= max {
            tracing::warn!(depth = self.frames.len(), max, "call depth exceeded");
            return Err(stack_overflow(self.frames.len()));
        }
        self.frames.push(frame);
        Ok(())
    }

    pub(crate) fn pop_frame(&mut self) {
        self.frames.pop();
    }

    #[inline]
    pub(crate) fn global_state(&self) -> Serial {
        self.vm.serials().global_method_state()
    }

    /// Epoch stored with cache fills; constant when the guard is off.
    #[inline]
    pub(crate) fn compaction_epoch(&self) -> u64 {
        self.vm.compaction_epoch()
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// Call through a compiled call site.
    #[inline]
    pub fn call(&mut self, cd: &mut CallData, recv: &Value, args: &[Value]) -> VmResult<Value> {
        dispatch::vm_call(self, cd, recv, args)
    }

    /// Call `mid` on `recv` from host code, as an implicit-receiver call.
    ///
    /// The calling source location identifies the call site, so repeated
    /// calls from the same line share one inline cache.
    #[track_caller]
    pub fn funcall(&mut self, recv: &Value, mid: Ident, args: &[Value]) -> VmResult<Value> {
        let key = SiteKey::here();
        self.funcall_at(key, recv, CallInfo::fcall(mid, argc(args)), args)
    }

    /// Call through the ad hoc site named by `key`.
    pub fn funcall_at(&mut self, key: SiteKey, recv: &Value, ci: CallInfo, args: &[Value]) -> VmResult<Value> {
        let vm = self.vm;
        vm.binder().call(self, key, recv, ci, args)
    }
}

impl Invoke for ExecutionContext<'_> {
    fn registry(&self) -> &ClassRegistry {
        self.vm.registry()
    }

    fn send(&mut self, recv: &Value, mid: Ident, args: &[Value]) -> GarnetResult<Value> {
        self.funcall_at(SiteKey::Method(mid), recv, CallInfo::fcall(mid, argc(args)), args)
    }

    fn call_super(&mut self, args: &[Value]) -> GarnetResult<Value> {
        let frame = self.current_frame();
        let Some(entry) = frame.method_entry() else {
            return Err(GarnetError::raised("RuntimeError", "super called outside of method"));
        };
        let mid = entry.definition.original_name;
        let key = SiteKey::Super(entry.defined_class, mid);
        let recv = frame.self_value().clone();
        self.funcall_at(key, &recv, CallInfo::super_call(mid, argc(args)), args)
    }
}

impl std::fmt::Debug for ExecutionContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("depth", &self.depth())
            .field("current", self.current_frame())
            .finish()
    }
}

#[inline]
fn argc(args: &[Value]) -> u16 {
    u16::try_from(args.len()).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VmConfig;
    use crate::frame::FrameKind;
    use garnet_runtime::{MethodEntry, MethodBody, Visibility};
    use std::sync::Arc;

    fn entry() -> Arc<MethodEntry> {
        Arc::new(MethodEntry::new(
            Ident::new("f"),
            garnet_runtime::ClassId::OBJECT,
            Visibility::Public,
            MethodBody::Undefined,
            Serial::new(1),
            false,
        ))
    }

    #[test]
    fn test_top_frame_is_current() {
        let vm = Vm::new();
        let ec = vm.context();
        assert_eq!(ec.depth(), 0);
        assert!(ec.current_frame().self_value().identical(vm.main()));
    }

    #[test]
    fn test_push_respects_max_depth() {
        let vm = Vm::with_config(VmConfig::default().with_max_call_depth(2));
        let mut ec = vm.context();
        let frame = Frame::method(FrameKind::Method, Value::Nil, entry());
        ec.push_frame(frame.clone()).unwrap();
        ec.push_frame(frame.clone()).unwrap();
        let err = ec.push_frame(frame).unwrap_err();
        assert!(matches!(err, GarnetError::StackOverflow { depth: 2 }));
        ec.pop_frame();
        assert_eq!(ec.depth(), 1);
    }

    #[test]
    fn test_pop_never_removes_top() {
        let vm = Vm::new();
        let mut ec = vm.context();
        ec.pop_frame();
        assert_eq!(ec.current_frame().kind(), FrameKind::Top);
    }

    #[test]
    fn test_super_outside_method_raises() {
        let vm = Vm::new();
        let mut ec = vm.context();
        let err = ec.call_super(&[]).unwrap_err();
        assert!(err.to_string().contains("super called outside of method"));
    }
}
