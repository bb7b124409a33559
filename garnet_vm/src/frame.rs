//! Control frames.

use garnet_runtime::{ClassId, MethodEntry, Value};
use std::sync::Arc;

/// What pushed a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Top-level frame of an execution context.
    Top,
    /// A user-defined method body.
    Method,
    /// A native method.
    Native,
}

/// One activation on the execution context's frame stack.
///
/// Resolution reads the frame's `self` for protected checks and its method
/// entry for `super`.
#[derive(Debug, Clone)]
pub struct Frame {
    kind: FrameKind,
    self_value: Value,
    method: Option<Arc<MethodEntry>>,
}

impl Frame {
    /// Top-level frame with `self_value` as self.
    pub fn top(self_value: Value) -> Self {
        Self {
            kind: FrameKind::Top,
            self_value,
            method: None,
        }
    }

    /// Frame for running `entry` on `recv`.
    pub fn method(kind: FrameKind, recv: Value, entry: Arc<MethodEntry>) -> Self {
        Self {
            kind,
            self_value: recv,
            method: Some(entry),
        }
    }

    /// What pushed this frame.
    #[inline]
    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    /// The frame's `self`.
    #[inline]
    pub fn self_value(&self) -> &Value {
        &self.self_value
    }

    /// The running method, if any.
    #[inline]
    pub fn method_entry(&self) -> Option<&Arc<MethodEntry>> {
        self.method.as_ref()
    }

    /// Class or module the running method was written in.
    ///
    /// For an alias or a visibility copy this is the original class, not the
    /// one holding the binding, so `super` continues past the original.
    #[inline]
    pub fn defined_class(&self) -> Option<ClassId> {
        self.method.as_ref().map(|m| m.defined_class)
    }
}
