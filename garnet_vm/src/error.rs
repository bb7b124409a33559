//! Dispatch error construction.
//!
//! Execution errors share [`GarnetError`] with the class system so that
//! method bodies, native methods and the dispatch core all propagate one
//! type with `?`. This module adds the constructors the dispatch core needs
//! on its cold paths.

use garnet_core::{GarnetError, Ident, MissingReason};
use garnet_runtime::Value;

/// Result type for VM operations.
pub type VmResult<T> = Result<T, GarnetError>;

/// Error for a call that could not be bound and was not claimed by a
/// `method_missing` override.
#[cold]
#[inline(never)]
pub fn missing_method(mid: Ident, recv: &Value, reason: MissingReason) -> GarnetError {
    GarnetError::no_method(mid.to_string(), recv.describe(), reason)
}

/// Error for exceeding the configured call depth.
#[cold]
#[inline(never)]
pub fn stack_overflow(depth: usize) -> GarnetError {
    GarnetError::StackOverflow { depth }
}

/// Error for writing an attribute on a receiver without instance variables.
#[cold]
pub fn frozen_receiver(recv: &Value) -> GarnetError {
    GarnetError::frozen(recv.inspect())
}
