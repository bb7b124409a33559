//! # Garnet Runtime
//!
//! The object model the dispatch core resolves against:
//!
//! - **Classes**: `RClass` with method tables, mixins and class serials
//! - **Registry**: `ClassRegistry`, the single owner of the class graph and
//!   the only place serials are invalidated
//! - **Methods**: `MethodEntry`/`MethodDefinition` with visibility and the
//!   basic-definition flag
//! - **Ancestors**: prepend/include/superclass linearization
//! - **Values**: `Value` and heap `RObject`s

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod ancestors;
mod builtins;
pub mod class;
pub mod method;
pub mod object;
pub mod registry;
pub mod value;

#[cfg(test)]
mod registry_tests;

pub use ancestors::Ancestors;
pub use class::{ClassId, ClassKind, ClassRef, RClass};
pub use method::{
    Arity, Invoke, MethodBody, MethodDefinition, MethodEntry, MethodFn, NativeFn, Visibility,
};
pub use object::RObject;
pub use registry::{Builtins, ClassRegistry};
pub use value::Value;
