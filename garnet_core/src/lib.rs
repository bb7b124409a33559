//! # Garnet Core
//!
//! Core types shared by every Garnet crate:
//!
//! - **Identifiers**: interned method and variable names (`Ident`) with O(1) equality
//! - **Serials**: the `SerialAuthority` that hands out cache-invalidation fingerprints
//! - **Missing reasons**: why a call could not be bound (`MissingReason`)
//! - **Error Handling**: `GarnetError` and `GarnetResult`

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod intern;
pub mod missing;
pub mod serial;

pub use error::{GarnetError, GarnetResult};
pub use intern::{Ident, IdentTable};
pub use missing::MissingReason;
pub use serial::{Serial, SerialAuthority};

/// Garnet runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
