//! Method dispatch core for the Garnet runtime.
//!
//! Every call site owns a [`CallData`]: immutable call info plus a
//! polymorphic inline cache. A call resolves a method the first time and
//! afterwards costs one serial compare and one indirect call through the
//! static [`DISPATCH_TABLE`].
//!
//! - **Inline caches**: one cache line per site, validated by class serial,
//!   global method state and method serial; several classes that resolve
//!   to the same entry share the line
//! - **Resolution**: ancestry search, visibility rules and deferred
//!   missing-method outcomes
//! - **Strategies**: plain, native, attribute reader and writer, `super`
//!   forwarding and missing-method dispatch
//! - **Ad hoc sites**: persistent, GC-rooted call data for host code
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                          Vm                            │
//! │  ┌───────────────┐  ┌──────────────┐  ┌────────────┐   │
//! │  │ ClassRegistry │  │ GcService    │  │ AdHocCall- │   │
//! │  │ (serials)     │  │ (roots, epo.)│  │ Binder     │   │
//! │  └───────────────┘  └──────────────┘  └────────────┘   │
//! └───────────────────────────────────────────────────────┘
//!         │ ExecutionContext (frames)
//!         ▼
//!   vm_call(cd) ── probe ──hit──► DISPATCH_TABLE[strategy]
//!                   │miss
//!                   ▼
//!            search_method_slowpath ── fill ──►
//! ```
//!
//! # Example
//!
//! ```ignore
//! use garnet_core::Ident;
//! use garnet_vm::{CallData, CallInfo, Vm};
//!
//! let vm = Vm::new();
//! let mut cd = CallData::new(CallInfo::method(Ident::new("+"), 1));
//! let sum = vm.call(&mut cd, &Value::Int(1), &[Value::Int(2)])?;
//! assert_eq!(sum, Value::Int(3));
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

// Call sites
pub mod call_cache;
pub mod call_data;
pub mod call_info;

// Dispatch
pub mod dispatch;
mod handlers;
pub mod resolver;

// Execution
pub mod adhoc;
pub mod config;
pub mod context;
pub mod error;
pub mod frame;
pub mod stats;
pub mod vm;


// Re-exports
pub use adhoc::{AdHocCallBinder, AdHocCell, SiteKey};
pub use call_cache::{CLASS_SERIAL_SLOTS, CacheAux, CallCache, Fill, Probe};
pub use call_data::CallData;
pub use call_info::{CallFlags, CallInfo};
pub use config::VmConfig;
pub use context::ExecutionContext;
pub use dispatch::{CallingInfo, DISPATCH_TABLE, DispatchStrategy, StrategyHandler, vm_call};
pub use error::VmResult;
pub use frame::{Frame, FrameKind};
pub use resolver::{Resolution, lookup_slowpath, method_defined, resolve, search_method, search_method_slowpath};
pub use stats::{DispatchStats, DispatchStatsSnapshot};
pub use vm::Vm;
