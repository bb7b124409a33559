//! Garnet Garbage Collector Service
//!
//! The collector contract consumed by the method-dispatch core. The dispatch
//! caches need three things from the GC:
//!
//! - **Permanent roots**: ad hoc call sites register their call data once and
//!   it is never collected.
//! - **Marking**: rooted call data reports the method entries it caches so
//!   they are treated as reachable.
//! - **Compaction epochs**: a counter bumped every time live objects move.
//!   Debug builds record it in call caches and force re-resolution when it
//!   changes.
//!
//! # Usage
//!
//! ```ignore
//! use garnet_gc::{Gc, GcConfig, GcService};
//!
//! let gc = Gc::new(GcConfig::default());
//! gc.register_permanent_root(Arc::new(my_call_site));
//!
//! let result = gc.collect();
//! assert!(result.marked >= 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compaction;
pub mod config;
pub mod roots;
pub mod trace;

mod collector;
mod stats;

pub use collector::{CollectionResult, Gc};
pub use compaction::CompactionEpoch;
pub use config::GcConfig;
pub use roots::{RootId, RootSet};
pub use stats::{GcStats, GcStatsSnapshot};
pub use trace::{CountingTracer, MarkSet, NullTracer, Trace, Tracer};

use std::sync::Arc;

/// Services the runtime consumes from the garbage collector.
///
/// Implemented by [`Gc`]; the VM holds it as `Arc<dyn GcService>` so tests and
/// embedders can substitute their own collector.
pub trait GcService: Send + Sync {
    /// Register an object that must stay reachable for the rest of the process.
    ///
    /// Permanent roots are traced on every collection and are never removed.
    fn register_permanent_root(&self, root: Arc<dyn Trace + Send + Sync>) -> RootId;

    /// Number of permanent roots registered so far.
    fn permanent_root_count(&self) -> usize;

    /// Current compaction epoch.
    fn compaction_epoch(&self) -> u64;
}
