//! Root tracking.
//!
//! GC roots are the starting points for marking. The dispatch core only
//! needs *permanent* roots: structures registered once that stay reachable
//! for the rest of the process (ad hoc call-site caches).

use crate::trace::{Trace, Tracer};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Identifier of a registered root (its registration index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootId(pub u32);

/// Root set for garbage collection.
///
/// Permanent roots can only be added; there is no unregister operation.
pub struct RootSet {
    permanent: RwLock<Vec<Arc<dyn Trace + Send + Sync>>>,
}

impl RootSet {
    /// Create a new empty root set.
    pub fn new() -> Self {
        Self {
            permanent: RwLock::new(Vec::new()),
        }
    }

    /// Create a root set with room for `capacity` permanent roots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            permanent: RwLock::new(Vec::with_capacity(capacity)),
        }
    }

    /// Register a permanent root.
    pub fn register_permanent(&self, root: Arc<dyn Trace + Send + Sync>) -> RootId {
        let mut roots = self.permanent.write();
        let id = RootId(roots.len() as u32);
        roots.push(root);
        id
    }

    /// Trace all roots.
    pub fn trace(&self, tracer: &mut dyn Tracer) {
        for root in self.permanent.read().iter() {
            root.trace(tracer);
        }
    }

    /// Number of permanent roots.
    pub fn permanent_count(&self) -> usize {
        self.permanent.read().len()
    }
}

impl Default for RootSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RootSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootSet")
            .field("permanent", &self.permanent_count())
            .finish()
    }
}
