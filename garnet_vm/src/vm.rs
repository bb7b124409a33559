//! The VM facade.

use crate::adhoc::AdHocCallBinder;
use crate::call_data::CallData;
use crate::config::VmConfig;
use crate::context::ExecutionContext;
use crate::error::VmResult;
use crate::resolver;
use crate::stats::DispatchStats;
use garnet_core::{Ident, SerialAuthority};
use garnet_gc::{Gc, GcService};
use garnet_runtime::{ClassId, ClassRegistry, RObject, Value};
use std::fmt;
use std::sync::Arc;

/// Owner of the class graph, the GC service and the ad hoc call sites.
///
/// A `Vm` is shared by reference; each thread of execution works through
/// its own [`ExecutionContext`].
pub struct Vm {
    config: VmConfig,
    registry: Arc<ClassRegistry>,
    gc: Arc<dyn GcService>,
    binder: AdHocCallBinder,
    stats: DispatchStats,
    main: Value,
}

impl Vm {
    /// VM with default configuration.
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    /// VM configured from `GARNET_*` environment variables.
    pub fn from_env() -> Self {
        Self::with_config(VmConfig::from_env())
    }

    /// VM with its own registry and collector.
    pub fn with_config(config: VmConfig) -> Self {
        let gc = Arc::new(Gc::new(config.gc.clone()));
        let registry = Arc::new(ClassRegistry::new(Arc::new(SerialAuthority::new())));
        Self::with_services(config, registry, gc)
    }

    /// VM over an existing registry and GC service.
    pub fn with_services(config: VmConfig, registry: Arc<ClassRegistry>, gc: Arc<dyn GcService>) -> Self {
        let main = Value::Object(RObject::new(Arc::clone(&registry.builtins().object)));
        let binder = AdHocCallBinder::with_capacity(config.adhoc_capacity);
        tracing::debug!(
            classes = registry.class_count(),
            max_call_depth = config.max_call_depth,
            compaction_guard = config.compaction_guard,
            "vm initialized"
        );
        Self {
            config,
            registry,
            gc,
            binder,
            stats: DispatchStats::new(),
            main,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Configuration the VM was built with.
    #[inline]
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// The class graph.
    #[inline]
    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// Serial source shared with the registry.
    #[inline]
    pub fn serials(&self) -> &SerialAuthority {
        self.registry.serials()
    }

    /// Collector that holds the ad hoc sites' roots.
    #[inline]
    pub fn gc(&self) -> &dyn GcService {
        &*self.gc
    }

    #[inline]
    pub fn binder(&self) -> &AdHocCallBinder {
        &self.binder
    }

    /// Inline cache counters.
    #[inline]
    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Epoch stored with cache fills; constant when the guard is off.
    #[inline]
    pub(crate) fn compaction_epoch(&self) -> u64 {
        if self.config.compaction_guard {
            self.gc.compaction_epoch()
        } else {
            0
        }
    }

    /// Top-level `self`.
    #[inline]
    pub fn main(&self) -> &Value {
        &self.main
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// A fresh execution context at top level.
    pub fn context(&self) -> ExecutionContext<'_> {
        ExecutionContext::new(self)
    }

    /// Call through a compiled call site from top level.
    pub fn call(&self, cd: &mut CallData, recv: &Value, args: &[Value]) -> VmResult<Value> {
        self.context().call(cd, recv, args)
    }

    /// Call `mid` on `recv` from host code through an ad hoc site.
    #[track_caller]
    pub fn funcall(&self, recv: &Value, mid: Ident, args: &[Value]) -> VmResult<Value> {
        self.context().funcall(recv, mid, args)
    }

    /// Whether `mid` on `class` is still the built-in definition.
    ///
    /// Answered through an ad hoc site keyed by the calling location, so a
    /// query repeated at one place searches only after the class changes.
    #[track_caller]
    pub fn is_basic_definition(&self, class: ClassId, mid: Ident) -> bool {
        self.binder.is_basic_definition(self, class, mid)
    }

    /// Whether `recv` responds to `mid`.
    pub fn respond_to(&self, recv: &Value, mid: Ident, include_private: bool) -> bool {
        resolver::method_defined(&self.registry, recv, mid, include_private)
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Vm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vm")
            .field("config", &self.config)
            .field("classes", &self.registry.class_count())
            .field("adhoc_sites", &self.binder.allocated_sites())
            .field("permanent_roots", &self.gc.permanent_root_count())
            .finish()
    }
}
