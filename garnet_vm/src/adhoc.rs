//! Ad hoc call sites for host code.
//!
//! Native methods and embedders call into the runtime without compiled call
//! sites. The binder gives every distinct host call site its own
//! [`CallData`], allocated on first use and kept for the life of the VM, so
//! host calls hit inline caches the same way compiled code does.
//!
//! Each cell is registered once as a permanent GC root. Its trace reports
//! the cached method entry, which keeps the entry reachable for as long as
//! the cache points at it.
//!
//! # Example
//!
//! ```ignore
//! use garnet_core::Ident;
//!
//! let vm = Vm::new();
//! let mut ec = vm.context();
//! // Same source line, same cache.
//! for _ in 0..100 {
//!     ec.funcall(&Value::Int(1), Ident::new("to_s"), &[])?;
//! }
//! ```

use crate::call_cache::Probe;
use crate::call_data::CallData;
use crate::call_info::CallInfo;
use crate::context::ExecutionContext;
use crate::dispatch;
use crate::error::VmResult;
use crate::resolver;
use crate::stats::DispatchStats;
use crate::vm::Vm;
use garnet_core::Ident;
use garnet_gc::{GcService, Trace, Tracer};
use garnet_runtime::{ClassId, ClassRef, MethodEntry, Value};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

// =============================================================================
// Site Keys
// =============================================================================

/// Identity of an ad hoc call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteKey {
    /// A source location in host code.
    Code(&'static Location<'static>),
    /// A named site chosen by the embedder.
    Named(&'static str),
    /// The generic `send` site for one method name.
    Method(Ident),
    /// The `super` site of one method definition.
    Super(ClassId, Ident),
}

impl SiteKey {
    /// Key for the caller's source location.
    #[inline]
    #[track_caller]
    pub fn here() -> Self {
        Self::Code(Location::caller())
    }

    /// Key for an embedder-chosen name.
    #[inline]
    pub const fn named(name: &'static str) -> Self {
        Self::Named(name)
    }
}

impl fmt::Display for SiteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(loc) => write!(f, "{}:{}:{}", loc.file(), loc.line(), loc.column()),
            Self::Named(name) => write!(f, "named:{name}"),
            Self::Method(mid) => write!(f, "send:{mid}"),
            Self::Super(owner, mid) => write!(f, "super:{owner:?}#{mid}"),
        }
    }
}

// =============================================================================
// Cells
// =============================================================================

/// Persistent call data for one ad hoc site.
pub struct AdHocCell {
    key: SiteKey,
    data: Mutex<CallData>,
}

impl AdHocCell {
    fn new(key: SiteKey, ci: CallInfo) -> Self {
        Self {
            key,
            data: Mutex::new(CallData::new(ci)),
        }
    }

    /// Site identity.
    #[inline]
    pub fn key(&self) -> SiteKey {
        self.key
    }

    /// Copy of the current call data.
    pub fn snapshot(&self) -> CallData {
        self.data.lock().clone()
    }
}

impl Trace for AdHocCell {
    fn trace(&self, tracer: &mut dyn Tracer) {
        if let Some(entry) = self.data.lock().cache().entry() {
            tracer.trace_ptr(Arc::as_ptr(&entry).cast());
        }
    }
}

impl fmt::Debug for AdHocCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdHocCell")
            .field("key", &self.key)
            .field("data", &*self.data.lock())
            .finish()
    }
}

// =============================================================================
// Binder
// =============================================================================

/// Registry of ad hoc call sites.
pub struct AdHocCallBinder {
    sites: RwLock<FxHashMap<SiteKey, Arc<AdHocCell>>>,
}

impl AdHocCallBinder {
    /// Create a binder presized for `capacity` sites.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut sites = FxHashMap::default();
        sites.reserve(capacity);
        Self {
            sites: RwLock::new(sites),
        }
    }

    /// Number of sites allocated so far.
    pub fn allocated_sites(&self) -> usize {
        self.sites.read().len()
    }

    /// The cell for `key`, if it has been allocated.
    pub fn site(&self, key: &SiteKey) -> Option<Arc<AdHocCell>> {
        self.sites.read().get(key).cloned()
    }

    /// The cell for `key`, allocating and rooting it on first use.
    fn cell(&self, key: SiteKey, ci: CallInfo, gc: &dyn GcService, stats: &DispatchStats) -> Arc<AdHocCell> {
        if let Some(cell) = self.sites.read().get(&key) {
            return Arc::clone(cell);
        }

        let mut sites = self.sites.write();
        if let Some(cell) = sites.get(&key) {
            return Arc::clone(cell);
        }

        let cell = Arc::new(AdHocCell::new(key, ci));
        let root = gc.register_permanent_root(Arc::clone(&cell) as Arc<dyn Trace + Send + Sync>);
        sites.insert(key, Arc::clone(&cell));
        stats.record_adhoc_site();
        tracing::debug!(site = %key, method = %ci.mid(), ?root, "ad hoc call site allocated");
        cell
    }

    /// Call through the site named by `key`.
    ///
    /// The site's call data is copied out for the duration of the call and
    /// written back afterwards, so a method that re-enters the same site
    /// (recursion through `send`, for one) never waits on its own lock.
    pub fn call(
        &self,
        ec: &mut ExecutionContext<'_>,
        key: SiteKey,
        recv: &Value,
        ci: CallInfo,
        args: &[Value],
    ) -> VmResult<Value> {
        let vm = ec.vm();
        let cell = self.cell(key, ci, vm.gc(), vm.stats());

        let mut cd = {
            let data = cell.data.lock();
            let mut cd = data.clone();
            if *cd.info() != ci {
                cd.rebind(ci);
            }
            cd
        };

        let result = dispatch::vm_call(ec, &mut cd, recv, args);
        *cell.data.lock() = cd;
        result
    }

    /// Definition of `mid` as seen from `class`, cached at the site `key`.
    ///
    /// Visibility is ignored. The lookup is keyed on the same serials as a
    /// call, so it searches again only after `class` or an ancestor changes.
    pub fn lookup(&self, vm: &Vm, key: SiteKey, class: &ClassRef, mid: Ident) -> Option<Arc<MethodEntry>> {
        let class_serial = class.serial();
        let global = vm.serials().global_method_state();
        let epoch = vm.compaction_epoch();

        let ci = CallInfo::fcall(mid, 0);
        let cell = self.cell(key, ci, vm.gc(), vm.stats());
        let mut cd = cell.data.lock();
        if *cd.info() != ci {
            cd.rebind(ci);
        }

        match cd.cache().probe(class_serial, global, epoch) {
            Probe::Hit(entry) => {
                vm.stats().record_lookup_hit();
                entry
            }
            Probe::Miss => resolver::lookup_slowpath(vm, &mut cd, class, class_serial, global, epoch),
        }
    }

    /// Whether `mid` on `class` still resolves to its built-in definition.
    ///
    /// The calling location names the site. Hidden classes never have user
    /// definitions and allocate nothing.
    #[track_caller]
    pub fn is_basic_definition(&self, vm: &Vm, class: ClassId, mid: Ident) -> bool {
        if class == ClassId::HIDDEN {
            return true;
        }
        let key = SiteKey::here();
        let Some(class) = vm.registry().get(class) else {
            return false;
        };
        self.lookup(vm, key, &class, mid).is_some_and(|entry| entry.is_basic())
    }
}

impl Default for AdHocCallBinder {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl fmt::Debug for AdHocCallBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdHocCallBinder")
            .field("sites", &self.allocated_sites())
            .finish()
    }
}
