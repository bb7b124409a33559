//! Classes and modules.
//!
//! An [`RClass`] carries everything method resolution reads: its method
//! table, its superclass, the modules it includes or prepends, and the
//! class serial that call caches compare against. The serial is replaced
//! with a fresh value from the [`SerialAuthority`](garnet_core::SerialAuthority)
//! whenever anything that could change a lookup through this class changes.

use crate::method::MethodEntry;
use garnet_core::{Ident, Serial};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

// =============================================================================
// Class ID
// =============================================================================

/// Compact class identifier.
///
/// Built-in classes have fixed ids; user classes get ids in creation order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ClassId(pub u32);

impl ClassId {
    /// `BasicObject`, the root of every hierarchy.
    pub const BASIC_OBJECT: Self = Self(0);
    /// `Object`.
    pub const OBJECT: Self = Self(1);
    /// `Module`.
    pub const MODULE: Self = Self(2);
    /// `Class`.
    pub const CLASS: Self = Self(3);
    /// The `Kernel` module, included into `Object`.
    pub const KERNEL: Self = Self(4);
    /// `NilClass`.
    pub const NIL: Self = Self(5);
    /// `TrueClass`.
    pub const TRUE: Self = Self(6);
    /// `FalseClass`.
    pub const FALSE: Self = Self(7);
    /// `Integer`.
    pub const INTEGER: Self = Self(8);
    /// `Float`.
    pub const FLOAT: Self = Self(9);
    /// `String`.
    pub const STRING: Self = Self(10);
    /// `Symbol`.
    pub const SYMBOL: Self = Self(11);

    /// First id handed to a class created after bootstrap.
    pub const FIRST_USER_CLASS: u32 = 12;

    /// Sentinel naming no real class.
    ///
    /// Queries about this id always report built-in behaviour, which lets
    /// dispatch code run before any class graph exists.
    pub const HIDDEN: Self = Self(u32::MAX);

    /// Get raw value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Check if this is a built-in class.
    #[inline]
    pub const fn is_builtin(self) -> bool {
        self.0 < Self::FIRST_USER_CLASS
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::HIDDEN {
            f.write_str("ClassId(hidden)")
        } else {
            write!(f, "ClassId({})", self.0)
        }
    }
}

// =============================================================================
// RClass
// =============================================================================

/// What kind of namespace a class object is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    /// An instantiable class.
    Class,
    /// A module: can be included or prepended, never instantiated.
    Module,
    /// A singleton class attached to one object or class.
    Singleton,
}

/// Shared handle to a class.
pub type ClassRef = Arc<RClass>;

/// Modules mixed into a class, in the order they were added.
#[derive(Default)]
pub(crate) struct Mixins {
    pub(crate) includes: SmallVec<[ClassRef; 2]>,
    pub(crate) prepends: SmallVec<[ClassRef; 2]>,
}

/// Instance variable layout for instances of one class.
///
/// Slots are append-only, so an index handed out once stays valid and
/// layout growth never needs to invalidate caches.
#[derive(Default)]
struct IvarTable {
    index: FxHashMap<Ident, u32>,
    names: Vec<Ident>,
}

/// A class, module or singleton class.
pub struct RClass {
    id: ClassId,
    name: Arc<str>,
    kind: ClassKind,
    superclass: Option<ClassRef>,
    serial: AtomicU64,
    pub(crate) methods: RwLock<FxHashMap<Ident, Arc<MethodEntry>>>,
    pub(crate) mixins: RwLock<Mixins>,
    /// Classes whose resolution reads through this one: subclasses,
    /// includers and prependers, singleton classes.
    dependents: Mutex<Vec<Weak<RClass>>>,
    ivars: RwLock<IvarTable>,
    pub(crate) singleton: OnceLock<ClassRef>,
}

impl RClass {
    pub(crate) fn new(
        id: ClassId,
        name: impl Into<Arc<str>>,
        kind: ClassKind,
        superclass: Option<ClassRef>,
        serial: Serial,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            superclass,
            serial: AtomicU64::new(serial.value()),
            methods: RwLock::new(FxHashMap::default()),
            mixins: RwLock::new(Mixins::default()),
            dependents: Mutex::new(Vec::new()),
            ivars: RwLock::new(IvarTable::default()),
            singleton: OnceLock::new(),
        }
    }

    /// Class id.
    #[inline]
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Class name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Class kind.
    #[inline]
    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    /// Whether this is a module.
    #[inline]
    pub fn is_module(&self) -> bool {
        self.kind == ClassKind::Module
    }

    /// Whether this is a singleton class.
    #[inline]
    pub fn is_singleton(&self) -> bool {
        self.kind == ClassKind::Singleton
    }

    /// Direct superclass.
    #[inline]
    pub fn superclass(&self) -> Option<&ClassRef> {
        self.superclass.as_ref()
    }

    /// Current class serial.
    ///
    /// This is the fast-path read of every cached call.
    #[inline(always)]
    pub fn serial(&self) -> Serial {
        Serial::new(self.serial.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn set_serial(&self, serial: Serial) {
        self.serial.store(serial.value(), Ordering::Release);
    }

    /// Singleton class, if one has been created.
    #[inline]
    pub fn singleton(&self) -> Option<&ClassRef> {
        self.singleton.get()
    }

    /// Entry defined directly in this class's own method table.
    #[inline]
    pub fn own_method(&self, mid: Ident) -> Option<Arc<MethodEntry>> {
        self.methods.read().get(&mid).cloned()
    }

    /// Names in this class's own method table.
    pub fn own_method_names(&self) -> Vec<Ident> {
        let mut names: Vec<Ident> = self.methods.read().keys().copied().collect();
        names.sort();
        names
    }

    /// Included modules, most recent last.
    pub fn includes(&self) -> Vec<ClassRef> {
        self.mixins.read().includes.to_vec()
    }

    /// Prepended modules, most recent last.
    pub fn prepends(&self) -> Vec<ClassRef> {
        self.mixins.read().prepends.to_vec()
    }

    pub(crate) fn add_dependent(&self, dependent: &ClassRef) {
        let mut deps = self.dependents.lock();
        deps.retain(|d| d.strong_count() > 0);
        deps.push(Arc::downgrade(dependent));
    }

    pub(crate) fn live_dependents(&self) -> Vec<ClassRef> {
        self.dependents.lock().iter().filter_map(Weak::upgrade).collect()
    }

    /// Slot index of instance variable `name` for instances of this class,
    /// allocating one on first use.
    pub fn ivar_index(&self, name: Ident) -> u32 {
        if let Some(&idx) = self.ivars.read().index.get(&name) {
            return idx;
        }
        let mut table = self.ivars.write();
        if let Some(&idx) = table.index.get(&name) {
            return idx;
        }
        let idx = table.names.len() as u32;
        table.names.push(name);
        table.index.insert(name, idx);
        idx
    }

    /// Slot index of `name` if one has been allocated.
    #[inline]
    pub fn ivar_index_if_present(&self, name: Ident) -> Option<u32> {
        self.ivars.read().index.get(&name).copied()
    }

    /// Number of instance variable slots allocated.
    pub fn ivar_count(&self) -> usize {
        self.ivars.read().names.len()
    }
}

impl fmt::Debug for RClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RClass")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("serial", &self.serial())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for RClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
