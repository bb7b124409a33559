//! Heap objects.

use crate::class::ClassRef;
use crate::value::Value;
use garnet_core::{GarnetError, GarnetResult};
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Inline capacity for instance variables.
const INLINE_IVARS: usize = 4;

/// An instance of a user or built-in class.
///
/// Instance variables live in slots whose indices come from the class's
/// layout ([`RClass::ivar_index`](crate::class::RClass::ivar_index)).
pub struct RObject {
    class: ClassRef,
    singleton: OnceLock<ClassRef>,
    ivars: RwLock<SmallVec<[Value; INLINE_IVARS]>>,
    frozen: AtomicBool,
}

impl RObject {
    /// Allocate an instance of `class` without checking its kind.
    ///
    /// `ClassRegistry::new_object` is the checked entry point.
    pub fn new(class: ClassRef) -> Arc<Self> {
        Arc::new(Self {
            class,
            singleton: OnceLock::new(),
            ivars: RwLock::new(SmallVec::new()),
            frozen: AtomicBool::new(false),
        })
    }

    /// The object's real class, ignoring any singleton class.
    #[inline]
    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    /// The singleton class, if one has been created.
    #[inline]
    pub fn singleton(&self) -> Option<&ClassRef> {
        self.singleton.get()
    }

    pub(crate) fn singleton_cell(&self) -> &OnceLock<ClassRef> {
        &self.singleton
    }

    /// The class method lookup starts from.
    #[inline]
    pub fn dispatch_class(&self) -> &ClassRef {
        self.singleton.get().unwrap_or(&self.class)
    }

    /// Read slot `index`; unset slots read as `nil`.
    #[inline]
    pub fn ivar_get(&self, index: u32) -> Value {
        self.ivars
            .read()
            .get(index as usize)
            .cloned()
            .unwrap_or(Value::Nil)
    }

    /// Write slot `index`, growing the slot vector as needed.
    pub fn ivar_set(&self, index: u32, value: Value) -> GarnetResult<()> {
        if self.is_frozen() {
            return Err(GarnetError::frozen(self.class.name()));
        }
        let mut ivars = self.ivars.write();
        let idx = index as usize;
        if idx >= ivars.len() {
            ivars.resize(idx + 1, Value::Nil);
        }
        ivars[idx] = value;
        Ok(())
    }

    /// Number of slots materialized on this object.
    pub fn ivar_len(&self) -> usize {
        self.ivars.read().len()
    }

    /// Freeze the object against instance-variable writes.
    #[inline]
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    /// Whether [`freeze`](Self::freeze) has been called.
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }
}

impl fmt::Debug for RObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RObject")
            .field("class", &self.class.name())
            .field("ivars", &self.ivar_len())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}
