//! Identifier interning for O(1) method-name comparison.
//!
//! Every method name, instance-variable name and symbol used by the runtime is
//! interned once and referred to by a 32-bit `Ident`. Call sites store the
//! `Ident` of the method they invoke, so comparing two method names is a
//! single integer comparison and a `CallInfo` stays small.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// A handle to an interned identifier.
///
/// Two `Ident`s are equal if and only if they were interned from the same
/// string. Handles are never recycled, so an `Ident` stays valid for the
/// lifetime of the process.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Ident(u32);

impl Ident {
    /// Intern `name` in the global table and return its handle.
    #[inline]
    pub fn new(name: &str) -> Self {
        GLOBAL_IDENTS.intern(name)
    }

    /// Raw numeric id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Resolve the identifier back to its string in the global table.
    #[must_use]
    pub fn name(self) -> Arc<str> {
        GLOBAL_IDENTS
            .resolve(self)
            .unwrap_or_else(|| Arc::from("<unknown>"))
    }

    /// True for identifiers spelled like an attribute writer (`name=`).
    #[must_use]
    pub fn is_attrset(self) -> bool {
        let name = self.name();
        name.len() > 1 && name.ends_with('=') && !name.ends_with("==")
    }
}

impl fmt::Debug for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ident({}: {:?})", self.0, &*self.name())
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl From<&str> for Ident {
    #[inline]
    fn from(name: &str) -> Self {
        Ident::new(name)
    }
}

/// Thread-safe identifier table.
///
/// Maps names to dense ids and back. Reads take a shared lock; only the
/// first interning of a name takes the write lock.
pub struct IdentTable {
    maps: RwLock<IdentMaps>,
}

struct IdentMaps {
    by_name: FxHashMap<Arc<str>, Ident>,
    names: Vec<Arc<str>>,
}

impl IdentTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            maps: RwLock::new(IdentMaps {
                by_name: FxHashMap::default(),
                names: Vec::new(),
            }),
        }
    }

    /// Intern a name, returning the existing handle if it was seen before.
    pub fn intern(&self, name: &str) -> Ident {
        // Fast path: already interned
        if let Some(&ident) = self.maps.read().by_name.get(name) {
            return ident;
        }

        let mut maps = self.maps.write();
        if let Some(&ident) = maps.by_name.get(name) {
            return ident;
        }

        let id = u32::try_from(maps.names.len()).unwrap_or_else(|_| {
            tracing::error!("identifier table exhausted");
            std::process::abort()
        });
        let ident = Ident(id);
        let arc: Arc<str> = name.into();
        maps.names.push(arc.clone());
        maps.by_name.insert(arc, ident);
        ident
    }

    /// Look up a name without interning it.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Ident> {
        self.maps.read().by_name.get(name).copied()
    }

    /// Resolve a handle to its name.
    #[must_use]
    pub fn resolve(&self, ident: Ident) -> Option<Arc<str>> {
        self.maps.read().names.get(ident.0 as usize).cloned()
    }

    /// Number of interned identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.read().names.len()
    }

    /// Check if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for IdentTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IdentTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentTable")
            .field("count", &self.len())
            .finish()
    }
}

/// Process-wide identifier table.
pub static GLOBAL_IDENTS: LazyLock<IdentTable> = LazyLock::new(IdentTable::new);
