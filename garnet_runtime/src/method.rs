//! Method entries and definitions.
//!
//! A [`MethodEntry`] is what a method table maps a name to: the owner, the
//! visibility, and a shared [`MethodDefinition`]. Aliasing and visibility
//! changes create new entries over the same definition, so the definition's
//! serial identifies the code while the entry identifies the binding.

use crate::class::ClassId;
use crate::registry::ClassRegistry;
use crate::value::Value;
use garnet_core::{GarnetError, GarnetResult, Ident, Serial};
use std::fmt;
use std::sync::Arc;

/// Method visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    /// Callable from anywhere.
    #[default]
    Public,
    /// Callable only without an explicit receiver.
    Private,
    /// Callable only when the caller's self is a kind of the owner.
    Protected,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Protected => "protected",
        })
    }
}

// =============================================================================
// Invocation Context
// =============================================================================

/// Services available to a method body while it runs.
///
/// Implemented by the VM's execution context.
pub trait Invoke {
    /// The class registry of the running VM.
    fn registry(&self) -> &ClassRegistry;

    /// Call `mid` on `recv` as if from a native call site.
    fn send(&mut self, recv: &Value, mid: Ident, args: &[Value]) -> GarnetResult<Value>;

    /// Call the next definition of the running method up the ancestors.
    fn call_super(&mut self, args: &[Value]) -> GarnetResult<Value>;
}

/// Signature of a native method.
pub type NativeFn = fn(&mut dyn Invoke, &Value, &[Value]) -> GarnetResult<Value>;

/// Compiled body of a user-defined method.
pub type MethodFn = dyn Fn(&mut dyn Invoke, &Value, &[Value]) -> GarnetResult<Value> + Send + Sync;

// =============================================================================
// Arity
// =============================================================================

/// Accepted argument counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    /// Mandatory positional arguments.
    pub required: u16,
    /// Optional positional arguments.
    pub optional: u16,
    /// Whether a rest parameter swallows any excess.
    pub rest: bool,
}

impl Arity {
    /// Exactly `n` arguments.
    #[inline]
    pub const fn exact(n: u16) -> Self {
        Self {
            required: n,
            optional: 0,
            rest: false,
        }
    }

    /// Between `required` and `required + optional` arguments.
    #[inline]
    pub const fn range(required: u16, optional: u16) -> Self {
        Self {
            required,
            optional,
            rest: false,
        }
    }

    /// At least `required` arguments.
    #[inline]
    pub const fn at_least(required: u16) -> Self {
        Self {
            required,
            optional: 0,
            rest: true,
        }
    }

    /// Whether `given` arguments are acceptable.
    #[inline]
    pub fn accepts(&self, given: usize) -> bool {
        let required = usize::from(self.required);
        given >= required && (self.rest || given <= required + usize::from(self.optional))
    }

    /// Check `given` against this arity.
    pub fn check(&self, given: usize) -> GarnetResult<()> {
        if self.accepts(given) {
            Ok(())
        } else {
            Err(GarnetError::Arity {
                given,
                expected: self.to_string(),
            })
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rest {
            write!(f, "{}+", self.required)
        } else if self.optional > 0 {
            write!(f, "{}..{}", self.required, self.required + self.optional)
        } else {
            write!(f, "{}", self.required)
        }
    }
}

// =============================================================================
// Definitions
// =============================================================================

/// What running a method does.
#[derive(Clone)]
pub enum MethodBody {
    /// A user-defined method.
    Iseq {
        /// Accepted arguments.
        arity: Arity,
        /// Compiled body.
        body: Arc<MethodFn>,
    },
    /// A method implemented in Rust.
    Native {
        /// Accepted arguments.
        arity: Arity,
        /// Entry point.
        func: NativeFn,
    },
    /// Returns an instance variable.
    AttrReader(Ident),
    /// Assigns an instance variable and returns the assigned value.
    AttrWriter(Ident),
    /// Marks a name as undefined; lookup stops here.
    Undefined,
}

impl fmt::Debug for MethodBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iseq { arity, .. } => write!(f, "Iseq({arity})"),
            Self::Native { arity, .. } => write!(f, "Native({arity})"),
            Self::AttrReader(ivar) => write!(f, "AttrReader({ivar})"),
            Self::AttrWriter(ivar) => write!(f, "AttrWriter({ivar})"),
            Self::Undefined => f.write_str("Undefined"),
        }
    }
}

/// A method's code, shared by every entry that binds it.
#[derive(Debug)]
pub struct MethodDefinition {
    /// Fresh serial assigned when the definition was created.
    pub serial: Serial,
    /// Name the method was defined under.
    pub original_name: Ident,
    /// Behaviour.
    pub body: MethodBody,
    /// Whether this is the built-in default installed at bootstrap.
    pub basic: bool,
}

/// A method table binding.
#[derive(Debug, Clone)]
pub struct MethodEntry {
    /// Name bound in the table.
    pub name: Ident,
    /// Class or module whose table holds this entry.
    pub owner: ClassId,
    /// Class or module the definition was written in. Differs from `owner`
    /// for aliases and visibility copies; `super` searches from here.
    pub defined_class: ClassId,
    /// Visibility of the binding.
    pub visibility: Visibility,
    /// Shared code.
    pub definition: Arc<MethodDefinition>,
}

impl MethodEntry {
    /// Create a fresh entry over a new definition.
    pub fn new(
        name: Ident,
        owner: ClassId,
        visibility: Visibility,
        body: MethodBody,
        serial: Serial,
        basic: bool,
    ) -> Self {
        Self {
            name,
            owner,
            defined_class: owner,
            visibility,
            definition: Arc::new(MethodDefinition {
                serial,
                original_name: name,
                body,
                basic,
            }),
        }
    }

    /// Whether this entry marks the name as undefined.
    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self.definition.body, MethodBody::Undefined)
    }

    /// The definition's serial.
    #[inline]
    pub fn method_serial(&self) -> Serial {
        self.definition.serial
    }

    /// Whether this is an untouched built-in definition.
    #[inline]
    pub fn is_basic(&self) -> bool {
        self.definition.basic
    }

    /// Same definition rebound under another name or visibility.
    ///
    /// The binding moves to `owner`; the defining class does not.
    pub fn rebind(&self, name: Ident, owner: ClassId, visibility: Visibility) -> Self {
        Self {
            name,
            owner,
            defined_class: self.defined_class,
            visibility,
            definition: Arc::clone(&self.definition),
        }
    }
}
