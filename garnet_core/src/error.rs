//! Error types shared by the class system and the dispatch core.
//!
//! Class-graph mutations report malformed requests directly. Dispatch
//! failures are deferred: resolution records a [`MissingReason`] in the call
//! cache and the error is only built when the missing-method path runs.

use crate::missing::MissingReason;
use thiserror::Error;

/// The unified result type for core and runtime services.
pub type GarnetResult<T> = Result<T, GarnetError>;

/// Errors raised by the class system, object model and dispatch core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GarnetError {
    /// A class id does not name a live class.
    #[error("NameError: uninitialized class id {id}")]
    UnknownClass {
        /// The offending class id.
        id: u32,
    },

    /// An operation expected a module but received a class (or vice versa).
    #[error("TypeError: {message}")]
    TypeError {
        /// Error description.
        message: String,
    },

    /// A method name does not exist where it was expected.
    #[error("NameError: {kind} `{name}' for `{owner}'")]
    NameError {
        /// What was being looked up ("undefined method", "method not defined").
        kind: &'static str,
        /// The missing name.
        name: String,
        /// The class or module searched.
        owner: String,
    },

    /// Including or prepending would make a module its own ancestor.
    #[error("ArgumentError: cyclic include detected: {module} into {target}")]
    CyclicInclude {
        /// The module being included.
        module: String,
        /// The include target.
        target: String,
    },

    /// A frozen class or object was mutated.
    #[error("FrozenError: can't modify frozen {what}")]
    Frozen {
        /// Description of the frozen receiver.
        what: String,
    },

    /// An instance variable slot index is out of bounds.
    #[error("IndexError: instance variable slot {index} out of range ({len} slots)")]
    IvarIndex {
        /// Requested slot.
        index: u32,
        /// Number of slots available.
        len: usize,
    },

    /// A call could not be bound and no `method_missing` override claimed it.
    #[error("{}: {}", .reason.error_class(), .reason.message(.name, .receiver))]
    NoMethod {
        /// Method name as written at the call site.
        name: String,
        /// Description of the receiver.
        receiver: String,
        /// Why resolution failed.
        reason: MissingReason,
    },

    /// A method was called with the wrong number of arguments.
    #[error("ArgumentError: wrong number of arguments (given {given}, expected {expected})")]
    Arity {
        /// Arguments supplied.
        given: usize,
        /// Accepted arity, e.g. `1`, `1..2` or `1+`.
        expected: String,
    },

    /// The call depth limit was exceeded.
    #[error("SystemStackError: stack level too deep (depth {depth})")]
    StackOverflow {
        /// Depth at which the limit tripped.
        depth: usize,
    },

    /// An exception raised by method code.
    #[error("{class_name}: {message}")]
    Raised {
        /// Exception class name.
        class_name: String,
        /// Exception message.
        message: String,
    },
}

impl GarnetError {
    /// Create a type error.
    #[inline]
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError {
            message: message.into(),
        }
    }

    /// Create an "undefined method" name error.
    #[inline]
    pub fn undefined_method(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self::NameError {
            kind: "undefined method",
            name: name.into(),
            owner: owner.into(),
        }
    }

    /// Create a frozen error.
    #[inline]
    pub fn frozen(what: impl Into<String>) -> Self {
        Self::Frozen { what: what.into() }
    }

    /// Create a missing-method error.
    #[cold]
    pub fn no_method(
        name: impl Into<String>,
        receiver: impl Into<String>,
        reason: MissingReason,
    ) -> Self {
        Self::NoMethod {
            name: name.into(),
            receiver: receiver.into(),
            reason,
        }
    }

    /// Create an exception raised by method code.
    pub fn raised(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Raised {
            class_name: class_name.into(),
            message: message.into(),
        }
    }

    /// The missing-method reason, if this is a dispatch failure.
    #[inline]
    pub fn missing_reason(&self) -> Option<MissingReason> {
        match self {
            Self::NoMethod { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}
