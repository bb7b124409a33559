//! Runtime values.

use crate::class::{ClassKind, ClassRef};
use crate::object::RObject;
use garnet_core::Ident;
use std::fmt;
use std::sync::Arc;

/// A runtime value.
///
/// Immediates compare by value; heap objects and classes compare by
/// identity.
#[derive(Clone, Default)]
pub enum Value {
    /// `nil`.
    #[default]
    Nil,
    /// `true` or `false`.
    Bool(bool),
    /// Immediate integer.
    Int(i64),
    /// Immediate float.
    Float(f64),
    /// Immutable string.
    Str(Arc<str>),
    /// Interned symbol.
    Symbol(Ident),
    /// Heap object with instance variables.
    Object(Arc<RObject>),
    /// A class or module.
    Class(ClassRef),
}

impl Value {
    /// Symbol value for `name`.
    #[inline]
    pub fn sym(name: &str) -> Self {
        Self::Symbol(Ident::new(name))
    }

    /// String value.
    #[inline]
    pub fn str(s: &str) -> Self {
        Self::Str(Arc::from(s))
    }

    /// Whether this is `nil`.
    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Everything except `nil` and `false` is truthy.
    #[inline]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Self::Nil | Self::Bool(false))
    }

    /// The integer, if this is one.
    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The symbol's name.
    #[inline]
    pub fn as_symbol(&self) -> Option<Ident> {
        match self {
            Self::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    /// The heap object, if this is one.
    #[inline]
    pub fn as_object(&self) -> Option<&Arc<RObject>> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// The class or module, if this is one.
    #[inline]
    pub fn as_class(&self) -> Option<&ClassRef> {
        match self {
            Self::Class(c) => Some(c),
            _ => None,
        }
    }

    /// Identity comparison (`equal?`).
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Class(a), Self::Class(b)) => Arc::ptr_eq(a, b),
            (Self::Str(a), Self::Str(b)) => Arc::ptr_eq(a, b),
            _ => self == other,
        }
    }

    /// Receiver description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Nil => "nil".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(_) => "an instance of Integer".to_string(),
            Self::Float(_) => "an instance of Float".to_string(),
            Self::Str(_) => "an instance of String".to_string(),
            Self::Symbol(_) => "an instance of Symbol".to_string(),
            Self::Object(o) => format!("an instance of {}", o.class().name()),
            Self::Class(c) => match c.kind() {
                ClassKind::Module => format!("module {}", c.name()),
                _ => format!("class {}", c.name()),
            },
        }
    }

    /// Short `inspect`-style rendering.
    pub fn inspect(&self) -> String {
        match self {
            Self::Nil => "nil".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(x) => format!("{x:?}"),
            Self::Str(s) => format!("{s:?}"),
            Self::Symbol(s) => format!(":{s}"),
            Self::Object(o) => format!("#<{}>", o.class().name()),
            Self::Class(c) => c.name().to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Symbol(a), Self::Symbol(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Class(a), Self::Class(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Int(0).is_truthy());
        assert!(Value::str("").is_truthy());
    }

    #[test]
    fn test_equality_and_identity() {
        let a = Value::str("x");
        let b = Value::str("x");
        assert_eq!(a, b);
        assert!(!a.identical(&b));
        assert!(a.identical(&a.clone()));
        assert!(Value::Int(3).identical(&Value::Int(3)));
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }

    #[test]
    fn test_inspect() {
        assert_eq!(Value::sym("foo").inspect(), ":foo");
        assert_eq!(Value::Int(-4).inspect(), "-4");
        assert_eq!(Value::Nil.describe(), "nil");
        assert_eq!(Value::Int(1).describe(), "an instance of Integer");
    }
}
