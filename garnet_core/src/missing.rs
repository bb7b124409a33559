//! Missing-method reasons.
//!
//! When method resolution fails, the failure is not raised immediately. The
//! reason is recorded in the call cache and only turned into an error when
//! the missing-method path actually runs and no `method_missing` override
//! claims the call. The reason selects both the error message and whether
//! the user hook is consulted.

use std::fmt;

/// Why a call could not be bound to a method.
///
/// The discriminants match the bit values used by the cache's debug dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MissingReason {
    /// Nothing resolved yet, or an explicit-receiver call found no method.
    NoEntry = 0x00,
    /// A private method was called with an explicit receiver.
    Private = 0x01,
    /// A protected method was called from outside its owner's family.
    Protected = 0x02,
    /// A method-call syntax `foo()` with implicit receiver found no method.
    FCall = 0x04,
    /// A variable-like bare identifier `foo` found no method.
    VCall = 0x08,
    /// `super` found no further definition in the ancestors.
    Super = 0x10,
    /// `method_missing` itself could not be found.
    Missing = 0x20,
}

impl MissingReason {
    /// All reasons, in discriminant order.
    pub const ALL: [MissingReason; 7] = [
        Self::NoEntry,
        Self::Private,
        Self::Protected,
        Self::FCall,
        Self::VCall,
        Self::Super,
        Self::Missing,
    ];

    /// Raw bit value.
    #[inline]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Error class name raised for this reason.
    pub const fn error_class(self) -> &'static str {
        match self {
            Self::VCall => "NameError",
            _ => "NoMethodError",
        }
    }

    /// User-facing message for a failed call of `name` on `receiver`.
    pub fn message(self, name: &str, receiver: &str) -> String {
        match self {
            Self::NoEntry | Self::FCall | Self::Missing => {
                format!("undefined method `{name}' for {receiver}")
            }
            Self::Private => format!("private method `{name}' called for {receiver}"),
            Self::Protected => format!("protected method `{name}' called for {receiver}"),
            Self::VCall => format!("undefined local variable or method `{name}' for {receiver}"),
            Self::Super => format!("super: no superclass method `{name}' for {receiver}"),
        }
    }
}

impl fmt::Display for MissingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoEntry => "no-entry",
            Self::Private => "private",
            Self::Protected => "protected",
            Self::FCall => "fcall",
            Self::VCall => "vcall",
            Self::Super => "super",
            Self::Missing => "missing",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_are_distinct() {
        let mut seen = 0u8;
        for reason in MissingReason::ALL.into_iter().skip(1) {
            assert_eq!(seen & reason.bits(), 0);
            seen |= reason.bits();
        }
        assert_eq!(MissingReason::NoEntry.bits(), 0);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            MissingReason::Private.message("secret", "#<Foo>"),
            "private method `secret' called for #<Foo>"
        );
        assert_eq!(
            MissingReason::VCall.message("x", "main"),
            "undefined local variable or method `x' for main"
        );
        assert_eq!(MissingReason::VCall.error_class(), "NameError");
        assert_eq!(MissingReason::Super.error_class(), "NoMethodError");
    }
}
