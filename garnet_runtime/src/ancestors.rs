//! Ancestor linearization.
//!
//! Method lookup walks a class's ancestors in this order:
//!
//! 1. modules prepended to the class, most recent first
//! 2. the class itself
//! 3. modules included into the class, most recent first
//! 4. the superclass's ancestors
//!
//! A module's own prepends and includes are expanded around it the same
//! way. When a module appears more than once only its deepest position is
//! kept, so including a module a superclass already includes has no effect
//! on lookup order.
//!
//! # Example
//!
//! ```text
//! module M; end
//! module N; end
//! class A; include M; end
//! class B < A; prepend N; include M; end
//!
//! ancestors(B): [N, B, A, M, Object, Kernel, BasicObject]
//! ```

use crate::class::{ClassId, ClassRef};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use std::sync::Arc;

/// Stack-allocated ancestor list for typical hierarchies.
pub type Ancestors = SmallVec<[ClassRef; 8]>;

/// Compute the lookup order for `class`.
pub fn ancestors(class: &ClassRef) -> Ancestors {
    let mut raw = Ancestors::new();
    let mut current = Some(Arc::clone(class));
    while let Some(c) = current {
        push_with_mixins(&c, &mut raw, 0);
        current = c.superclass().cloned();
    }
    dedup_keep_last(raw)
}

/// Guard against runaway expansion if a cycle ever slips past the
/// include-time check.
const MAX_MIXIN_DEPTH: usize = 64;

fn push_with_mixins(class: &ClassRef, out: &mut Ancestors, depth: usize) {
    if depth > MAX_MIXIN_DEPTH {
        tracing::error!(class = %class.name(), "mixin nesting too deep; truncating ancestors");
        return;
    }
    let (prepends, includes) = {
        let mixins = class.mixins.read();
        (mixins.prepends.clone(), mixins.includes.clone())
    };
    for module in prepends.iter().rev() {
        push_with_mixins(module, out, depth + 1);
    }
    out.push(Arc::clone(class));
    for module in includes.iter().rev() {
        push_with_mixins(module, out, depth + 1);
    }
}

fn dedup_keep_last(raw: Ancestors) -> Ancestors {
    let mut seen = FxHashSet::default();
    let mut kept: Ancestors = raw
        .into_iter()
        .rev()
        .filter(|c| seen.insert(c.id()))
        .collect();
    kept.reverse();
    kept
}

/// Position of `id` in `ancestors`.
#[inline]
pub fn position(ancestors: &[ClassRef], id: ClassId) -> Option<usize> {
    ancestors.iter().position(|c| c.id() == id)
}

/// Whether `id` is among `ancestors`.
#[inline]
pub fn contains(ancestors: &[ClassRef], id: ClassId) -> bool {
    position(ancestors, id).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{ClassKind, RClass};
    use garnet_core::Serial;

    fn class(id: u32, name: &str, kind: ClassKind, superclass: Option<&ClassRef>) -> ClassRef {
        Arc::new(RClass::new(
            ClassId(id),
            name,
            kind,
            superclass.cloned(),
            Serial::new(1),
        ))
    }

    fn names(list: &Ancestors) -> Vec<&str> {
        list.iter().map(|c| c.name()).collect()
    }

    #[test]
    fn test_single_class() {
        let root = class(100, "Root", ClassKind::Class, None);
        assert_eq!(names(&ancestors(&root)), ["Root"]);
    }

    #[test]
    fn test_prepend_include_and_superclass_order() {
        let base = class(100, "Base", ClassKind::Class, None);
        let child = class(101, "Child", ClassKind::Class, Some(&base));
        let m1 = class(102, "M1", ClassKind::Module, None);
        let m2 = class(103, "M2", ClassKind::Module, None);
        let p = class(104, "P", ClassKind::Module, None);
        {
            let mut mixins = child.mixins.write();
            mixins.includes.push(Arc::clone(&m1));
            mixins.includes.push(Arc::clone(&m2));
            mixins.prepends.push(Arc::clone(&p));
        }
        assert_eq!(
            names(&ancestors(&child)),
            ["P", "Child", "M2", "M1", "Base"]
        );
    }

    #[test]
    fn test_module_included_twice_keeps_deepest() {
        let base = class(100, "Base", ClassKind::Class, None);
        let child = class(101, "Child", ClassKind::Class, Some(&base));
        let m = class(102, "M", ClassKind::Module, None);
        base.mixins.write().includes.push(Arc::clone(&m));
        child.mixins.write().includes.push(Arc::clone(&m));

        let list = ancestors(&child);
        assert_eq!(names(&list), ["Child", "Base", "M"]);
        assert_eq!(position(&list, ClassId(102)), Some(2));
        assert!(!contains(&list, ClassId(999)));
    }

    #[test]
    fn test_nested_module_mixins() {
        let c = class(100, "C", ClassKind::Class, None);
        let outer = class(101, "Outer", ClassKind::Module, None);
        let inner = class(102, "Inner", ClassKind::Module, None);
        outer.mixins.write().includes.push(Arc::clone(&inner));
        c.mixins.write().includes.push(Arc::clone(&outer));
        assert_eq!(names(&ancestors(&c)), ["C", "Outer", "Inner"]);
    }
}
