//! Reachability tracing.
//!
//! The `Trace` trait is the interface between rooted runtime structures and
//! the collector. A root reports every object it keeps alive by calling
//! `Tracer::trace_ptr` with that object's address; this is the collector's
//! "mark as reachable" operation.

use rustc_hash::FxHashSet;

/// Types that can report the objects they keep alive.
///
/// Implementations must report every reference they hold. Reporting a
/// reference more than once is harmless.
///
/// # Example
///
/// ```ignore
/// use garnet_gc::{Trace, Tracer};
///
/// struct Site {
///     entry: Weak<MethodEntry>,
/// }
///
/// impl Trace for Site {
///     fn trace(&self, tracer: &mut dyn Tracer) {
///         if let Some(entry) = self.entry.upgrade() {
///             tracer.trace_ptr(Arc::as_ptr(&entry).cast());
///         }
///     }
/// }
/// ```
pub trait Trace {
    /// Visit all object references held by this value.
    fn trace(&self, tracer: &mut dyn Tracer);
}

/// Visitor for object references during marking.
pub trait Tracer {
    /// Mark the object at `ptr` as reachable. Null pointers are ignored.
    fn trace_ptr(&mut self, ptr: *const ());
}

/// A tracer that does nothing (for testing).
pub struct NullTracer;

impl Tracer for NullTracer {
    #[inline]
    fn trace_ptr(&mut self, _ptr: *const ()) {}
}

/// A counting tracer for debugging and statistics.
#[derive(Debug, Default)]
pub struct CountingTracer {
    /// Number of non-null pointers traced.
    pub ptr_count: usize,
    /// Number of null pointers skipped.
    pub null_count: usize,
}

impl CountingTracer {
    /// Create a new counting tracer.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tracer for CountingTracer {
    fn trace_ptr(&mut self, ptr: *const ()) {
        if ptr.is_null() {
            self.null_count += 1;
        } else {
            self.ptr_count += 1;
        }
    }
}

/// Marking tracer that records the set of reachable addresses.
#[derive(Debug, Default)]
pub struct MarkSet {
    marked: FxHashSet<usize>,
}

impl MarkSet {
    /// Create an empty mark set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `ptr` was marked.
    #[inline]
    pub fn is_marked(&self, ptr: *const ()) -> bool {
        self.marked.contains(&(ptr as usize))
    }

    /// Number of distinct marked objects.
    #[inline]
    pub fn len(&self) -> usize {
        self.marked.len()
    }

    /// True if nothing was marked.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.marked.is_empty()
    }
}

impl Tracer for MarkSet {
    #[inline]
    fn trace_ptr(&mut self, ptr: *const ()) {
        if !ptr.is_null() {
            self.marked.insert(ptr as usize);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pair(Box<u32>, Box<u32>);

    impl Trace for Pair {
        fn trace(&self, tracer: &mut dyn Tracer) {
            tracer.trace_ptr((&*self.0 as *const u32).cast());
            tracer.trace_ptr((&*self.1 as *const u32).cast());
        }
    }

    #[test]
    fn test_counting_tracer_skips_null() {
        let mut tracer = CountingTracer::new();
        tracer.trace_ptr(std::ptr::null());
        tracer.trace_ptr(0x1000 as *const ());
        assert_eq!(tracer.ptr_count, 1);
        assert_eq!(tracer.null_count, 1);
    }

    #[test]
    fn test_mark_set_dedups() {
        let pair = Pair(Box::new(1), Box::new(2));
        let mut marks = MarkSet::new();
        pair.trace(&mut marks);
        pair.trace(&mut marks);
        assert_eq!(marks.len(), 2);
        assert!(marks.is_marked((&*pair.0 as *const u32).cast()));
    }
}
