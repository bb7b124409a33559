//! Call data: a call site's description plus its cache.

use crate::call_cache::CallCache;
use crate::call_info::CallInfo;

/// Everything a call instruction carries.
///
/// Static call sites own their `CallData` exclusively; ad hoc sites keep
/// theirs in an [`AdHocCell`](crate::adhoc::AdHocCell).
#[derive(Debug, Clone)]
pub struct CallData {
    ci: CallInfo,
    cc: CallCache,
}

impl CallData {
    /// Call data with an empty cache.
    #[inline]
    pub const fn new(ci: CallInfo) -> Self {
        Self {
            ci,
            cc: CallCache::empty(),
        }
    }

    /// The immutable call-site description.
    #[inline]
    pub fn info(&self) -> &CallInfo {
        &self.ci
    }

    /// The inline cache.
    #[inline]
    pub fn cache(&self) -> &CallCache {
        &self.cc
    }

    /// The inline cache, mutably.
    #[inline]
    pub fn cache_mut(&mut self) -> &mut CallCache {
        &mut self.cc
    }

    /// Replace the whole contents for a different call.
    ///
    /// Only ad hoc sites rebind; a static site's info never changes.
    pub fn rebind(&mut self, ci: CallInfo) {
        *self = Self::new(ci);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garnet_core::{Ident, Serial};

    #[test]
    fn test_new_call_data_is_cold() {
        let cd = CallData::new(CallInfo::method(Ident::new("len"), 0));
        assert_eq!(cd.info().mid(), Ident::new("len"));
        assert!(!cd.cache().is_valid(Serial::new(1), Serial::new(1), 0));
    }

    #[test]
    fn test_rebind_replaces_info_and_cache() {
        let mut cd = CallData::new(CallInfo::method(Ident::new("a"), 0));
        cd.rebind(CallInfo::fcall(Ident::new("b"), 2));
        assert_eq!(cd.info().mid(), Ident::new("b"));
        assert_eq!(cd.info().argc(), 2);
        assert_eq!(cd.cache().occupied_slots(), 0);
    }
}
