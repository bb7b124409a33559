//! GC configuration parameters.
//!
//! Resolved once at startup, either from defaults or from `GARNET_GC_*`
//! environment variables.

/// Configuration for the collector service.
///
/// # Example
///
/// ```ignore
/// use garnet_gc::GcConfig;
///
/// // Compact on every second collection
/// let config = GcConfig {
///     compact_every: 2,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcConfig {
    /// Whether collections may relocate objects at all.
    ///
    /// Default: true
    pub compaction_enabled: bool,

    /// Compact on every Nth collection (0 disables periodic compaction).
    ///
    /// Explicit `Gc::compact` calls are honoured regardless.
    ///
    /// Default: 4
    pub compact_every: u32,

    /// Expected number of permanent roots, used to presize the root set.
    ///
    /// Default: 64
    pub initial_root_capacity: usize,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            compaction_enabled: true,
            compact_every: 4,
            initial_root_capacity: 64,
        }
    }
}

impl GcConfig {
    /// Configuration that never moves objects.
    pub fn non_moving() -> Self {
        Self {
            compaction_enabled: false,
            compact_every: 0,
            ..Default::default()
        }
    }

    /// Read overrides from the environment.
    ///
    /// - `GARNET_GC_COMPACT=0|1`
    /// - `GARNET_GC_COMPACT_EVERY=<n>`
    ///
    /// Malformed values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(enabled) = env_parse::<u8>("GARNET_GC_COMPACT") {
            config.compaction_enabled = enabled != 0;
        }
        if let Some(every) = env_parse::<u32>("GARNET_GC_COMPACT_EVERY") {
            config.compact_every = every;
        }
        config
    }

    /// Whether the `n`th collection (1-based) should compact.
    #[inline]
    pub fn should_compact(&self, n: u64) -> bool {
        self.compaction_enabled && self.compact_every != 0 && n % u64::from(self.compact_every) == 0
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring malformed GC setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_compaction_schedule() {
        let config = GcConfig::default();
        assert!(!config.should_compact(1));
        assert!(!config.should_compact(3));
        assert!(config.should_compact(4));
        assert!(config.should_compact(8));
    }

    #[test]
    fn test_non_moving_never_compacts() {
        let config = GcConfig::non_moving();
        for n in 1..=16 {
            assert!(!config.should_compact(n));
        }
    }
}
