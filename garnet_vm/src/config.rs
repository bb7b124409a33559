//! VM configuration.
//!
//! Resolved once when a [`Vm`](crate::Vm) is built, either from defaults or
//! from `GARNET_*` environment variables.

use garnet_gc::GcConfig;

/// Configuration for the dispatch core.
///
/// # Example
///
/// ```ignore
/// use garnet_vm::VmConfig;
///
/// let config = VmConfig::default()
///     .with_max_call_depth(256)
///     .with_compaction_guard(false);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    /// Deepest frame stack before `SystemStackError`.
    ///
    /// Default: 1024
    pub max_call_depth: usize,

    /// Compare the GC compaction epoch on every cache probe (debug builds
    /// only; release builds never store the epoch).
    ///
    /// Default: true
    pub compaction_guard: bool,

    /// Expected number of ad hoc call sites, used to presize the binder.
    ///
    /// Default: 32
    pub adhoc_capacity: usize,

    /// Collector configuration for the VM's own GC service.
    pub gc: GcConfig,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 1024,
            compaction_guard: true,
            adhoc_capacity: 32,
            gc: GcConfig::default(),
        }
    }
}

impl VmConfig {
    /// Set the maximum call depth.
    #[must_use]
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth.max(1);
        self
    }

    /// Enable or disable the debug compaction guard.
    #[must_use]
    pub fn with_compaction_guard(mut self, enabled: bool) -> Self {
        self.compaction_guard = enabled;
        self
    }

    /// Set the expected number of ad hoc call sites.
    #[must_use]
    pub fn with_adhoc_capacity(mut self, capacity: usize) -> Self {
        self.adhoc_capacity = capacity;
        self
    }

    /// Set the collector configuration.
    #[must_use]
    pub fn with_gc(mut self, gc: GcConfig) -> Self {
        self.gc = gc;
        self
    }

    /// Read overrides from the environment.
    ///
    /// - `GARNET_MAX_CALL_DEPTH=<n>`
    /// - `GARNET_COMPACTION_GUARD=0|1`
    /// - `GARNET_ADHOC_CAPACITY=<n>`
    /// - plus everything [`GcConfig::from_env`] reads
    pub fn from_env() -> Self {
        let mut config = Self {
            gc: GcConfig::from_env(),
            ..Self::default()
        };
        if let Some(depth) = env_parse::<usize>("GARNET_MAX_CALL_DEPTH") {
            config = config.with_max_call_depth(depth);
        }
        if let Some(guard) = env_parse::<u8>("GARNET_COMPACTION_GUARD") {
            config.compaction_guard = guard != 0;
        }
        if let Some(capacity) = env_parse::<usize>("GARNET_ADHOC_CAPACITY") {
            config.adhoc_capacity = capacity;
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring malformed VM setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VmConfig::default();
        assert_eq!(config.max_call_depth, 1024);
        assert!(config.compaction_guard);
    }

    #[test]
    fn test_builders() {
        let config = VmConfig::default()
            .with_max_call_depth(0)
            .with_compaction_guard(false)
            .with_adhoc_capacity(4)
            .with_gc(GcConfig::non_moving());
        assert_eq!(config.max_call_depth, 1);
        assert!(!config.compaction_guard);
        assert_eq!(config.adhoc_capacity, 4);
        assert!(!config.gc.compaction_enabled);
    }
}
