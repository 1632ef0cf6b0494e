//! Engine configuration.

/// How call sites use their inline caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Check the guard, take the cached path on a hit.
    #[default]
    Enabled,
    /// Treat every execution as a miss and rebind.
    AlwaysRebind,
    /// Never touch the caches; always take the general lookup.
    Disabled,
}

/// Settings of an [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of nested script calls before a `RangeError`.
    pub max_call_depth: usize,
    pub cache_mode: CacheMode,
}

impl EngineConfig {
    pub const DEFAULT_MAX_CALL_DEPTH: usize = 200;

    pub fn new() -> Self {
        Self {
            max_call_depth: Self::DEFAULT_MAX_CALL_DEPTH,
            cache_mode: CacheMode::Enabled,
        }
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = mode;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = EngineConfig::new()
            .with_max_call_depth(8)
            .with_cache_mode(CacheMode::Disabled);
        assert_eq!(config.max_call_depth, 8);
        assert_eq!(config.cache_mode, CacheMode::Disabled);
        assert_eq!(EngineConfig::default().max_call_depth, 200);
        assert_eq!(EngineConfig::default().cache_mode, CacheMode::Enabled);
    }
}
