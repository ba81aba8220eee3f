//! Cache configuration supplied by the preferences layer.

use crate::policy::CachePolicy;
use djv_core::cache_presets::{CACHE_SIZES_MB, DEFAULT_CACHE_MB};
use serde::{Deserialize, Serialize};

/// Budget and policy for a [`crate::FrameCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Byte budget in megabytes.
    pub max_mb: usize,
    /// Eviction policy.
    pub policy: CachePolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_mb: DEFAULT_CACHE_MB,
            policy: CachePolicy::default(),
        }
    }
}

impl CacheConfig {
    pub fn new(max_mb: usize, policy: CachePolicy) -> Self {
        Self { max_mb, policy }
    }

    /// Configuration using the size preset at `index` (clamped to the list).
    pub fn preset(index: usize) -> Self {
        let index = index.min(CACHE_SIZES_MB.len() - 1);
        Self {
            max_mb: CACHE_SIZES_MB[index],
            ..Self::default()
        }
    }

    /// Index of the preset matching `max_mb`, if any.
    pub fn preset_index(&self) -> Option<usize> {
        CACHE_SIZES_MB.iter().position(|&mb| mb == self.max_mb)
    }

    #[must_use]
    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_uses_default_preset() {
        let config = CacheConfig::default();
        assert_eq!(config.max_mb, 512);
        assert_eq!(config.policy, CachePolicy::Lru);
        assert_eq!(config.preset_index(), Some(3));
    }

    #[test]
    fn test_preset_is_clamped() {
        assert_eq!(CacheConfig::preset(0).max_mb, 64);
        assert_eq!(CacheConfig::preset(99).max_mb, 4096);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: CacheConfig = serde_json::from_str(r#"{"policy":"lru-playback"}"#).unwrap();
        assert_eq!(config.max_mb, 512);
        assert_eq!(config.policy, CachePolicy::LruPlayback);
    }
}
