//! Cache statistics for debugging and the status bar.

use serde::Serialize;
use std::fmt;

/// Snapshot of the cache state and lifetime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Live (non-tombstone) entries.
    pub entries: usize,
    /// Entries whose buffer was released but not yet swept.
    pub tombstones: usize,
    /// Entries with at least one pin.
    pub pinned: usize,
    /// Bytes held by live entries.
    pub bytes: usize,
    /// Byte budget.
    pub max_bytes: usize,
    /// Successful lookups.
    pub hits: u64,
    /// Failed lookups.
    pub misses: u64,
    /// Frames inserted.
    pub insertions: u64,
    /// Frames released by the eviction policy.
    pub evictions: u64,
}

impl CacheStats {
    /// Lookup hit rate as a percentage (0.0 - 100.0).
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MB: usize = djv_core::cache_presets::MEGABYTE;
        write!(
            f,
            "{} frames ({} pinned), {}/{} MB, hit rate {:.1}%, {} evictions",
            self.entries,
            self.pinned,
            self.bytes / MB,
            self.max_bytes / MB,
            self.hit_rate(),
            self.evictions
        )
    }
}
