//! Eviction policies.
//!
//! A policy only decides the order in which unpinned frames are given up;
//! the cache stops as soon as it is back under budget.

use crate::cache_ref::CacheRef;
use djv_core::StreamKey;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Frames behind the cursor count this many times their distance, so the
/// run ahead of the playhead outlives the frames already shown.
pub const BACKWARD_WEIGHT: u64 = 2;

/// Eviction policy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CachePolicy {
    /// Evict the least recently inserted or accessed frame first.
    #[default]
    Lru,
    /// Evict the frame numerically furthest from the playback cursor first.
    LruPlayback,
}

impl CachePolicy {
    pub const ALL: [CachePolicy; 2] = [CachePolicy::Lru, CachePolicy::LruPlayback];

    pub fn name(self) -> &'static str {
        match self {
            Self::Lru => "lru",
            Self::LruPlayback => "lru-playback",
        }
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown cache policy '{0}' (expected 'lru' or 'lru-playback')")]
pub struct ParsePolicyError(pub String);

impl FromStr for CachePolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(Self::Lru),
            "lru-playback" | "lru_playback" | "playback" => Ok(Self::LruPlayback),
            other => Err(ParsePolicyError(other.to_string())),
        }
    }
}

/// Current playback position, as last reported to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor {
    pub key: StreamKey,
    pub frame: i64,
}

/// Distance of a frame from the cursor under the playback policy.
pub fn playback_distance(cursor: Cursor, key: StreamKey, frame: i64) -> u64 {
    if key != cursor.key {
        return u64::MAX;
    }
    let delta = i128::from(frame) - i128::from(cursor.frame);
    if delta >= 0 {
        delta as u64
    } else {
        ((-delta) as u64).saturating_mul(BACKWARD_WEIGHT)
    }
}

/// Indices of evictable entries, in the order they should be evicted.
///
/// `entries` is in recency order (oldest first). Pinned entries and
/// tombstones are never candidates.
pub(crate) fn eviction_order(
    policy: CachePolicy,
    entries: &[CacheRef],
    cursor: Option<Cursor>,
) -> Vec<usize> {
    let candidates = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| !e.is_tombstone() && !e.is_pinned());

    match (policy, cursor) {
        (CachePolicy::LruPlayback, Some(cursor)) => {
            let mut scored: Vec<(u64, u64, usize)> = candidates
                .map(|(i, e)| (playback_distance(cursor, e.key(), e.frame()), e.stamp, i))
                .collect();
            scored.sort_by_key(|&(distance, stamp, _)| (Reverse(distance), stamp));
            scored.into_iter().map(|(_, _, i)| i).collect()
        }
        _ => candidates.map(|(i, _)| i).collect(),
    }
}
