//! The byte-budgeted frame store.

use crate::cache_ref::CacheRef;
use crate::config::CacheConfig;
use crate::notify::ChangeNotifier;
use crate::pin::FramePin;
use crate::policy::{self, CachePolicy, Cursor};
use crate::stats::CacheStats;
use crossbeam_channel::Receiver;
use djv_core::cache_presets::megabytes_to_bytes;
use djv_core::{FrameBuffer, StreamKey};
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    hits: u64,
    misses: u64,
    insertions: u64,
    evictions: u64,
}

/// Bounded working set of decoded frames.
///
/// Entries are kept in recency order: the front is the least recently
/// inserted or accessed frame, the back the most recent. Every mutation that
/// can grow the working set runs an eviction pass, and each structural change
/// emits exactly one notification once it is complete.
///
/// The cache is single-writer: all mutation happens through `&mut self` on
/// the thread that owns it. Decode work may happen elsewhere, but the
/// resulting buffers are inserted here. Only [`FramePin`] guards may cross
/// threads.
#[derive(Debug)]
pub struct FrameCache {
    entries: Vec<CacheRef>,
    max_mb: usize,
    max_bytes: usize,
    total: usize,
    policy: CachePolicy,
    cursor: Option<Cursor>,
    next_stamp: u64,
    notifier: ChangeNotifier,
    counters: Counters,
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl FrameCache {
    pub fn new(config: CacheConfig) -> Self {
        info!(max_mb = config.max_mb, policy = %config.policy, "Frame cache created");
        Self {
            entries: Vec::new(),
            max_mb: config.max_mb,
            max_bytes: megabytes_to_bytes(config.max_mb),
            total: 0,
            policy: config.policy,
            cursor: None,
            next_stamp: 0,
            notifier: ChangeNotifier::new(),
            counters: Counters::default(),
        }
    }

    /// Apply preferences: budget then policy.
    pub fn apply(&mut self, config: CacheConfig) {
        self.set_policy(config.policy);
        self.set_max(config.max_mb);
    }

    // ── Insertion ──────────────────────────────────────────────

    /// Insert a decoded frame as the most recent entry.
    ///
    /// Returns the new entry, or `None` if the buffer is empty or the
    /// eviction pass had to give the frame up straight away. A pinned entry
    /// already cached under `(key, frame)` is kept and returned instead.
    pub fn create(&mut self, buffer: FrameBuffer, key: StreamKey, frame: i64) -> Option<&CacheRef> {
        let (index, inserted) = self.insert(buffer, key, frame)?;
        if !inserted {
            return self.entries.get(index);
        }
        let stamp = self.entries[index].stamp;
        self.purge_pass();
        self.notifier.notify();
        self.entries.iter().find(|e| e.stamp == stamp && !e.is_tombstone())
    }

    /// Insert a decoded frame and pin it before the eviction pass runs.
    ///
    /// The returned frame therefore always survives, even if it alone
    /// exceeds the budget.
    pub fn create_pinned(&mut self, buffer: FrameBuffer, key: StreamKey, frame: i64) -> Option<FramePin> {
        let (index, inserted) = self.insert(buffer, key, frame)?;
        let pin = FramePin::new(&self.entries[index]);
        if !inserted {
            return pin;
        }
        self.purge_pass();
        self.notifier.notify();
        pin
    }

    /// Index of the entry now cached under `(key, frame)`, and whether the
    /// buffer was actually stored. A pinned duplicate keeps its buffer.
    fn insert(&mut self, buffer: FrameBuffer, key: StreamKey, frame: i64) -> Option<(usize, bool)> {
        debug_assert!(!buffer.is_empty(), "empty buffer cached for frame {frame} of {key}");
        if buffer.is_empty() {
            warn!(%key, frame, "Rejected empty frame buffer");
            return None;
        }

        if let Some(index) = self.find(key, frame) {
            if self.entries[index].is_pinned() {
                debug!(%key, frame, "Frame already cached and pinned, keeping it");
                self.touch(index);
                return Some((self.entries.len() - 1, false));
            }
            let old = self.entries.remove(index);
            self.total -= old.size();
        }

        let mut entry = CacheRef::new(buffer, key, frame);
        entry.stamp = self.next_stamp;
        self.next_stamp += 1;
        self.total += entry.size();
        self.entries.push(entry);
        self.counters.insertions += 1;
        Some((self.entries.len() - 1, true))
    }

    // ── Lookup ─────────────────────────────────────────────────

    /// Look up a frame, refreshing its recency and moving the playback
    /// cursor to it on a hit. Does not pin.
    pub fn get(&mut self, key: StreamKey, frame: i64) -> Option<&CacheRef> {
        match self.find(key, frame) {
            Some(index) => {
                self.counters.hits += 1;
                self.cursor = Some(Cursor { key, frame });
                self.touch(index);
                self.entries.last()
            }
            None => {
                self.counters.misses += 1;
                None
            }
        }
    }

    /// Look up and pin a frame.
    pub fn acquire(&mut self, key: StreamKey, frame: i64) -> Option<FramePin> {
        self.get(key, frame).and_then(FramePin::new)
    }

    /// Whether a live entry exists, without touching recency or counters.
    pub fn contains(&self, key: StreamKey, frame: i64) -> bool {
        self.find(key, frame).is_some()
    }

    fn find(&self, key: StreamKey, frame: i64) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| !e.is_tombstone() && e.key() == key && e.frame() == frame)
    }

    fn touch(&mut self, index: usize) {
        let entry = self.entries.remove(index);
        self.entries.push(entry);
    }

    /// Frame numbers cached for `key`, ascending.
    pub fn frames(&self, key: StreamKey) -> Vec<i64> {
        let mut frames: Vec<i64> = self
            .live()
            .filter(|e| e.key() == key)
            .map(CacheRef::frame)
            .collect();
        frames.sort_unstable();
        frames
    }

    /// Cached frames for `key` collapsed into inclusive contiguous runs.
    pub fn ranges(&self, key: StreamKey) -> Vec<(i64, i64)> {
        let mut ranges: Vec<(i64, i64)> = Vec::new();
        for frame in self.frames(key) {
            match ranges.last_mut() {
                Some((_, end)) if end.checked_add(1) == Some(frame) => *end = frame,
                _ => ranges.push((frame, frame)),
            }
        }
        ranges
    }

    // ── Removal ────────────────────────────────────────────────

    /// Release the buffers of every unpinned frame of `key`.
    ///
    /// The shells stay in place as tombstones until the next sweep; pinned
    /// frames are left untouched. Returns the number of frames released.
    pub fn del_key(&mut self, key: StreamKey) -> usize {
        let mut released = 0;
        for entry in self.entries.iter_mut() {
            if entry.key() == key && !entry.is_tombstone() && !entry.is_pinned() {
                self.total -= entry.release();
                released += 1;
            }
        }
        if released > 0 {
            debug!(%key, released, "Released frames");
            self.notifier.notify();
        }
        released
    }

    /// Physically remove every tombstone. Returns the number removed.
    pub fn del_tombstones(&mut self) -> usize {
        let swept = self.sweep();
        if swept > 0 {
            self.notifier.notify();
        }
        swept
    }

    /// Release every unpinned frame and sweep.
    pub fn clear(&mut self) {
        let mut changed = false;
        for entry in self.entries.iter_mut() {
            if !entry.is_tombstone() && !entry.is_pinned() {
                self.total -= entry.release();
                changed = true;
            }
        }
        changed |= self.sweep() > 0;
        if changed {
            self.notifier.notify();
        }
    }

    /// Re-tag every entry of `old`, tombstones included. Returns the number
    /// of entries re-tagged.
    ///
    /// When `new` already caches the same frame only one copy stays live: the
    /// unpinned one is released, the incoming copy if both are unpinned. If
    /// both are pinned the frame stays under `old`.
    pub fn rekey(&mut self, old: StreamKey, new: StreamKey) -> usize {
        if old == new {
            return 0;
        }
        let mut changed = 0;
        for index in 0..self.entries.len() {
            if self.entries[index].key() != old {
                continue;
            }
            let frame = self.entries[index].frame();
            let collision = if self.entries[index].is_tombstone() {
                None
            } else {
                self.find(new, frame)
            };
            if let Some(existing) = collision {
                if !self.entries[existing].is_pinned() {
                    self.total -= self.entries[existing].release();
                } else if !self.entries[index].is_pinned() {
                    self.total -= self.entries[index].release();
                } else {
                    debug!(%old, %new, frame, "Both copies pinned, frame keeps its key");
                    continue;
                }
            }
            self.entries[index].set_key(new);
            changed += 1;
        }
        if let Some(cursor) = self.cursor.as_mut().filter(|c| c.key == old) {
            cursor.key = new;
        }
        if changed > 0 {
            self.notifier.notify();
        }
        changed
    }

    fn sweep(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !e.is_tombstone());
        before - self.entries.len()
    }

    // ── Eviction ───────────────────────────────────────────────

    /// Run an eviction pass and sweep tombstones.
    ///
    /// Call after pins are released to bring an over-budget cache back in
    /// line. Returns the number of frames evicted.
    pub fn purge(&mut self) -> usize {
        let (evicted, swept) = self.purge_pass();
        if evicted + swept > 0 {
            self.notifier.notify();
        }
        evicted
    }

    /// Evict by policy until under budget, then sweep. Never notifies.
    fn purge_pass(&mut self) -> (usize, usize) {
        let mut evicted = 0;
        if self.total > self.max_bytes {
            let order = policy::eviction_order(self.policy, &self.entries, self.cursor);
            for index in order {
                if self.total <= self.max_bytes {
                    break;
                }
                let entry = &mut self.entries[index];
                debug!(key = %entry.key(), frame = entry.frame(), size = entry.size(), "Evicting frame");
                self.total -= entry.release();
                evicted += 1;
            }
            self.counters.evictions += evicted as u64;
            if self.total > self.max_bytes {
                debug!(
                    total = self.total,
                    max = self.max_bytes,
                    "Cache over budget, remaining frames are pinned"
                );
            }
        }
        (evicted, self.sweep())
    }

    // ── Configuration ──────────────────────────────────────────

    /// Set the budget in megabytes. Shrinking evicts immediately.
    pub fn set_max(&mut self, megabytes: usize) {
        if megabytes == self.max_mb {
            return;
        }
        self.max_mb = megabytes;
        self.max_bytes = megabytes_to_bytes(megabytes);
        let (evicted, _) = self.purge_pass();
        info!(max_mb = megabytes, evicted, "Frame cache budget changed");
        self.notifier.notify();
    }

    /// Budget in megabytes.
    pub fn max(&self) -> usize {
        self.max_mb
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Select the eviction policy. Takes effect on the next pass.
    pub fn set_policy(&mut self, policy: CachePolicy) {
        if policy != self.policy {
            info!(%policy, "Frame cache policy changed");
            self.policy = policy;
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Report the playback position used by [`CachePolicy::LruPlayback`].
    pub fn set_cursor(&mut self, key: StreamKey, frame: i64) {
        self.cursor = Some(Cursor { key, frame });
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.cursor
    }

    // ── Introspection ──────────────────────────────────────────

    /// Bytes held by all live entries.
    pub fn size(&self) -> usize {
        self.total
    }

    /// Bytes held by the live entries of `key`.
    pub fn size_of(&self, key: StreamKey) -> usize {
        self.live().filter(|e| e.key() == key).map(CacheRef::size).sum()
    }

    pub fn is_over_budget(&self) -> bool {
        self.total > self.max_bytes
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.live().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tombstones awaiting a sweep.
    pub fn tombstones(&self) -> usize {
        self.entries.iter().filter(|e| e.is_tombstone()).count()
    }

    /// All entries in recency order, tombstones included.
    pub fn entries(&self) -> impl Iterator<Item = &CacheRef> {
        self.entries.iter()
    }

    fn live(&self) -> impl Iterator<Item = &CacheRef> {
        self.entries.iter().filter(|e| !e.is_tombstone())
    }

    /// Register a change observer.
    pub fn subscribe(&mut self) -> Receiver<bool> {
        self.notifier.subscribe()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            tombstones: self.tombstones(),
            pinned: self.live().filter(|e| e.is_pinned()).count(),
            bytes: self.total,
            max_bytes: self.max_bytes,
            hits: self.counters.hits,
            misses: self.counters.misses,
            insertions: self.counters.insertions,
            evictions: self.counters.evictions,
        }
    }
}
