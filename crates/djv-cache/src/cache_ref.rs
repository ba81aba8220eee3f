//! A single cached frame and its pin count.

use djv_core::{FrameBuffer, SharedFrameBuffer, StreamKey};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Decrement a pin count without going below zero.
///
/// Returns `false` when the count was already zero.
pub(crate) fn release_pin(refs: &AtomicUsize) -> bool {
    refs.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        .is_ok()
}

/// One decoded frame owned by the cache.
///
/// An entry whose pin count is above zero must never be evicted. Once the
/// cache releases the buffer the entry becomes a tombstone: its key and frame
/// remain until the next sweep removes the shell.
pub struct CacheRef {
    buffer: Option<SharedFrameBuffer>,
    key: StreamKey,
    frame: i64,
    size: usize,
    /// Insertion order, used as the eviction tie-break.
    pub(crate) stamp: u64,
    refs: Arc<AtomicUsize>,
}

impl CacheRef {
    /// Wrap a decoded buffer. The pin count starts at zero.
    pub fn new(buffer: FrameBuffer, key: StreamKey, frame: i64) -> Self {
        let size = buffer.memory_size();
        Self {
            buffer: Some(Arc::new(buffer)),
            key,
            frame,
            size,
            stamp: 0,
            refs: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The owned buffer, or `None` for a tombstone.
    #[inline]
    pub fn get(&self) -> Option<&FrameBuffer> {
        self.buffer.as_deref()
    }

    pub(crate) fn shared(&self) -> Option<&SharedFrameBuffer> {
        self.buffer.as_ref()
    }

    pub(crate) fn pin_count(&self) -> &Arc<AtomicUsize> {
        &self.refs
    }

    #[inline]
    pub fn key(&self) -> StreamKey {
        self.key
    }

    /// Re-tag the entry with another stream identity.
    pub fn set_key(&mut self, key: StreamKey) {
        self.key = key;
    }

    #[inline]
    pub fn frame(&self) -> i64 {
        self.frame
    }

    /// Bytes charged against the cache budget (0 for a tombstone).
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.buffer.is_none()
    }

    /// Manually pin the entry. Prefer [`crate::FramePin`], which unpins on drop.
    pub fn ref_inc(&self) {
        self.refs.fetch_add(1, Ordering::AcqRel);
    }

    /// Manually unpin the entry. The count never drops below zero.
    pub fn ref_del(&self) {
        let released = release_pin(&self.refs);
        debug_assert!(
            released,
            "ref_del on unpinned frame {} of {}",
            self.frame, self.key
        );
    }

    #[inline]
    pub fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.ref_count() > 0
    }

    /// Free the buffer, turning the entry into a tombstone.
    /// Returns the number of bytes released.
    pub(crate) fn release(&mut self) -> usize {
        self.buffer = None;
        std::mem::take(&mut self.size)
    }
}

impl fmt::Debug for CacheRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRef")
            .field("key", &self.key)
            .field("frame", &self.frame)
            .field("size", &self.size)
            .field("refs", &self.ref_count())
            .field("tombstone", &self.is_tombstone())
            .finish()
    }
}
