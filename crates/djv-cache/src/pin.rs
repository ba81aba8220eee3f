//! Scoped pins on cached frames.

use crate::cache_ref::{release_pin, CacheRef};
use djv_core::{FrameBuffer, SharedFrameBuffer, StreamKey};
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Borrowed access to a cached frame that keeps it from being evicted.
///
/// The pin count is raised when the guard is created and lowered when it is
/// dropped, on every exit path. The guard does not borrow the cache, so the
/// cache can keep inserting and purging while frames are on screen.
pub struct FramePin {
    buffer: SharedFrameBuffer,
    refs: Arc<AtomicUsize>,
    key: StreamKey,
    frame: i64,
}

impl FramePin {
    /// Pin a live entry. Tombstones cannot be pinned.
    pub(crate) fn new(entry: &CacheRef) -> Option<Self> {
        let buffer = Arc::clone(entry.shared()?);
        let refs = Arc::clone(entry.pin_count());
        refs.fetch_add(1, Ordering::AcqRel);
        Some(Self {
            buffer,
            refs,
            key: entry.key(),
            frame: entry.frame(),
        })
    }

    /// Stream key at the time the pin was taken.
    #[inline]
    pub fn key(&self) -> StreamKey {
        self.key
    }

    #[inline]
    pub fn frame(&self) -> i64 {
        self.frame
    }

    /// The pinned buffer.
    #[inline]
    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    /// Current pin count of the underlying entry, this guard included.
    pub fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }
}

impl Deref for FramePin {
    type Target = FrameBuffer;

    fn deref(&self) -> &FrameBuffer {
        &self.buffer
    }
}

impl Clone for FramePin {
    fn clone(&self) -> Self {
        self.refs.fetch_add(1, Ordering::AcqRel);
        Self {
            buffer: Arc::clone(&self.buffer),
            refs: Arc::clone(&self.refs),
            key: self.key,
            frame: self.frame,
        }
    }
}

impl Drop for FramePin {
    fn drop(&mut self) {
        release_pin(&self.refs);
    }
}

impl fmt::Debug for FramePin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramePin")
            .field("key", &self.key)
            .field("frame", &self.frame)
            .field("refs", &self.ref_count())
            .finish()
    }
}
