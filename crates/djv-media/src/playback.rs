//! Playback driver.
//!
//! Asks the cache for each displayed frame, falling back to the loader on a
//! miss, and keeps the cache's playback cursor on the playhead.

use crate::loader::FrameLoader;
use crate::worker::DecodeWorker;
use djv_cache::{FrameCache, FramePin};
use djv_core::{DjvError, Result, StreamKey};
use tracing::debug;

/// Plays one sequence through a shared [`FrameCache`].
pub struct Playback<L: FrameLoader> {
    key: StreamKey,
    loader: L,
    playhead: i64,
    looping: bool,
}

impl<L: FrameLoader> Playback<L> {
    /// Drive `loader` under a fresh stream key.
    pub fn new(loader: L) -> Self {
        Self::with_key(StreamKey::next(), loader)
    }

    pub fn with_key(key: StreamKey, loader: L) -> Self {
        let (first, _) = loader.frame_range();
        Self {
            key,
            loader,
            playhead: first,
            looping: true,
        }
    }

    /// Stop at the last frame instead of wrapping to the first.
    #[must_use]
    pub fn once(mut self) -> Self {
        self.looping = false;
        self
    }

    pub fn key(&self) -> StreamKey {
        self.key
    }

    pub fn playhead(&self) -> i64 {
        self.playhead
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// The frame after the playhead, or `None` at the end of a non-looping run.
    pub fn next_frame(&self) -> Option<i64> {
        let (first, last) = self.loader.frame_range();
        match self.playhead.checked_add(1) {
            Some(next) if next <= last => Some(next),
            _ if self.looping => Some(first),
            _ => None,
        }
    }

    /// Display `frame`: move the playhead and return it pinned.
    ///
    /// Served from the cache when present, otherwise loaded and inserted.
    /// Load failures propagate.
    pub fn show(&mut self, cache: &mut FrameCache, frame: i64) -> Result<FramePin> {
        if !self.loader.contains(frame) {
            let (first, last) = self.loader.frame_range();
            return Err(DjvError::InvalidParameter(format!(
                "Frame {frame} out of range ({first}-{last})"
            )));
        }

        self.playhead = frame;
        cache.set_cursor(self.key, frame);
        if let Some(pin) = cache.acquire(self.key, frame) {
            return Ok(pin);
        }

        debug!(key = %self.key, frame, "Cache miss, loading frame");
        let buffer = self.loader.load(frame)?;
        cache
            .create_pinned(buffer, self.key, frame)
            .ok_or_else(|| DjvError::Decoder(format!("Loader returned an empty buffer for frame {frame}")))
    }

    /// Advance one frame and display it. `Ok(None)` at the end of a
    /// non-looping run.
    pub fn step(&mut self, cache: &mut FrameCache) -> Result<Option<FramePin>> {
        match self.next_frame() {
            Some(frame) => self.show(cache, frame).map(Some),
            None => Ok(None),
        }
    }

    /// Up to `count` frames after the playhead, in playback order.
    pub fn ahead(&self, count: usize) -> Vec<i64> {
        let (first, last) = self.loader.frame_range();
        let mut frames = Vec::with_capacity(count);
        let mut frame = self.playhead;
        while frames.len() < count {
            frame = match frame.checked_add(1) {
                Some(next) if next <= last => next,
                _ if self.looping => first,
                _ => break,
            };
            if frame == self.playhead {
                break;
            }
            frames.push(frame);
        }
        frames
    }

    /// Load up to `count` uncached frames ahead of the playhead on this
    /// thread. Returns the number of frames inserted.
    pub fn prefetch(&mut self, cache: &mut FrameCache, count: usize) -> Result<usize> {
        let mut loaded = 0;
        for frame in self.ahead(count) {
            if cache.contains(self.key, frame) {
                continue;
            }
            let buffer = self.loader.load(frame)?;
            if cache.create(buffer, self.key, frame).is_some() {
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    /// Queue uncached frames ahead of the playhead on a decode worker.
    /// Returns the number of new requests.
    pub fn request_ahead(&self, cache: &FrameCache, worker: &mut DecodeWorker, count: usize) -> usize {
        self.ahead(count)
            .into_iter()
            .filter(|&frame| !cache.contains(self.key, frame))
            .filter(|&frame| worker.request(frame))
            .count()
    }

    /// Invalidate every unpinned frame of this stream.
    pub fn close(&mut self, cache: &mut FrameCache) -> usize {
        cache.del_key(self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::SequenceLoader;
    use djv_cache::{CacheConfig, CachePolicy};

    fn playback() -> Playback<SequenceLoader> {
        let loader = SequenceLoader::open("shot.1-10.dpx").unwrap().with_size(64, 64);
        Playback::new(loader)
    }

    #[test]
    fn test_show_loads_once_then_hits() {
        let mut cache = FrameCache::default();
        let mut playback = playback();

        let pin = playback.show(&mut cache, 3).unwrap();
        assert_eq!(pin.frame(), 3);
        assert_eq!(pin.ref_count(), 1);
        drop(pin);

        playback.show(&mut cache, 3).unwrap();
        assert_eq!(playback.loader().loads(), 1);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.cursor().map(|c| c.frame), Some(3));
    }

    #[test]
    fn test_show_out_of_range_fails() {
        let mut cache = FrameCache::default();
        let mut playback = playback();
        assert!(matches!(
            playback.show(&mut cache, 11),
            Err(DjvError::InvalidParameter(_))
        ));
        assert_eq!(playback.playhead(), 1);
    }

    #[test]
    fn test_step_wraps_when_looping() {
        let mut cache = FrameCache::default();
        let mut playback = playback();
        playback.show(&mut cache, 10).unwrap();
        let pin = playback.step(&mut cache).unwrap().unwrap();
        assert_eq!(pin.frame(), 1);
    }

    #[test]
    fn test_step_stops_when_not_looping() {
        let mut cache = FrameCache::default();
        let mut playback = playback().once();
        playback.show(&mut cache, 10).unwrap();
        assert!(playback.step(&mut cache).unwrap().is_none());
    }

    #[test]
    fn test_ahead_wraps_and_stops_at_playhead() {
        let playback = playback();
        assert_eq!(playback.ahead(3), vec![2, 3, 4]);
        assert_eq!(playback.ahead(20).len(), 9);
        assert!(playback.once().ahead(0).is_empty());
    }

    #[test]
    fn test_prefetch_skips_cached_frames() {
        let mut cache = FrameCache::new(CacheConfig::new(64, CachePolicy::LruPlayback));
        let mut playback = playback();
        playback.show(&mut cache, 1).unwrap();
        assert_eq!(playback.prefetch(&mut cache, 4).unwrap(), 4);
        assert_eq!(playback.prefetch(&mut cache, 4).unwrap(), 0);
        assert_eq!(cache.frames(playback.key()), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_close_keeps_displayed_frame() {
        let mut cache = FrameCache::default();
        let mut playback = playback();
        let pin = playback.show(&mut cache, 1).unwrap();
        playback.prefetch(&mut cache, 2).unwrap();
        assert_eq!(playback.close(&mut cache), 2);
        assert_eq!(cache.frames(playback.key()), vec![1]);
        drop(pin);
    }
}
