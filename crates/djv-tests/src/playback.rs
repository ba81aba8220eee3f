//! Integration tests for playback through the frame cache.
//!
//! Exercises cross-crate interactions between djv-core, djv-cache,
//! and djv-media.

use djv_cache::{CacheConfig, CachePolicy, FrameCache};
use djv_core::cache_presets::MEGABYTE;
use djv_media::{DecodeWorker, Playback, SequenceLoader};
use std::time::Duration;

// ── Helpers ────────────────────────────────────────────────────

/// Sequence of 1 MB frames.
fn loader(frames: i64) -> SequenceLoader {
    SequenceLoader::open(format!("shot.1-{frames}.dpx"))
        .unwrap()
        .with_size(512, 512)
}

fn cache(max_mb: usize, policy: CachePolicy) -> FrameCache {
    FrameCache::new(CacheConfig::new(max_mb, policy))
}

/// Show every frame from `first` to `last`, releasing each after display.
fn play(playback: &mut Playback<SequenceLoader>, cache: &mut FrameCache, first: i64, last: i64) {
    for frame in first..=last {
        drop(playback.show(cache, frame).unwrap());
    }
}

// ── Budget ─────────────────────────────────────────────────────

#[test]
fn playback_stays_within_budget() {
    let mut cache = cache(4, CachePolicy::LruPlayback);
    let mut playback = Playback::new(loader(20));

    let mut pin = playback.show(&mut cache, 1).unwrap();
    for _ in 0..40 {
        playback.prefetch(&mut cache, 2).unwrap();
        pin = playback.step(&mut cache).unwrap().unwrap();
        assert!(cache.size() <= 4 * MEGABYTE);
        assert!(!cache.is_over_budget());
    }
    assert_eq!(pin.ref_count(), 1);
    assert!(cache.stats().evictions > 0);
}

#[test]
fn displayed_frame_survives_zero_budget() {
    let mut cache = cache(0, CachePolicy::Lru);
    let mut playback = Playback::new(loader(4));

    let pin = playback.show(&mut cache, 2).unwrap();
    assert!(cache.contains(playback.key(), 2));
    assert!(cache.is_over_budget());

    drop(pin);
    assert_eq!(cache.purge(), 1);
    assert_eq!(cache.size(), 0);
}

// ── Eviction policy ────────────────────────────────────────────

#[test]
fn lru_drops_oldest_frames_on_scrub_back() {
    let mut cache = cache(4, CachePolicy::Lru);
    let mut playback = Playback::new(loader(10));

    play(&mut playback, &mut cache, 1, 8);
    assert_eq!(cache.frames(playback.key()), vec![5, 6, 7, 8]);

    drop(playback.show(&mut cache, 2).unwrap());
    assert_eq!(cache.frames(playback.key()), vec![2, 6, 7, 8]);
}

#[test]
fn playback_policy_drops_farthest_frame_on_scrub_back() {
    let mut cache = cache(4, CachePolicy::LruPlayback);
    let mut playback = Playback::new(loader(10));

    play(&mut playback, &mut cache, 1, 8);
    assert_eq!(cache.frames(playback.key()), vec![5, 6, 7, 8]);

    drop(playback.show(&mut cache, 2).unwrap());
    assert_eq!(cache.frames(playback.key()), vec![2, 5, 6, 7]);
}

#[test]
fn other_streams_are_evicted_before_the_playing_one() {
    let mut cache = cache(4, CachePolicy::LruPlayback);
    let mut background = Playback::new(loader(10));
    let mut foreground = Playback::new(loader(10));

    play(&mut foreground, &mut cache, 1, 2);
    play(&mut background, &mut cache, 1, 2);
    play(&mut foreground, &mut cache, 3, 4);

    assert_eq!(cache.frames(foreground.key()), vec![1, 2, 3, 4]);
    assert!(cache.frames(background.key()).is_empty());
}

// ── Hits and loads ─────────────────────────────────────────────

#[test]
fn looping_twice_hits_on_second_pass() {
    let mut cache = cache(64, CachePolicy::LruPlayback);
    let mut playback = Playback::new(loader(10));

    drop(playback.show(&mut cache, 1).unwrap());
    for _ in 1..20 {
        drop(playback.step(&mut cache).unwrap());
    }

    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses), (10, 10));
    assert!((stats.hit_rate() - 50.0).abs() < f64::EPSILON);
    assert_eq!(playback.loader().loads(), 10);
}

#[test]
fn worker_prefetch_serves_playback() {
    let mut cache = cache(64, CachePolicy::LruPlayback);
    let source = loader(10);
    let mut playback = Playback::new(source.clone());
    let mut worker = DecodeWorker::spawn(playback.key(), source).unwrap();

    drop(playback.show(&mut cache, 1).unwrap());
    assert_eq!(playback.request_ahead(&cache, &mut worker, 5), 5);
    assert_eq!(worker.wait_into(&mut cache, Duration::from_secs(10)), 5);
    assert_eq!(playback.request_ahead(&cache, &mut worker, 5), 0);

    play(&mut playback, &mut cache, 2, 6);
    assert_eq!(playback.loader().loads(), 1);
    assert_eq!(cache.stats().hits, 5);
}

// ── Invalidation ───────────────────────────────────────────────

#[test]
fn close_leaves_tombstones_until_swept() {
    let mut cache = cache(64, CachePolicy::Lru);
    let mut playback = Playback::new(loader(10));
    play(&mut playback, &mut cache, 1, 5);

    assert_eq!(playback.close(&mut cache), 5);
    assert!(cache.is_empty());
    assert_eq!(cache.tombstones(), 5);
    assert_eq!(cache.size(), 0);

    assert_eq!(cache.del_tombstones(), 5);
    assert_eq!(cache.tombstones(), 0);
}

#[test]
fn reopened_stream_reloads_frames() {
    let mut cache = cache(64, CachePolicy::Lru);
    let mut playback = Playback::new(loader(10));
    play(&mut playback, &mut cache, 1, 3);
    playback.close(&mut cache);

    play(&mut playback, &mut cache, 1, 3);
    assert_eq!(playback.loader().loads(), 6);
    assert_eq!(cache.frames(playback.key()), vec![1, 2, 3]);
}

// ── Notification ───────────────────────────────────────────────

#[test]
fn timeline_sees_one_signal_per_loaded_frame() {
    let mut cache = cache(64, CachePolicy::Lru);
    let changes = cache.subscribe();
    let mut playback = Playback::new(loader(10));

    play(&mut playback, &mut cache, 1, 3);
    assert_eq!(changes.try_iter().count(), 3);
    assert_eq!(cache.ranges(playback.key()), vec![(1, 3)]);

    // Hits do not change the cached set.
    play(&mut playback, &mut cache, 1, 3);
    assert_eq!(changes.try_iter().count(), 0);

    playback.close(&mut cache);
    assert_eq!(changes.try_iter().count(), 1);
    assert!(cache.ranges(playback.key()).is_empty());
}
