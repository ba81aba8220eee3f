//! DJV - Playback driver for image sequences
//!
//! Plays a sequence through the frame cache and reports cache statistics.

use anyhow::{bail, Context, Result};
use crossbeam_channel::Receiver;
use djv_cache::{CacheConfig, CachePolicy, FrameCache};
use djv_core::cache_presets::{DEFAULT_CACHE_MB, LOOKAHEAD_FRAMES};
use djv_core::StreamKey;
use djv_media::{DecodeWorker, Playback, SequenceLoader};
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: djv [SEQUENCE] [--frames N] [--cache-mb N] [--policy lru|lru-playback] [--stats-json]";

struct Options {
    sequence: String,
    frames: usize,
    config: CacheConfig,
    stats_json: bool,
}

impl Options {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut options = Self {
            sequence: "shot.1-48.dpx".to_string(),
            frames: 96,
            config: CacheConfig::new(DEFAULT_CACHE_MB, CachePolicy::LruPlayback),
            stats_json: false,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--frames" => options.frames = value(&mut args, "--frames")?.parse()?,
                "--cache-mb" => options.config.max_mb = value(&mut args, "--cache-mb")?.parse()?,
                "--policy" => options.config.policy = value(&mut args, "--policy")?.parse()?,
                "--stats-json" => options.stats_json = true,
                "-h" | "--help" => bail!(USAGE),
                flag if flag.starts_with("--") => bail!("unknown option {flag}\n{USAGE}"),
                _ => options.sequence = arg,
            }
        }
        Ok(options)
    }
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next().with_context(|| format!("{flag} needs a value"))
}

/// Timeline observer: re-reads the cached ranges whenever the cache changes.
struct TimelineView {
    key: StreamKey,
    ranges: Vec<(i64, i64)>,
    updates: usize,
}

impl TimelineView {
    fn refresh(&mut self, cache: &FrameCache, changes: &Receiver<bool>) {
        if changes.try_iter().count() == 0 {
            return;
        }
        self.ranges = cache.ranges(self.key);
        self.updates += 1;
        debug!(key = %self.key, ranges = ?self.ranges, "Timeline cache ranges updated");
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("DJV starting...");
    djv_media::init();

    let options = Options::parse(std::env::args().skip(1))?;
    let loader = SequenceLoader::open(&options.sequence)
        .with_context(|| format!("opening {}", options.sequence))?;

    let mut cache = FrameCache::new(options.config);
    let changes = cache.subscribe();

    let mut playback = Playback::new(loader.clone());
    let mut worker = DecodeWorker::spawn(playback.key(), loader)?;
    let mut timeline = TimelineView {
        key: playback.key(),
        ranges: Vec::new(),
        updates: 0,
    };

    let first = playback.playhead();
    let mut pin = Some(playback.show(&mut cache, first)?);
    for _ in 1..options.frames {
        playback.request_ahead(&cache, &mut worker, LOOKAHEAD_FRAMES);
        worker.drain_into(&mut cache);
        timeline.refresh(&cache, &changes);

        // Release the previous frame only once the next one is pinned.
        let next = playback.step(&mut cache)?;
        if next.is_none() {
            break;
        }
        pin = next;
    }
    worker.wait_into(&mut cache, Duration::from_secs(1));
    timeline.refresh(&cache, &changes);
    drop(pin);
    cache.purge();

    let stats = cache.stats();
    if options.stats_json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{stats}");
        println!(
            "cached ranges: {:?} ({} timeline updates)",
            timeline.ranges, timeline.updates
        );
    }

    playback.close(&mut cache);
    info!("DJV finished");
    Ok(())
}
