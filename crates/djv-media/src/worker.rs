//! Background frame decoding.
//!
//! Loading runs on a worker thread; decoded buffers travel back over a
//! channel and are inserted into the cache by the thread that owns it.

use crate::loader::FrameLoader;
use crossbeam_channel::{unbounded, Receiver, Sender};
use djv_cache::FrameCache;
use djv_core::{FrameBuffer, Result, StreamKey};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

struct Request {
    frame: i64,
    epoch: u64,
}

/// A frame decoded by the worker.
pub struct Decoded {
    pub frame: i64,
    pub epoch: u64,
    pub result: Result<FrameBuffer>,
}

/// Decodes frames of one stream off the owning thread.
///
/// Requests carry the epoch current when they were made; bumping the epoch
/// with [`DecodeWorker::cancel_pending`] makes the worker skip everything
/// still queued, which keeps fast scrubbing from decoding stale frames.
pub struct DecodeWorker {
    key: StreamKey,
    requests: Option<Sender<Request>>,
    results: Receiver<Decoded>,
    epoch: Arc<AtomicU64>,
    pending: HashSet<i64>,
    handle: Option<JoinHandle<()>>,
}

impl DecodeWorker {
    /// Start a worker thread that owns `loader`.
    pub fn spawn<L>(key: StreamKey, mut loader: L) -> Result<Self>
    where
        L: FrameLoader + Send + 'static,
    {
        let (request_tx, request_rx) = unbounded::<Request>();
        let (result_tx, result_rx) = unbounded::<Decoded>();
        let epoch = Arc::new(AtomicU64::new(0));
        let current = Arc::clone(&epoch);

        let handle = std::thread::Builder::new()
            .name(format!("djv-decode-{}", key.raw()))
            .spawn(move || {
                for request in request_rx {
                    if request.epoch < current.load(Ordering::Acquire) {
                        continue;
                    }
                    let result = loader.load(request.frame);
                    let decoded = Decoded {
                        frame: request.frame,
                        epoch: request.epoch,
                        result,
                    };
                    if result_tx.send(decoded).is_err() {
                        break;
                    }
                }
            })?;

        debug!(%key, "Decode worker started");
        Ok(Self {
            key,
            requests: Some(request_tx),
            results: result_rx,
            epoch,
            pending: HashSet::new(),
            handle: Some(handle),
        })
    }

    pub fn key(&self) -> StreamKey {
        self.key
    }

    /// Queue `frame` for decoding. Returns `false` if it is already queued.
    pub fn request(&mut self, frame: i64) -> bool {
        if !self.pending.insert(frame) {
            return false;
        }
        let epoch = self.epoch.load(Ordering::Acquire);
        match &self.requests {
            Some(tx) if tx.send(Request { frame, epoch }).is_ok() => true,
            _ => {
                self.pending.remove(&frame);
                false
            }
        }
    }

    /// Drop every queued request.
    pub fn cancel_pending(&mut self) {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(key = %self.key, epoch, dropped = self.pending.len(), "Cancelled pending decodes");
        self.pending.clear();
    }

    /// Number of requests not yet drained.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, frame: i64) -> bool {
        self.pending.contains(&frame)
    }

    /// Insert every finished frame into `cache` without blocking.
    /// Returns the number of frames inserted.
    pub fn drain_into(&mut self, cache: &mut FrameCache) -> usize {
        let mut inserted = 0;
        while let Ok(decoded) = self.results.try_recv() {
            inserted += self.insert(cache, decoded);
        }
        inserted
    }

    /// Block up to `timeout` until every pending frame has arrived, inserting
    /// them as they come. Returns the number of frames inserted.
    pub fn wait_into(&mut self, cache: &mut FrameCache, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut inserted = 0;
        while !self.pending.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.results.recv_timeout(remaining) {
                Ok(decoded) => inserted += self.insert(cache, decoded),
                Err(_) => break,
            }
        }
        inserted + self.drain_into(cache)
    }

    fn insert(&mut self, cache: &mut FrameCache, decoded: Decoded) -> usize {
        if !self.accept(cache, decoded.frame, decoded.epoch, &decoded.result) {
            return 0;
        }
        match decoded.result {
            Ok(buffer) => usize::from(cache.create(buffer, self.key, decoded.frame).is_some()),
            Err(_) => 0,
        }
    }

    /// Retire a result from the pending set and decide whether to cache it.
    fn accept(&mut self, cache: &FrameCache, frame: i64, epoch: u64, result: &Result<FrameBuffer>) -> bool {
        if epoch < self.epoch.load(Ordering::Acquire) {
            return false;
        }
        self.pending.remove(&frame);
        if let Err(e) = result {
            warn!(key = %self.key, frame, error = %e, "Background decode failed");
            return false;
        }
        !cache.contains(self.key, frame)
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!(key = %self.key, "Decode worker panicked");
            }
        }
    }
}
