//! Frame buffer (prefetcher)
//!
//! Keeps the frames of a window `[start, min(start + size, len))` resident
//! in the frame cache. Window size comes from the buffer policy: a fixed
//! count for the sliding-window mode, the whole manifest for eager mode.
//!
//! Two ways to fill a window:
//! - `fill()` issues every missing load concurrently and resolves once all
//!   of them have settled (fire all, wait for all). A failed frame never
//!   aborts the batch.
//! - `prefetch()` issues the same batch in the background. The owner
//!   drives it with `next_settled()`, which applies outcomes to the cache.
//!   Frames already in flight are not requested twice.
//!
//! The buffer is owned by the player task; cache writes only happen in
//! `apply()`, on that task, so no locking is needed.

use crate::error::{Error, Result};
use crate::frame::{Frame, FrameId, FrameList};
use crate::loader::FrameLoader;
use crate::playback::cache::FrameCache;
use futures::future::{join_all, BoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use seqview_common::events::{EventBus, ViewerEvent};
use seqview_common::BufferPolicy;
use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of one load within a batch
#[derive(Debug)]
pub struct LoadOutcome {
    pub frame_id: FrameId,
    pub result: Result<Frame>,
}

/// Summary of a settled batch
#[derive(Debug, Default)]
pub struct FillReport {
    /// Window start the batch was issued for
    pub start: usize,
    /// Identifiers requested from the loader
    pub requested: Vec<FrameId>,
    /// Identifiers now resident in the cache
    pub loaded: Vec<FrameId>,
    /// Identifiers that failed, with the reason
    pub failed: Vec<(FrameId, Error)>,
}

impl FillReport {
    pub(crate) fn noop(start: usize) -> Self {
        Self {
            start,
            ..Self::default()
        }
    }

    /// Window was already resident; no load was issued
    pub fn is_noop(&self) -> bool {
        self.requested.is_empty()
    }

    /// Loads were issued and none succeeded
    pub fn all_failed(&self) -> bool {
        !self.requested.is_empty() && self.loaded.is_empty()
    }
}

struct SettledBatch {
    start: usize,
    requested: Vec<FrameId>,
    outcomes: Vec<LoadOutcome>,
}

pub struct FrameBuffer<L: FrameLoader> {
    loader: Arc<L>,
    policy: BufferPolicy,
    cache: FrameCache,

    /// Identifiers carried by background batches that have not settled
    pending: HashSet<FrameId>,

    /// Background batches, polled by `next_settled()`
    inflight: FuturesUnordered<BoxFuture<'static, SettledBatch>>,

    /// None = wait forever for each load
    load_timeout: Option<Duration>,

    events: Arc<EventBus>,

    /// Total loads requested from the loader over the session
    loads_issued: usize,
}

impl<L: FrameLoader> FrameBuffer<L> {
    pub fn new(loader: Arc<L>, policy: BufferPolicy, events: Arc<EventBus>) -> Self {
        Self {
            loader,
            policy,
            cache: FrameCache::new(),
            pending: HashSet::new(),
            inflight: FuturesUnordered::new(),
            load_timeout: None,
            events,
            loads_issued: 0,
        }
    }

    /// Fail loads that take longer than `timeout`
    pub fn with_load_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.load_timeout = timeout;
        self
    }

    pub fn policy(&self) -> BufferPolicy {
        self.policy
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn cache(&self) -> &FrameCache {
        &self.cache
    }

    pub fn get(&self, frame_id: &str) -> Option<&Frame> {
        self.cache.get(frame_id)
    }

    pub fn is_cached(&self, frame_id: &str) -> bool {
        self.cache.contains(frame_id)
    }

    pub fn is_pending(&self, frame_id: &str) -> bool {
        self.pending.contains(frame_id)
    }

    pub fn has_inflight(&self) -> bool {
        !self.inflight.is_empty()
    }

    pub fn loads_issued(&self) -> usize {
        self.loads_issued
    }

    /// Index range covered by a window starting at `start`
    pub fn window(&self, frames: &FrameList, start: usize) -> Range<usize> {
        let len = frames.len();
        if start >= len {
            return len..len;
        }
        let end = start.saturating_add(self.policy.window_len(len)).min(len);
        start..end
    }

    /// Identifiers in the window that are neither cached nor in flight
    ///
    /// Duplicate identifiers in the manifest are requested once.
    pub fn missing(&self, frames: &FrameList, start: usize) -> Vec<FrameId> {
        let mut seen = HashSet::new();
        self.window(frames, start)
            .filter_map(|index| frames.get(index))
            .filter(|id| !self.cache.contains(id) && !self.pending.contains(*id))
            .filter(|id| seen.insert(*id))
            .map(str::to_string)
            .collect()
    }

    /// Load every missing frame of the window and wait for all of them
    ///
    /// Resolves immediately (no loads) when the window is resident.
    pub async fn fill(&mut self, frames: &FrameList, start: usize) -> FillReport {
        let ids = self.missing(frames, start);
        if ids.is_empty() {
            debug!(start, "Buffer window already resident");
            return FillReport::noop(start);
        }

        info!(start, count = ids.len(), "Filling buffer window");
        self.loads_issued += ids.len();
        let batch = load_batch(Arc::clone(&self.loader), start, ids, self.load_timeout).await;
        self.apply(batch, frames.len())
    }

    /// Issue the window's missing loads in the background
    ///
    /// Returns the number of loads issued.
    pub fn prefetch(&mut self, frames: &FrameList, start: usize) -> usize {
        let ids = self.missing(frames, start);
        if ids.is_empty() {
            return 0;
        }

        let count = ids.len();
        debug!(start, count, "Prefetching buffer window");
        self.pending.extend(ids.iter().cloned());
        self.loads_issued += count;
        self.inflight.push(Box::pin(load_batch(
            Arc::clone(&self.loader),
            start,
            ids,
            self.load_timeout,
        )));
        count
    }

    /// Wait for the next background batch and apply it
    ///
    /// Returns None when nothing is in flight. Cancel-safe: dropping the
    /// future before it completes loses nothing.
    pub async fn next_settled(&mut self, total: usize) -> Option<FillReport> {
        let batch = self.inflight.next().await?;
        Some(self.apply(batch, total))
    }

    /// Drive background batches until `frame_id` is no longer in flight
    pub async fn wait_for(&mut self, frame_id: &str, total: usize) -> Vec<FillReport> {
        let mut reports = Vec::new();
        while self.pending.contains(frame_id) {
            match self.inflight.next().await {
                Some(batch) => reports.push(self.apply(batch, total)),
                None => {
                    self.pending.remove(frame_id);
                    break;
                }
            }
        }
        reports
    }

    fn apply(&mut self, batch: SettledBatch, total: usize) -> FillReport {
        let mut report = FillReport {
            start: batch.start,
            requested: batch.requested,
            ..FillReport::default()
        };

        for outcome in batch.outcomes {
            self.pending.remove(&outcome.frame_id);
            match outcome.result {
                Ok(frame) => {
                    self.cache.insert(frame);
                    self.events.emit_lossy(ViewerEvent::LoadProgress {
                        loaded: self.cache.len(),
                        total,
                        timestamp: chrono::Utc::now(),
                    });
                    report.loaded.push(outcome.frame_id);
                }
                Err(err) => {
                    // Absent entry lets a later fill retry the frame
                    self.cache.remove(&outcome.frame_id);
                    warn!(frame_id = %outcome.frame_id, error = %err, "Frame load failed");
                    self.events.emit_lossy(ViewerEvent::FrameLoadFailed {
                        frame_id: outcome.frame_id.clone(),
                        error: err.to_string(),
                        timestamp: chrono::Utc::now(),
                    });
                    report.failed.push((outcome.frame_id, err));
                }
            }
        }

        debug!(
            start = report.start,
            requested = report.requested.len(),
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            cached = self.cache.len(),
            "Buffer batch settled"
        );
        report
    }
}

/// Issue all loads concurrently and collect every outcome
async fn load_batch<L: FrameLoader>(
    loader: Arc<L>,
    start: usize,
    ids: Vec<FrameId>,
    timeout: Option<Duration>,
) -> SettledBatch {
    let loads = ids.iter().cloned().map(|frame_id| {
        let loader = Arc::clone(&loader);
        async move {
            let result = load_one(loader.as_ref(), &frame_id, timeout).await;
            LoadOutcome { frame_id, result }
        }
    });
    let outcomes = join_all(loads).await;

    SettledBatch {
        start,
        requested: ids,
        outcomes,
    }
}

async fn load_one<L: FrameLoader>(
    loader: &L,
    frame_id: &str,
    timeout: Option<Duration>,
) -> Result<Frame> {
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, loader.load(frame_id)).await {
            Ok(result) => result,
            Err(_) => Err(Error::frame_load(
                frame_id,
                format!("timed out after {} ms", limit.as_millis()),
            )),
        },
        None => loader.load(frame_id).await,
    }
}
