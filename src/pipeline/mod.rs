//! One pipeline instance: bounded request queue, worker pool, response
//! cache, resource pool, and background updater, wired together.
//!
//! A [`Pipeline`] is the unit the hot-reload controller swaps: it can be
//! drained (workers stop dequeuing, in-flight requests finish, queued
//! requests are handed back), resumed after an aborted reload, and
//! retired once a replacement is live.
//!
//! Requires a tokio runtime context — construction spawns the worker
//! tasks and the background updater.

pub mod request;
mod worker;

pub use request::{RequestHandle, RequestOutcome};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::backend::{KnowledgeSource, LanguageBackend};
use crate::cache::{self, ResponseCache};
use crate::config::{PipelineConfig, SubmitMode};
use crate::metrics::{BackgroundUpdater, MetricsSnapshot, SharedMetrics};
use crate::pool::ResourcePool;
use crate::telemetry;
use crate::{MuninnError, Result};

use request::Request;

/// Request-path counters for one pipeline instance.
///
/// Written by the submission path and workers; the background growth
/// record lives separately in [`SharedMetrics`] and is never touched
/// here.
#[derive(Default)]
pub(crate) struct PipelineStats {
    total: AtomicU64,
    active: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    response_micros: AtomicU64,
    responses: AtomicU64,
}

/// Plain copy of the accumulated counters, carried across reloads.
#[derive(Debug, Clone, Default)]
pub(crate) struct StatsCounters {
    pub total: u64,
    pub hits: u64,
    pub misses: u64,
    pub response_micros: u64,
    pub responses: u64,
}

impl PipelineStats {
    pub fn record_hit(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response(&self, elapsed: Duration) {
        self.response_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        self.responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn worker_started(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    pub fn worker_finished(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn active(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }

    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        if hits + misses == 0 {
            0.0
        } else {
            hits as f64 / (hits + misses) as f64
        }
    }

    pub fn avg_response_ms(&self) -> f64 {
        let responses = self.responses.load(Ordering::Relaxed);
        if responses == 0 {
            0.0
        } else {
            self.response_micros.load(Ordering::Relaxed) as f64 / responses as f64 / 1_000.0
        }
    }

    pub fn counters(&self) -> StatsCounters {
        StatsCounters {
            total: self.total.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            response_micros: self.response_micros.load(Ordering::Relaxed),
            responses: self.responses.load(Ordering::Relaxed),
        }
    }

    pub fn restore(&self, counters: &StatsCounters) {
        self.total.store(counters.total, Ordering::Relaxed);
        self.hits.store(counters.hits, Ordering::Relaxed);
        self.misses.store(counters.misses, Ordering::Relaxed);
        self.response_micros
            .store(counters.response_micros, Ordering::Relaxed);
        self.responses.store(counters.responses, Ordering::Relaxed);
    }
}

/// State shared between the submission path and the workers.
pub(crate) struct PipelineShared {
    pub cache: ResponseCache,
    pub pool: Arc<ResourcePool>,
    pub metrics: Arc<SharedMetrics>,
    pub backend: Arc<dyn LanguageBackend>,
    pub knowledge: Vec<Arc<dyn KnowledgeSource>>,
    pub stats: PipelineStats,
}

/// A complete request-processing pipeline instance.
pub struct Pipeline {
    pub(crate) shared: Arc<PipelineShared>,
    queue_tx: mpsc::Sender<Request>,
    queue_rx: worker::SharedReceiver,
    workers: StdMutex<Vec<JoinHandle<()>>>,
    stop: StdMutex<watch::Sender<bool>>,
    updater: StdMutex<Option<BackgroundUpdater>>,
    config: PipelineConfig,
}

impl Pipeline {
    /// Construct a pipeline and spawn its workers and updater.
    ///
    /// Requires a tokio runtime context.
    pub fn new(
        config: PipelineConfig,
        backend: Arc<dyn LanguageBackend>,
        knowledge: Vec<Arc<dyn KnowledgeSource>>,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);
        let shared = Arc::new(PipelineShared {
            cache: ResponseCache::new(&config.cache),
            pool: ResourcePool::new(config.pool_size, config.acquire_timeout),
            metrics: Arc::new(SharedMetrics::new(config.growth.base_pathways)),
            backend,
            knowledge,
            stats: PipelineStats::default(),
        });
        let updater =
            BackgroundUpdater::spawn(Arc::clone(&shared.metrics), config.growth.clone());
        let (stop_tx, _) = watch::channel(false);

        let pipeline = Self {
            shared,
            queue_tx,
            queue_rx: Arc::new(tokio::sync::Mutex::new(queue_rx)),
            workers: StdMutex::new(Vec::new()),
            stop: StdMutex::new(stop_tx),
            updater: StdMutex::new(Some(updater)),
            config,
        };
        pipeline.spawn_workers();
        pipeline
    }

    fn spawn_workers(&self) {
        let stop_rx = self
            .stop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribe();
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        for worker_id in 0..self.config.workers {
            workers.push(tokio::spawn(worker::run_worker(
                worker_id,
                Arc::clone(&self.shared),
                Arc::clone(&self.queue_rx),
                stop_rx.clone(),
            )));
        }
    }

    /// Submit a payload for processing.
    ///
    /// Empty (or whitespace-only) payloads are rejected. A fresh cache
    /// entry resolves the handle immediately without enqueuing; otherwise
    /// the request goes onto the bounded queue, subject to the configured
    /// backpressure mode.
    pub(crate) async fn submit(&self, payload: &str) -> Result<RequestHandle> {
        let normalized = normalize(payload);
        if normalized.is_empty() {
            return Err(MuninnError::InvalidInput("empty payload".into()));
        }
        let key = cache::cache_key(&normalized);

        if let Some(text) = self.shared.cache.get(key) {
            self.shared.stats.record_hit();
            return Ok(RequestHandle::ready(text));
        }

        let (request, handle) = Request::new(normalized, key);
        self.enqueue(request).await?;
        Ok(handle)
    }

    /// Put a request onto the bounded queue, honoring the submit mode.
    pub(crate) async fn enqueue(&self, mut request: Request) -> Result<()> {
        if !request.counted {
            self.shared.stats.record_miss();
            request.counted = true;
        }
        match self.config.submit_mode {
            SubmitMode::Reject => match self.queue_tx.try_send(request) {
                Ok(()) => Ok(()),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    metrics::counter!(telemetry::QUEUE_REJECTIONS_TOTAL).increment(1);
                    Err(MuninnError::CapacityExceeded)
                }
                Err(mpsc::error::TrySendError::Closed(_)) => Err(MuninnError::Shutdown),
            },
            SubmitMode::Block(timeout) => {
                match tokio::time::timeout(timeout, self.queue_tx.send(request)).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(_closed)) => Err(MuninnError::Shutdown),
                    Err(_elapsed) => {
                        metrics::counter!(telemetry::QUEUE_REJECTIONS_TOTAL).increment(1);
                        Err(MuninnError::CapacityExceeded)
                    }
                }
            }
        }
    }

    /// Re-enqueue a buffered request during replay, waiting for queue
    /// room instead of rejecting. A closed queue resolves the request
    /// with `Shutdown` so its caller never hangs.
    pub(crate) async fn enqueue_replay(&self, mut request: Request) {
        if !request.counted {
            self.shared.stats.record_miss();
            request.counted = true;
        }
        if let Err(err) = self.queue_tx.send(request).await {
            let _ = err.0.reply.send(Err(MuninnError::Shutdown));
        }
    }

    pub(crate) fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.config.workers
    }

    pub(crate) fn request_timeout(&self) -> Option<Duration> {
        self.config.request_timeout
    }

    /// Stop dequeues, wait for in-flight requests to finish, and hand
    /// back whatever was still queued (in submission order).
    pub(crate) async fn drain(&self) -> Vec<Request> {
        {
            let stop = self.stop.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = stop.send(true);
        }
        let handles: Vec<_> = {
            let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *workers)
        };
        for handle in handles {
            let _ = handle.await;
        }
        let mut rx = self.queue_rx.lock().await;
        let mut leftover = Vec::new();
        while let Ok(request) = rx.try_recv() {
            leftover.push(request);
        }
        leftover
    }

    /// Restart workers after an aborted reload left this instance drained.
    pub(crate) fn resume(&self) {
        let (stop_tx, _) = watch::channel(false);
        *self.stop.lock().unwrap_or_else(PoisonError::into_inner) = stop_tx;
        self.spawn_workers();
    }

    /// Stop the updater and close the pool. Called when a replacement
    /// pipeline has taken over, or as part of shutdown.
    pub(crate) async fn retire(&self) {
        let updater = self
            .updater
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(updater) = updater {
            updater.stop().await;
        }
        self.shared.pool.close();
    }

    /// Full stop: drain workers, resolve anything still queued with
    /// `Shutdown`, then retire. Returns how many queued requests were
    /// resolved that way.
    pub(crate) async fn shutdown(&self) -> usize {
        let leftover = self.drain().await;
        self.retire().await;
        let count = leftover.len();
        for request in leftover {
            let _ = request.reply.send(Err(MuninnError::Shutdown));
        }
        count
    }
}

/// Collapse runs of whitespace and trim, preserving case.
pub(crate) fn normalize(payload: &str) -> String {
    payload.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize("  what   is\tconsciousness \n"), "what is consciousness");
    }

    #[test]
    fn normalize_preserves_case() {
        assert_eq!(normalize("What is AI"), "What is AI");
    }

    #[test]
    fn normalize_empty_inputs() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \t\n"), "");
    }
}
