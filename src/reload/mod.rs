//! Hot-reload controller: swap the running pipeline without losing
//! state or dropping requests.
//!
//! # State machine
//!
//! ```text
//! Idle → Snapshotting → Draining → Rebuilding → Restoring → Replaying → Idle
//!                                      │            │
//!                                      └── failure ──┴──► resume old pipeline,
//!                                                         replay buffer, Idle
//! ```
//!
//! A debounced change signal moves the controller out of `Idle`; at most
//! one reload runs at a time and triggers arriving mid-cycle are
//! ignored. From `Snapshotting` onwards, new submissions are redirected
//! into a side buffer. `Draining` stops dequeues on the old queue, lets
//! in-flight requests finish, and moves still-queued requests to the
//! front of the buffer; the [`ReloadSnapshot`] is sealed once the drain
//! settles, so cache writes and counters from requests finishing
//! mid-drain are carried over. `Rebuilding` constructs a fresh [`Pipeline`]
//! through the [`PipelineFactory`]; `Restoring` loads the snapshot into
//! it; `Replaying` drains the buffer into the new instance in original
//! submission order and resumes normal routing.
//!
//! Any failure while rebuilding or restoring aborts the cycle: the
//! half-built instance is discarded, the old pipeline's workers resume,
//! and the buffer is replayed against the old instance. A failed reload
//! costs buffered requests latency, never data — `ReloadAborted` is
//! logged and never surfaced to callers.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::cache::{self, CachedAnswer};
use crate::metrics::MetricsSnapshot;
use crate::pipeline::request::{Request, RequestHandle};
use crate::pipeline::{self, Pipeline, StatsCounters};
use crate::telemetry;
use crate::types::{ProcessReport, ResponseSource};
use crate::{MuninnError, Result};

/// Builds replacement [`Pipeline`] instances during a reload.
///
/// The controller swaps implementations behind this trait rather than
/// reloading live code: a factory may return a pipeline built from newly
/// loaded configuration, a different backend, or a freshly compiled
/// implementation.
pub trait PipelineFactory: Send + Sync {
    fn build(&self) -> Result<Pipeline>;
}

impl<F> PipelineFactory for F
where
    F: Fn() -> Result<Pipeline> + Send + Sync,
{
    fn build(&self) -> Result<Pipeline> {
        self()
    }
}

/// What kind of filesystem change a signal describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// A change notification from an external watcher.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Phases of a reload cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    Idle,
    Snapshotting,
    Draining,
    Rebuilding,
    Restoring,
    Replaying,
}

/// Configuration for the reload controller.
#[derive(Debug, Clone)]
pub struct ReloadConfig {
    /// Minimum spacing between reload triggers; signals arriving within
    /// this window coalesce into the one already running. Default: 1 s.
    pub cooldown: Duration,
    /// Upper bound on cache entries carried across a swap (most recently
    /// used first). Default: 5,000.
    pub snapshot_cache_limit: usize,
    /// Substring patterns of paths whose changes never trigger a reload.
    pub ignore: Vec<String>,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(1),
            snapshot_cache_limit: 5_000,
            ignore: vec![
                ".git".into(),
                ".log".into(),
                ".tmp".into(),
                "~".into(),
            ],
        }
    }
}

impl ReloadConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debounce cooldown.
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Set the snapshot cache entry limit.
    pub fn snapshot_cache_limit(mut self, limit: usize) -> Self {
        self.snapshot_cache_limit = limit;
        self
    }

    /// Add an ignore pattern (substring match on the changed path).
    pub fn ignore(mut self, pattern: impl Into<String>) -> Self {
        self.ignore.push(pattern.into());
        self
    }

    fn is_relevant(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        !self.ignore.iter().any(|pattern| path.contains(pattern))
    }
}

/// State captured once the old pipeline has drained, loaded into the
/// replacement pipeline. Consumed and discarded once restore completes.
pub struct ReloadSnapshot {
    pub(crate) metrics: MetricsSnapshot,
    pub(crate) stats: StatsCounters,
    pub(crate) cache_entries: Vec<(u64, CachedAnswer)>,
    /// Requests sitting in the side buffer (plus drained leftovers) when
    /// the snapshot was sealed.
    pub(crate) buffered: usize,
}

pub(crate) struct HotReloadController {
    current: tokio::sync::RwLock<Arc<Pipeline>>,
    factory: Arc<dyn PipelineFactory>,
    buffer: StdMutex<VecDeque<Request>>,
    buffering: AtomicBool,
    state: StdMutex<ReloadState>,
    // Held for the duration of one reload cycle; try_lock failure means
    // a cycle is already running and the trigger is dropped.
    reload_gate: tokio::sync::Mutex<()>,
    total_reloads: AtomicU64,
    config: ReloadConfig,
    watcher: StdMutex<Option<JoinHandle<()>>>,
}

impl HotReloadController {
    pub fn new(initial: Pipeline, factory: Arc<dyn PipelineFactory>, config: ReloadConfig) -> Self {
        Self {
            current: tokio::sync::RwLock::new(Arc::new(initial)),
            factory,
            buffer: StdMutex::new(VecDeque::new()),
            buffering: AtomicBool::new(false),
            state: StdMutex::new(ReloadState::Idle),
            reload_gate: tokio::sync::Mutex::new(()),
            total_reloads: AtomicU64::new(0),
            config,
            watcher: StdMutex::new(None),
        }
    }

    // =====================================================================
    // Request routing
    // =====================================================================

    /// Route a submission to the live pipeline, or into the side buffer
    /// while a reload is in progress.
    pub async fn submit(&self, payload: &str) -> Result<RequestHandle> {
        if self.buffering.load(Ordering::SeqCst) {
            let normalized = pipeline::normalize(payload);
            if normalized.is_empty() {
                return Err(MuninnError::InvalidInput("empty payload".into()));
            }
            let key = cache::cache_key(&normalized);
            let (request, handle) = Request::new(normalized, key);
            {
                let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
                // Re-check under the buffer lock: replay flips the flag
                // while holding it, so this cannot race a finished reload.
                if self.buffering.load(Ordering::SeqCst) {
                    buffer.push_back(request);
                    return Ok(handle);
                }
            }
            // Reload completed between the checks; enqueue normally.
            self.current.read().await.enqueue(request).await?;
            return Ok(handle);
        }

        // Hold the read guard across the enqueue so a concurrent swap
        // cannot complete while a submission to the old instance is still
        // in flight.
        self.current.read().await.submit(payload).await
    }

    /// Submit and await resolution, producing a full [`ProcessReport`].
    pub async fn process(&self, query: &str) -> Result<ProcessReport> {
        let start = tokio::time::Instant::now();
        let result = async {
            let handle = self.submit(query).await?;
            let timeout = self.current.read().await.request_timeout();
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, handle.wait()).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(MuninnError::Timeout(limit)),
                },
                None => handle.wait().await,
            }
        }
        .await;
        let elapsed = start.elapsed();

        match result {
            Ok(outcome) => {
                let source = if outcome.cache_hit { "cache" } else { "computed" };
                metrics::counter!(telemetry::REQUESTS_TOTAL, "source" => source, "status" => "ok")
                    .increment(1);
                metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS, "source" => source)
                    .record(elapsed.as_secs_f64());
                let pipeline = Arc::clone(&*self.current.read().await);
                pipeline.shared.stats.record_response(elapsed);
                Ok(ProcessReport {
                    response: outcome.text,
                    cache_hit: outcome.cache_hit,
                    response_time_ms: elapsed.as_secs_f64() * 1_000.0,
                    source: if outcome.cache_hit {
                        ResponseSource::Cache
                    } else {
                        ResponseSource::Computed
                    },
                    metrics: pipeline.metrics_snapshot(),
                })
            }
            Err(e) => {
                metrics::counter!(
                    telemetry::REQUESTS_TOTAL,
                    "source" => "computed",
                    "status" => "error"
                )
                .increment(1);
                Err(e)
            }
        }
    }

    pub async fn current(&self) -> Arc<Pipeline> {
        Arc::clone(&*self.current.read().await)
    }

    pub fn reload_in_progress(&self) -> bool {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) != ReloadState::Idle
    }

    pub fn total_reloads(&self) -> u64 {
        self.total_reloads.load(Ordering::SeqCst)
    }

    // =====================================================================
    // Reload cycle
    // =====================================================================

    /// Run one reload cycle. Returns `true` if the pipeline was swapped,
    /// `false` if the trigger was ignored or the cycle aborted.
    pub async fn reload(&self) -> bool {
        let Ok(_gate) = self.reload_gate.try_lock() else {
            info!("reload already in progress; ignoring trigger");
            return false;
        };
        metrics::counter!(telemetry::RELOADS_TOTAL).increment(1);
        info!("reload starting");

        self.set_state(ReloadState::Snapshotting);
        self.buffering.store(true, Ordering::SeqCst);
        let old = Arc::clone(&*self.current.read().await);

        self.set_state(ReloadState::Draining);
        let mut leftover = old.drain().await;

        // Seal the snapshot only now: requests finishing during the drain
        // were still writing the cache and counters, and those writes must
        // be carried into the new instance.
        let snapshot = ReloadSnapshot {
            metrics: old.shared.metrics.snapshot(),
            stats: old.shared.stats.counters(),
            cache_entries: old
                .shared
                .cache
                .export_recent(self.config.snapshot_cache_limit),
            buffered: leftover.len()
                + self
                    .buffer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .len(),
        };
        debug!(
            cache_entries = snapshot.cache_entries.len(),
            iteration = snapshot.metrics.iteration,
            buffered = snapshot.buffered,
            "state snapshot sealed"
        );

        self.set_state(ReloadState::Rebuilding);
        let swapped = match self.build_and_restore(snapshot) {
            Ok(fresh) => {
                {
                    let mut current = self.current.write().await;
                    *current = Arc::clone(&fresh);
                }
                // Submissions that raced the swap may have landed on the
                // old queue after the first drain; sweep them into replay.
                leftover.extend(old.drain().await);
                self.set_state(ReloadState::Replaying);
                self.replay(leftover, &fresh).await;
                old.retire().await;
                let completed = self.total_reloads.fetch_add(1, Ordering::SeqCst) + 1;
                info!(total_reloads = completed, "reload complete");
                true
            }
            Err(e) => {
                let abort = MuninnError::ReloadAborted(e.to_string());
                warn!(error = %abort, "discarding new instance, keeping previous pipeline");
                metrics::counter!(telemetry::RELOAD_FAILURES_TOTAL).increment(1);
                old.resume();
                self.set_state(ReloadState::Replaying);
                self.replay(leftover, &old).await;
                false
            }
        };
        self.set_state(ReloadState::Idle);
        swapped
    }

    fn build_and_restore(&self, snapshot: ReloadSnapshot) -> Result<Arc<Pipeline>> {
        let fresh = self.factory.build()?;
        self.set_state(ReloadState::Restoring);
        fresh.shared.metrics.restore(&snapshot.metrics);
        fresh.shared.stats.restore(&snapshot.stats);
        fresh.shared.cache.restore(snapshot.cache_entries);
        debug!(buffered = snapshot.buffered, "snapshot restored into new pipeline");
        Ok(Arc::new(fresh))
    }

    /// Drain `leftover` (requests still queued when the old pipeline was
    /// drained) and then the side buffer into `target`, preserving
    /// original submission order. Ends buffering once the buffer is
    /// observed empty under its lock.
    async fn replay(&self, leftover: Vec<Request>, target: &Arc<Pipeline>) {
        let mut replayed = 0usize;
        for request in leftover {
            target.enqueue_replay(request).await;
            replayed += 1;
        }
        loop {
            let batch: Vec<Request> = {
                let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
                if buffer.is_empty() {
                    self.buffering.store(false, Ordering::SeqCst);
                    break;
                }
                buffer.drain(..).collect()
            };
            for request in batch {
                target.enqueue_replay(request).await;
                replayed += 1;
            }
        }
        if replayed > 0 {
            info!(replayed, "replayed buffered requests");
        }
    }

    fn set_state(&self, state: ReloadState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
        debug!(state = ?state, "reload state");
    }

    // =====================================================================
    // Change-signal watcher
    // =====================================================================

    /// Consume change events, debounce them, and trigger reloads.
    pub fn spawn_watcher(self: &Arc<Self>, mut changes: mpsc::Receiver<ChangeEvent>) {
        let controller = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let cooldown = controller.config.cooldown;
            let mut last_trigger: Option<tokio::time::Instant> = None;
            while let Some(event) = changes.recv().await {
                if !controller.config.is_relevant(&event.path) {
                    trace!(path = %event.path.display(), "ignoring change");
                    continue;
                }
                if last_trigger.is_some_and(|at| at.elapsed() < cooldown) {
                    trace!(path = %event.path.display(), "within cooldown; coalescing");
                    continue;
                }
                last_trigger = Some(tokio::time::Instant::now());
                info!(path = %event.path.display(), kind = ?event.kind, "change detected");
                controller.reload().await;
            }
            debug!("change watcher stopped");
        });
        *self.watcher.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    async fn stop_watcher(&self) {
        let handle = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
    }

    /// Stop the watcher, wait out any in-progress reload, resolve
    /// anything buffered, and shut the live pipeline down.
    pub async fn shutdown(&self) {
        self.stop_watcher().await;
        // Waits for an in-progress reload to settle; the gate stays held
        // so no new cycle can start underneath the teardown.
        let _gate = self.reload_gate.lock().await;
        self.buffering.store(false, Ordering::SeqCst);
        let buffered: Vec<Request> = {
            let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
            buffer.drain(..).collect()
        };
        for request in buffered {
            let _ = request.reply.send(Err(MuninnError::Shutdown));
        }
        let pipeline = Arc::clone(&*self.current.read().await);
        let resolved = pipeline.shutdown().await;
        if resolved > 0 {
            info!(resolved, "resolved queued requests with shutdown error");
        }
    }
}
