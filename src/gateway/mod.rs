//! Public gateway surface.

mod builder;

pub use builder::MuninnBuilder;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::join_all;
use tracing::{info, instrument};

use crate::pipeline::RequestHandle;
use crate::reload::HotReloadController;
use crate::types::{ProcessReport, SystemInfo};
use crate::{MuninnError, Result};

/// Main entry point: a request-processing core with response caching,
/// pooled backend access, background growth metrics, and hot reload.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use muninn::{BackendError, Fact, LanguageBackend, Muninn};
///
/// struct Echo;
///
/// #[async_trait]
/// impl LanguageBackend for Echo {
///     async fn generate(&self, prompt: &str, _context: &[Fact]) -> Result<String, BackendError> {
///         Ok(format!("echo: {prompt}"))
///     }
/// }
///
/// #[tokio::main]
/// async fn main() -> muninn::Result<()> {
///     let gateway = Muninn::builder().backend(Arc::new(Echo)).build()?;
///
///     let first = gateway.process("What is consciousness?").await?;
///     assert!(!first.cache_hit);
///
///     let second = gateway.process("What is consciousness?").await?;
///     assert!(second.cache_hit);
///
///     gateway.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct Muninn {
    controller: Arc<HotReloadController>,
    started_at: tokio::time::Instant,
    shut: AtomicBool,
}

impl Muninn {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> MuninnBuilder {
        MuninnBuilder::new()
    }

    pub(crate) fn from_controller(controller: Arc<HotReloadController>) -> Self {
        Self {
            controller,
            started_at: tokio::time::Instant::now(),
            shut: AtomicBool::new(false),
        }
    }

    /// Process a query end to end and report how it was served.
    #[instrument(skip(self, query))]
    pub async fn process(&self, query: &str) -> Result<ProcessReport> {
        if self.shut.load(Ordering::SeqCst) {
            return Err(MuninnError::Shutdown);
        }
        self.controller.process(query).await
    }

    /// Process multiple queries concurrently, preserving input order in
    /// the output.
    pub async fn process_many(&self, queries: &[&str]) -> Vec<Result<ProcessReport>> {
        join_all(queries.iter().map(|q| self.process(q))).await
    }

    /// Submit a query and get back an awaitable, cancellable handle.
    pub async fn submit(&self, query: &str) -> Result<RequestHandle> {
        if self.shut.load(Ordering::SeqCst) {
            return Err(MuninnError::Shutdown);
        }
        self.controller.submit(query).await
    }

    /// Manually trigger a reload cycle (equivalent to a change signal,
    /// without the debounce). Returns `true` if the pipeline swapped.
    pub async fn trigger_reload(&self) -> bool {
        self.controller.reload().await
    }

    /// Point-in-time system statistics.
    pub async fn system_info(&self) -> SystemInfo {
        let pipeline = self.controller.current().await;
        let counters = pipeline.shared.stats.counters();
        SystemInfo {
            active_requests: pipeline.shared.stats.active(),
            total_requests: counters.total,
            cache_hit_rate: pipeline.shared.stats.cache_hit_rate(),
            avg_response_time_ms: pipeline.shared.stats.avg_response_ms(),
            cache_size: pipeline.shared.cache.len(),
            workers: pipeline.worker_count(),
            metrics: pipeline.metrics_snapshot(),
            reload_in_progress: self.controller.reload_in_progress(),
            uptime_secs: self.started_at.elapsed().as_secs_f64(),
            total_reloads: self.controller.total_reloads(),
        }
    }

    /// Stop the watcher, workers, pool, and updater.
    ///
    /// Idempotent, and safe to call during an in-progress reload: the
    /// reload settles first, then teardown proceeds. Queued requests are
    /// resolved with [`MuninnError::Shutdown`](crate::MuninnError::Shutdown)
    /// rather than silently dropped.
    pub async fn shutdown(&self) {
        if self.shut.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("shutting down");
        self.controller.shutdown().await;
    }
}
