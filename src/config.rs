//! Pipeline configuration.

use std::time::Duration;

use crate::cache::CacheConfig;
use crate::metrics::GrowthConfig;

/// Backpressure behaviour when the request queue is at capacity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SubmitMode {
    /// Reject immediately with `CapacityExceeded`.
    Reject,
    /// Block the submitter up to the given timeout, then reject.
    Block(Duration),
}

/// Configuration for one pipeline instance.
///
/// ```rust
/// # use muninn::PipelineConfig;
/// # use std::time::Duration;
/// let config = PipelineConfig::new()
///     .workers(8)
///     .queue_capacity(512)
///     .pool_size(4)
///     .request_timeout(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of worker tasks. Default: `2 * available_parallelism`.
    pub workers: usize,
    /// Bounded request queue capacity. Default: 1,024.
    pub queue_capacity: usize,
    /// Backpressure behaviour on a full queue. Default: [`SubmitMode::Reject`].
    pub submit_mode: SubmitMode,
    /// Response cache settings.
    pub cache: CacheConfig,
    /// Number of pooled backend handles. Default: 8.
    pub pool_size: usize,
    /// Maximum wait for a pooled handle. Default: 5 s.
    pub acquire_timeout: Duration,
    /// Optional end-to-end request timeout. Default: none.
    pub request_timeout: Option<Duration>,
    /// Background growth loop settings.
    pub growth: GrowthConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            workers: parallelism * 2,
            queue_capacity: 1_024,
            submit_mode: SubmitMode::Reject,
            cache: CacheConfig::default(),
            pool_size: 8,
            acquire_timeout: Duration::from_secs(5),
            request_timeout: None,
            growth: GrowthConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker tasks (clamped to at least one).
    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n.max(1);
        self
    }

    /// Set the bounded queue capacity (clamped to at least one).
    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = n.max(1);
        self
    }

    /// Set the backpressure behaviour on a full queue.
    pub fn submit_mode(mut self, mode: SubmitMode) -> Self {
        self.submit_mode = mode;
        self
    }

    /// Set the response cache configuration.
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Set the number of pooled backend handles.
    pub fn pool_size(mut self, n: usize) -> Self {
        self.pool_size = n.max(1);
        self
    }

    /// Set the maximum wait for a pooled handle.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set an end-to-end per-request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the background growth configuration.
    pub fn growth(mut self, growth: GrowthConfig) -> Self {
        self.growth = growth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = PipelineConfig::default();
        assert!(config.workers >= 2);
        assert_eq!(config.queue_capacity, 1_024);
        assert_eq!(config.submit_mode, SubmitMode::Reject);
        assert_eq!(config.pool_size, 8);
        assert!(config.request_timeout.is_none());
    }

    #[test]
    fn zero_values_clamped() {
        let config = PipelineConfig::new().workers(0).queue_capacity(0).pool_size(0);
        assert_eq!(config.workers, 1);
        assert_eq!(config.queue_capacity, 1);
        assert_eq!(config.pool_size, 1);
    }
}
