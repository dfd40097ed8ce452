//! Telemetry metric name constants.
//!
//! Centralised metric names for muninn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `muninn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `source` — where the response came from: "cache" or "computed"
//! - `status` — outcome: "ok" or "error"

/// Total requests processed through the public surface.
///
/// Labels: `source` ("cache" | "computed"), `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "muninn_requests_total";

/// End-to-end request duration in seconds.
///
/// Labels: `source`.
pub const REQUEST_DURATION_SECONDS: &str = "muninn_request_duration_seconds";

/// Total response cache hits.
pub const CACHE_HITS_TOTAL: &str = "muninn_cache_hits_total";

/// Total response cache misses.
pub const CACHE_MISSES_TOTAL: &str = "muninn_cache_misses_total";

/// Submissions rejected because the request queue was at capacity.
pub const QUEUE_REJECTIONS_TOTAL: &str = "muninn_queue_rejections_total";

/// Pool acquisitions that timed out waiting for a free handle.
pub const POOL_TIMEOUTS_TOTAL: &str = "muninn_pool_timeouts_total";

/// Background updater ticks applied.
pub const UPDATER_TICKS_TOTAL: &str = "muninn_updater_ticks_total";

/// Reload cycles started.
pub const RELOADS_TOTAL: &str = "muninn_reloads_total";

/// Reload cycles that aborted and fell back to the previous pipeline.
pub const RELOAD_FAILURES_TOTAL: &str = "muninn_reload_failures_total";
