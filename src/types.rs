//! Public report types returned by the gateway surface.

use serde::Serialize;

use crate::metrics::MetricsSnapshot;

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    /// Served from the response cache at submission time.
    Cache,
    /// Computed by a worker through the backend.
    Computed,
}

/// Result of a single [`process`](crate::Muninn::process) call.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessReport {
    /// The generated (or cached) response text.
    pub response: String,
    /// Whether the response was served from the cache.
    pub cache_hit: bool,
    /// End-to-end latency in milliseconds.
    pub response_time_ms: f64,
    /// Where the response came from.
    pub source: ResponseSource,
    /// Growth metrics at resolution time.
    pub metrics: MetricsSnapshot,
}

/// Point-in-time system statistics from
/// [`system_info`](crate::Muninn::system_info).
#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    /// Requests currently being processed by workers.
    pub active_requests: u64,
    /// Total requests accepted since start (carried across reloads).
    pub total_requests: u64,
    /// Cache hits over total lookups, in `[0, 1]`.
    pub cache_hit_rate: f64,
    /// Mean end-to-end latency in milliseconds.
    pub avg_response_time_ms: f64,
    /// Entries currently in the response cache.
    pub cache_size: usize,
    /// Worker tasks in the current pipeline.
    pub workers: usize,
    /// Growth metrics snapshot.
    pub metrics: MetricsSnapshot,
    /// Whether a reload cycle is currently running.
    pub reload_in_progress: bool,
    /// Seconds since the gateway was built.
    pub uptime_secs: f64,
    /// Completed reload cycles.
    pub total_reloads: u64,
}
