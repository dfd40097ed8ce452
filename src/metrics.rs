//! Shared growth metrics and the background updater.
//!
//! [`SharedMetrics`] is the one piece of state mutated outside the
//! request path. It is only ever written by the [`BackgroundUpdater`]
//! task, through the synchronized [`apply_growth`](SharedMetrics::apply_growth)
//! accessor; everything else reads immutable [`MetricsSnapshot`] copies.
//! The raw storage is never exposed.
//!
//! The updater runs on its own interval, independent of request
//! processing: it neither blocks on the worker pool nor is blocked by
//! it. A failing tick is logged and skipped; the loop continues on the
//! next interval.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::telemetry;
use crate::{MuninnError, Result};

/// Configuration for the background growth loop.
///
/// Each tick multiplies the score by `base_factor` plus a small random
/// perturbation in `[0, perturbation)`. With the defaults the score grows
/// monotonically, roughly 0.01–0.11% per tick.
#[derive(Debug, Clone)]
pub struct GrowthConfig {
    /// Interval between ticks. Default: 1 s.
    pub interval: Duration,
    /// Deterministic multiplicative factor per tick. Default: 1.0001.
    pub base_factor: f64,
    /// Upper bound of the random additive perturbation. Default: 0.001.
    pub perturbation: f64,
    /// Pathway count at score 1.0. Default: 47,000.
    pub base_pathways: u64,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            base_factor: 1.0001,
            perturbation: 0.001,
            base_pathways: 47_000,
        }
    }
}

impl GrowthConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tick interval.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the deterministic growth factor per tick.
    pub fn base_factor(mut self, factor: f64) -> Self {
        self.base_factor = factor;
        self
    }

    /// Set the upper bound of the random perturbation.
    pub fn perturbation(mut self, p: f64) -> Self {
        self.perturbation = p;
        self
    }

    /// Set the pathway count corresponding to score 1.0.
    pub fn base_pathways(mut self, n: u64) -> Self {
        self.base_pathways = n;
        self
    }
}

/// Point-in-time copy of the shared metrics record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Growth score; starts at 1.0 and grows multiplicatively.
    pub score: f64,
    /// Derived pathway count (`score * base_pathways`).
    pub pathways: u64,
    /// Number of ticks applied so far.
    pub iteration: u64,
}

struct MetricsState {
    score: f64,
    pathways: u64,
    iteration: u64,
}

/// Synchronized accessor around the growth record.
///
/// Readers get [`MetricsSnapshot`] copies; the only mutators are
/// [`apply_growth`](Self::apply_growth) (updater task) and
/// [`restore`](Self::restore) (reload controller).
pub struct SharedMetrics {
    inner: Mutex<MetricsState>,
}

impl SharedMetrics {
    /// Create a fresh record at score 1.0.
    pub fn new(base_pathways: u64) -> Self {
        Self {
            inner: Mutex::new(MetricsState {
                score: 1.0,
                pathways: base_pathways,
                iteration: 0,
            }),
        }
    }

    /// Read a point-in-time copy.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        MetricsSnapshot {
            score: state.score,
            pathways: state.pathways,
            iteration: state.iteration,
        }
    }

    /// Apply one growth tick and return the resulting snapshot.
    ///
    /// Rejects non-finite or non-positive factors so a misconfigured
    /// perturbation cannot corrupt the record.
    pub fn apply_growth(&self, factor: f64, base_pathways: u64) -> Result<MetricsSnapshot> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(MuninnError::InvalidInput(format!(
                "growth factor must be finite and positive, got {factor}"
            )));
        }
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.score *= factor;
        state.pathways = (state.score * base_pathways as f64) as u64;
        state.iteration += 1;
        Ok(MetricsSnapshot {
            score: state.score,
            pathways: state.pathways,
            iteration: state.iteration,
        })
    }

    /// Overwrite the record from a snapshot (used on reload restore).
    pub fn restore(&self, snapshot: &MetricsSnapshot) {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.score = snapshot.score;
        state.pathways = snapshot.pathways;
        state.iteration = snapshot.iteration;
    }
}

/// Periodic task applying growth ticks to a [`SharedMetrics`] record.
///
/// Spawned per pipeline instance; stopped on drain, shutdown, or when a
/// reload retires the old pipeline.
pub struct BackgroundUpdater {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl BackgroundUpdater {
    /// Spawn the updater loop.
    ///
    /// Requires a tokio runtime context.
    pub fn spawn(metrics: Arc<SharedMetrics>, config: GrowthConfig) -> Self {
        let (stop, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(config.interval);
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first interval tick fires immediately; swallow it so the
            // first growth step lands one full interval after start.
            ticks.tick().await;
            debug!(interval_ms = config.interval.as_millis() as u64, "updater started");
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticks.tick() => {
                        let factor = config.base_factor
                            + rand::thread_rng().r#gen::<f64>() * config.perturbation;
                        match metrics.apply_growth(factor, config.base_pathways) {
                            Ok(snapshot) => {
                                metrics::counter!(telemetry::UPDATER_TICKS_TOTAL).increment(1);
                                if snapshot.iteration % 100 == 0 {
                                    info!(
                                        iteration = snapshot.iteration,
                                        score = snapshot.score,
                                        "growth progress"
                                    );
                                }
                            }
                            Err(e) => {
                                // Per-tick failures never kill the loop.
                                error!(error = %e, "updater tick failed; continuing");
                            }
                        }
                    }
                }
            }
            debug!("updater stopped");
        });
        Self { stop, handle }
    }

    /// Stop the loop and wait for the task to finish.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        let _ = self.handle.await;
    }
}
