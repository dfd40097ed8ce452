//! Tests for [`SharedMetrics`] and the background growth updater.

use std::sync::Arc;
use std::time::Duration;

use muninn::metrics::BackgroundUpdater;
use muninn::{GrowthConfig, MetricsSnapshot, SharedMetrics};

fn fast_growth() -> GrowthConfig {
    GrowthConfig::new().interval(Duration::from_millis(10))
}

// =========================================================================
// SharedMetrics
// =========================================================================

#[test]
fn fresh_record_starts_at_base() {
    let metrics = SharedMetrics::new(47_000);
    let snap = metrics.snapshot();
    assert_eq!(snap.score, 1.0);
    assert_eq!(snap.pathways, 47_000);
    assert_eq!(snap.iteration, 0);
}

#[test]
fn apply_growth_updates_score_pathways_and_iteration() {
    let metrics = SharedMetrics::new(47_000);
    let snap = metrics.apply_growth(2.0, 47_000).unwrap();
    assert_eq!(snap.score, 2.0);
    assert_eq!(snap.pathways, 94_000);
    assert_eq!(snap.iteration, 1);
}

#[test]
fn apply_growth_rejects_bad_factors() {
    let metrics = SharedMetrics::new(47_000);
    assert!(metrics.apply_growth(0.0, 47_000).is_err());
    assert!(metrics.apply_growth(-1.0, 47_000).is_err());
    assert!(metrics.apply_growth(f64::NAN, 47_000).is_err());
    assert!(metrics.apply_growth(f64::INFINITY, 47_000).is_err());

    // A rejected tick leaves the record untouched.
    let snap = metrics.snapshot();
    assert_eq!(snap.score, 1.0);
    assert_eq!(snap.iteration, 0);
}

#[test]
fn restore_overwrites_the_record() {
    let metrics = SharedMetrics::new(47_000);
    metrics.restore(&MetricsSnapshot {
        score: 1.5,
        pathways: 70_500,
        iteration: 42,
    });
    let snap = metrics.snapshot();
    assert_eq!(snap.score, 1.5);
    assert_eq!(snap.pathways, 70_500);
    assert_eq!(snap.iteration, 42);
}

// =========================================================================
// BackgroundUpdater
// =========================================================================

#[tokio::test(start_paused = true)]
async fn score_grows_monotonically_across_ticks() {
    let metrics = Arc::new(SharedMetrics::new(47_000));
    let updater = BackgroundUpdater::spawn(Arc::clone(&metrics), fast_growth());

    let mut prev = metrics.snapshot();
    for _ in 0..25 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let snap = metrics.snapshot();
        assert!(snap.score >= prev.score);
        assert!(snap.pathways >= prev.pathways);
        assert!(snap.iteration >= prev.iteration);
        prev = snap;
    }

    assert!(prev.iteration >= 20);
    assert!(prev.score > 1.0);
    updater.stop().await;
}

#[tokio::test(start_paused = true)]
async fn updater_survives_rejected_ticks() {
    // A NaN perturbation makes every computed factor NaN, which the
    // record rejects tick after tick.
    let metrics = Arc::new(SharedMetrics::new(47_000));
    let config = fast_growth().perturbation(f64::NAN);
    let updater = BackgroundUpdater::spawn(Arc::clone(&metrics), config);

    tokio::time::sleep(Duration::from_millis(100)).await;

    let snap = metrics.snapshot();
    assert_eq!(snap.iteration, 0);
    assert_eq!(snap.score, 1.0);

    // The loop is still alive and responds to stop.
    updater.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_halts_ticking() {
    let metrics = Arc::new(SharedMetrics::new(47_000));
    let updater = BackgroundUpdater::spawn(Arc::clone(&metrics), fast_growth());

    tokio::time::sleep(Duration::from_millis(55)).await;
    updater.stop().await;
    let stopped_at = metrics.snapshot();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(metrics.snapshot().iteration, stopped_at.iteration);
}

#[test]
fn snapshot_serializes_for_status_endpoints() {
    let snap = MetricsSnapshot {
        score: 1.25,
        pathways: 58_750,
        iteration: 7,
    };
    let json = serde_json::to_value(&snap).unwrap();
    assert_eq!(json["pathways"], 58_750);
    assert_eq!(json["iteration"], 7);

    let back: MetricsSnapshot = serde_json::from_value(json).unwrap();
    assert_eq!(back, snap);
}
