//! Tests for [`ResourcePool`] — boundedness, FIFO fairness, timeouts.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use muninn::{MuninnError, ResourcePool};

// =========================================================================
// Boundedness
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_holders_never_exceed_pool_size() {
    let pool = ResourcePool::new(3, Duration::from_secs(5));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..12 {
        let pool = Arc::clone(&pool);
        let peak = Arc::clone(&peak);
        tasks.push(tokio::spawn(async move {
            let _guard = pool.acquire().await.unwrap();
            peak.fetch_max(pool.in_use(), Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(pool.in_use(), 0);
}

#[tokio::test]
async fn size_and_in_use_track_checkouts() {
    let pool = ResourcePool::new(2, Duration::from_secs(1));
    assert_eq!(pool.size(), 2);
    assert_eq!(pool.in_use(), 0);

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    assert_eq!(pool.in_use(), 2);

    drop(a);
    assert_eq!(pool.in_use(), 1);
    drop(b);
    assert_eq!(pool.in_use(), 0);
}

// =========================================================================
// FIFO fairness
// =========================================================================

#[tokio::test(start_paused = true)]
async fn waiters_are_granted_in_arrival_order() {
    let pool = ResourcePool::new(1, Duration::from_secs(60));
    let first = pool.acquire().await.unwrap();

    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    let mut waiters = Vec::new();
    for i in 0..5usize {
        let pool = Arc::clone(&pool);
        let order = Arc::clone(&order);
        waiters.push(tokio::spawn(async move {
            let guard = pool.acquire().await.unwrap();
            order.lock().unwrap().push(i);
            drop(guard);
        }));
        // Let this waiter park on the semaphore before the next arrives.
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    drop(first);
    for waiter in waiters {
        waiter.await.unwrap();
    }

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn released_handles_are_reused() {
    let pool = ResourcePool::new(1, Duration::from_secs(1));
    let first_id = {
        let guard = pool.acquire().await.unwrap();
        guard.handle().id
    };
    let guard = pool.acquire().await.unwrap();
    assert_eq!(guard.handle().id, first_id);
}

// =========================================================================
// Timeouts and shutdown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn acquire_times_out_with_resource_exhaustion() {
    let pool = ResourcePool::new(1, Duration::from_millis(50));
    let _held = pool.acquire().await.unwrap();

    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, MuninnError::ResourceExhaustion { .. }));
    assert!(err.is_transient());
}

#[tokio::test(start_paused = true)]
async fn timed_out_waiter_does_not_leak_a_permit() {
    let pool = ResourcePool::new(1, Duration::from_millis(20));
    let held = pool.acquire().await.unwrap();
    assert!(pool.acquire().await.is_err());

    drop(held);
    // The slot freed by the timed-out waiter is usable again.
    let guard = pool.acquire().await.unwrap();
    assert_eq!(pool.in_use(), 1);
    drop(guard);
}

#[tokio::test]
async fn closed_pool_fails_pending_and_future_acquires() {
    let pool = ResourcePool::new(1, Duration::from_secs(5));
    let held = pool.acquire().await.unwrap();

    pool.close();
    assert!(matches!(pool.acquire().await, Err(MuninnError::Shutdown)));

    // Checked-out guards still return cleanly.
    drop(held);
    assert_eq!(pool.in_use(), 0);
}
