//! Fixed-size pool of opaque backend handles with fair acquisition.
//!
//! Workers acquire a [`PooledHandle`] before every backend call, bounding
//! concurrent load on the shared backend to the pool size. Waiters queue
//! on a `tokio::sync::Semaphore`, which grants permits in FIFO order —
//! no caller can starve while later arrivals jump the queue, and nobody
//! busy-polls.
//!
//! Release is RAII: dropping the [`PoolGuard`] returns the handle to the
//! free list and then releases the permit, waking the longest-waiting
//! caller.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::telemetry;
use crate::{MuninnError, Result};

/// An opaque handle to the shared backend service.
///
/// Created once at pool construction and reused for the pool's lifetime;
/// a handle is owned by at most one in-flight request at a time (enforced
/// by [`PoolGuard`] ownership).
#[derive(Debug, Clone)]
pub struct PooledHandle {
    /// Stable handle identity within the pool.
    pub id: usize,
    /// When the handle was last returned to the pool.
    pub last_used: Instant,
}

/// Fixed-size, fair FIFO resource pool.
pub struct ResourcePool {
    permits: Arc<Semaphore>,
    free: Mutex<VecDeque<PooledHandle>>,
    size: usize,
    in_use: AtomicUsize,
    acquire_timeout: Duration,
}

impl ResourcePool {
    /// Create a pool of `size` handles.
    ///
    /// `acquire_timeout` bounds how long a caller may wait for a free
    /// handle before [`MuninnError::ResourceExhaustion`] is returned.
    /// A zero size is clamped to one handle.
    pub fn new(size: usize, acquire_timeout: Duration) -> Arc<Self> {
        let size = size.max(1);
        let now = Instant::now();
        let free = (0..size)
            .map(|id| PooledHandle { id, last_used: now })
            .collect();
        Arc::new(Self {
            permits: Arc::new(Semaphore::new(size)),
            free: Mutex::new(free),
            size,
            in_use: AtomicUsize::new(0),
            acquire_timeout,
        })
    }

    /// Acquire a handle, suspending FIFO-fairly until one frees up.
    ///
    /// Returns [`MuninnError::ResourceExhaustion`] if no handle becomes
    /// available within the configured timeout, and
    /// [`MuninnError::Shutdown`] once the pool is closed.
    pub async fn acquire(self: &Arc<Self>) -> Result<PoolGuard> {
        let started = Instant::now();
        let acquired =
            tokio::time::timeout(self.acquire_timeout, self.permits.clone().acquire_owned()).await;
        let permit = match acquired {
            Ok(Ok(permit)) => permit,
            Ok(Err(_closed)) => return Err(MuninnError::Shutdown),
            Err(_elapsed) => {
                metrics::counter!(telemetry::POOL_TIMEOUTS_TOTAL).increment(1);
                return Err(MuninnError::ResourceExhaustion {
                    waited: started.elapsed(),
                });
            }
        };

        // A permit guarantees a free handle exists.
        let handle = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or(MuninnError::Shutdown)?;
        self.in_use.fetch_add(1, Ordering::SeqCst);

        Ok(PoolGuard {
            handle: Some(handle),
            pool: Arc::clone(self),
            _permit: permit,
        })
    }

    /// Total number of handles in the pool.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of handles currently checked out.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::SeqCst)
    }

    /// Close the pool: pending and future `acquire` calls fail with
    /// [`MuninnError::Shutdown`]. Checked-out guards may still drop.
    pub fn close(&self) {
        self.permits.close();
    }
}

/// RAII guard for a checked-out [`PooledHandle`].
///
/// Dropping the guard returns the handle and wakes the longest-waiting
/// acquirer.
pub struct PoolGuard {
    handle: Option<PooledHandle>,
    pool: Arc<ResourcePool>,
    // Released after the handle is back on the free list (field order).
    _permit: OwnedSemaphorePermit,
}

impl PoolGuard {
    /// The handle held by this guard.
    pub fn handle(&self) -> &PooledHandle {
        self.handle.as_ref().expect("guard holds handle until drop")
    }
}

impl fmt::Debug for PoolGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolGuard")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.last_used = Instant::now();
            self.pool
                .free
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(handle);
            self.pool.in_use.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_and_release_roundtrip() {
        let pool = ResourcePool::new(2, Duration::from_secs(1));
        let guard = pool.acquire().await.unwrap();
        assert_eq!(pool.in_use(), 1);
        drop(guard);
        assert_eq!(pool.in_use(), 0);
    }

    #[tokio::test]
    async fn closed_pool_rejects_acquire() {
        let pool = ResourcePool::new(1, Duration::from_secs(1));
        pool.close();
        assert!(matches!(pool.acquire().await, Err(MuninnError::Shutdown)));
    }
}
