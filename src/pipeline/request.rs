//! Request and result-handle types for the submission path.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::{MuninnError, Result};

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// What a worker sends back through the request's oneshot channel.
#[derive(Debug)]
pub(crate) struct WorkerReply {
    pub text: String,
}

/// A queued unit of work.
///
/// Owned by the submission path until a worker claims it; the worker
/// resolves (or drops) the reply channel exactly once. During a reload
/// the request may instead sit in the side buffer and be re-enqueued
/// against a fresh pipeline — the caller's handle stays valid throughout.
pub(crate) struct Request {
    pub id: u64,
    /// Whitespace-normalized payload.
    pub payload: String,
    /// Cache key of the normalized payload.
    pub key: u64,
    pub submitted_at: Instant,
    pub reply: oneshot::Sender<Result<WorkerReply>>,
    pub cancelled: Arc<AtomicBool>,
    /// Whether submission counters were already applied for this request
    /// (drained requests are re-enqueued without double counting).
    pub counted: bool,
}

impl Request {
    pub fn new(payload: String, key: u64) -> (Self, RequestHandle) {
        let id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
        let cancelled = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel();
        let request = Self {
            id,
            payload,
            key,
            submitted_at: Instant::now(),
            reply: tx,
            cancelled: Arc::clone(&cancelled),
            counted: false,
        };
        let handle = RequestHandle {
            id,
            cancelled,
            inner: HandleInner::Pending(rx),
        };
        (request, handle)
    }
}

enum HandleInner {
    /// Resolved at submission time (cache hit).
    Ready(String),
    /// Waiting on a worker.
    Pending(oneshot::Receiver<Result<WorkerReply>>),
}

/// The resolved result of a single request.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    /// Response text.
    pub text: String,
    /// Whether the response came straight from the cache at submission.
    pub cache_hit: bool,
}

/// Caller-side handle for a submitted request.
///
/// Await the result with [`wait`](Self::wait), or [`cancel`](Self::cancel)
/// at any time. Cancelling before a worker claims the request discards it
/// with no side effects; cancelling afterwards is best-effort — the
/// backend call is not interrupted, its result is simply discarded.
pub struct RequestHandle {
    id: u64,
    cancelled: Arc<AtomicBool>,
    inner: HandleInner,
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl RequestHandle {
    pub(crate) fn ready(text: String) -> Self {
        Self {
            id: NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed),
            cancelled: Arc::new(AtomicBool::new(false)),
            inner: HandleInner::Ready(text),
        }
    }

    /// Unique request id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Request that this work be abandoned.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Await the request's resolution.
    pub async fn wait(self) -> Result<RequestOutcome> {
        match self.inner {
            HandleInner::Ready(text) => {
                if self.cancelled.load(Ordering::SeqCst) {
                    return Err(MuninnError::Cancelled);
                }
                Ok(RequestOutcome {
                    text,
                    cache_hit: true,
                })
            }
            HandleInner::Pending(rx) => match rx.await {
                Ok(Ok(reply)) => {
                    if self.cancelled.load(Ordering::SeqCst) {
                        return Err(MuninnError::Cancelled);
                    }
                    Ok(RequestOutcome {
                        text: reply.text,
                        cache_hit: false,
                    })
                }
                Ok(Err(e)) => Err(e),
                // Sender dropped: either the request was discarded after
                // cancellation, or the system went away beneath it.
                Err(_) => {
                    if self.cancelled.load(Ordering::SeqCst) {
                        Err(MuninnError::Cancelled)
                    } else {
                        Err(MuninnError::Shutdown)
                    }
                }
            },
        }
    }
}
