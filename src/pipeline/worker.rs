//! Worker loop: dequeue → process → resolve.
//!
//! Workers share the bounded queue's receiver behind an async mutex and
//! claim requests one at a time. Every processing step runs inside a
//! failure boundary: an error acquiring a handle, calling the backend,
//! or writing the cache resolves that one request with the error — the
//! worker itself keeps serving. Workers carry no per-request state
//! between iterations.
//!
//! A worker that hangs indefinitely inside a backend call is a known
//! limitation; there is no per-worker supervision beyond the per-request
//! boundary.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::Result;

use super::request::{Request, WorkerReply};
use super::PipelineShared;

pub(crate) type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<Request>>>;

pub(crate) async fn run_worker(
    worker_id: usize,
    shared: Arc<PipelineShared>,
    queue: SharedReceiver,
    mut stop: watch::Receiver<bool>,
) {
    debug!(worker_id, "worker started");
    loop {
        // Claim the next request, unless the stop signal wins the race —
        // after a stop no further dequeues happen on this queue.
        let claimed = {
            let mut rx = queue.lock().await;
            tokio::select! {
                biased;
                _ = stop.changed() => None,
                request = rx.recv() => request,
            }
        };
        let Some(request) = claimed else { break };
        debug!(
            request_id = request.id,
            queued_ms = request.submitted_at.elapsed().as_millis() as u64,
            "request claimed"
        );

        if request.cancelled.load(Ordering::SeqCst) {
            debug!(request_id = request.id, "cancelled before claim; discarding");
            continue;
        }

        shared.stats.worker_started();
        let result = process_one(&shared, &request).await;
        shared.stats.worker_finished();

        // Send fails if the caller cancelled or went away; the result is
        // simply discarded in that case.
        let _ = request.reply.send(result.map(|text| WorkerReply { text }));
    }
    debug!(worker_id, "worker stopped");
}

/// Process a single claimed request.
///
/// cache re-check → pool acquire → knowledge search → backend call →
/// cache write. At most one cache write happens per request.
async fn process_one(shared: &Arc<PipelineShared>, request: &Request) -> Result<String> {
    // A duplicate payload may have been computed while this one queued.
    if let Some(text) = shared.cache.get(request.key) {
        return Ok(text);
    }

    let _handle = shared.pool.acquire().await?;

    let mut context = Vec::new();
    for source in &shared.knowledge {
        match source.search(&request.payload).await {
            Ok(mut facts) => context.append(&mut facts),
            // Lookup failures contribute zero facts, never fail the request.
            Err(e) => debug!(
                source = source.name(),
                error = %e,
                "knowledge lookup failed; treating as empty"
            ),
        }
    }

    let text = shared.backend.generate(&request.payload, &context).await?;
    shared.cache.put(request.key, text.clone());
    Ok(text)
}
