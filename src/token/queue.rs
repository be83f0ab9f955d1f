//! Request Queue
//!
//! Parks callers that received a 401 while a refresh was already running so
//! they do not each start their own. Once the refresh resolves, the queue is
//! drained: every parked call is either replayed or rejected, exactly once.

use futures::future::{join_all, BoxFuture};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::core::HttpResponse;
use crate::error::AuthError;

/// Outcome delivered to a queued caller.
pub type QueuedOutcome = Result<HttpResponse, AuthError>;

/// Deferred re-execution of a call.
pub type Replay = Box<dyn FnOnce() -> BoxFuture<'static, QueuedOutcome> + Send>;

struct QueuedCall {
    id: u64,
    replay: Replay,
    settle: oneshot::Sender<QueuedOutcome>,
}

/// FIFO of callers waiting on an in-flight refresh.
#[derive(Default)]
pub struct RequestQueue {
    calls: Mutex<VecDeque<QueuedCall>>,
    next_id: AtomicU64,
}

impl RequestQueue {
    /// Create new empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a call; the returned handle resolves when the queue is drained.
    ///
    /// Dropping the handle cancels the call: it will not be replayed.
    pub fn enqueue(&self, replay: Replay) -> QueuedCallHandle {
        let (settle, receiver) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut calls = self.calls.lock();
        calls.push_back(QueuedCall { id, replay, settle });
        debug!(call_id = id, queued = calls.len(), "Queued call behind in-flight refresh");

        QueuedCallHandle { receiver }
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    /// Replay every queued call in submission order.
    pub async fn drain_on_success(&self) {
        let batch = self.take_all();
        batch.replay_all().await;
    }

    /// Reject every queued call with `error` without replaying any.
    pub fn drain_on_failure(&self, error: AuthError) {
        self.take_all().reject_all(error);
    }

    /// Detach the current contents, leaving the queue empty.
    pub(crate) fn take_all(&self) -> DrainBatch {
        DrainBatch {
            calls: std::mem::take(&mut *self.calls.lock()),
        }
    }
}

/// Calls detached from the queue at the end of a refresh cycle.
pub(crate) struct DrainBatch {
    calls: VecDeque<QueuedCall>,
}

impl DrainBatch {
    pub(crate) fn len(&self) -> usize {
        self.calls.len()
    }

    /// Replay every live call. Replays are started in submission order and
    /// then awaited together, so one slow call does not hold back the rest.
    pub(crate) async fn replay_all(self) {
        let total = self.calls.len();

        let replays: Vec<_> = self
            .calls
            .into_iter()
            .filter_map(|call| {
                if call.settle.is_closed() {
                    trace!(call_id = call.id, "Skipping replay of cancelled call");
                    return None;
                }
                let QueuedCall { replay, settle, .. } = call;
                let pending = replay();
                Some(async move {
                    // Receiver may have gone away while the replay ran.
                    let _ = settle.send(pending.await);
                })
            })
            .collect();

        let replayed = replays.len();
        join_all(replays).await;

        debug!(total, replayed, "Drained queued calls after refresh");
    }

    pub(crate) fn reject_all(self, error: AuthError) {
        let total = self.calls.len();
        for call in self.calls {
            let _ = call.settle.send(Err(error.clone()));
        }
        if total > 0 {
            debug!(total, error_code = error.code(), "Rejected queued calls");
        }
    }
}

/// Future resolving to a queued call's outcome.
pub struct QueuedCallHandle {
    receiver: oneshot::Receiver<QueuedOutcome>,
}

impl Future for QueuedCallHandle {
    type Output = QueuedOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|result| {
            result.unwrap_or_else(|_| {
                Err(AuthError::Unknown {
                    status: None,
                    message: "queued call was dropped without being settled".to_string(),
                })
            })
        })
    }
}
