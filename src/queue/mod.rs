//! Priority task queue (§4.5): single worker, priority-ordered, FIFO within
//! equal priority.
//!
//! Uses the standard `tokio_util::CancellationToken` + `tokio::select!`
//! idiom for a cancellable background loop, generalized into a single-worker
//! consumer of a priority heap rather than a fixed subscription loop.
//! Block-task priority is `MAX - blockNumber` (§4.4.2), so lower block
//! numbers dequeue first.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::AppError;

/// Priority assigned to the newest/most urgent task. Block priorities are
/// computed as `MAX - blockNumber` so that the numerically smallest block
/// number sorts highest (§4.4.2).
pub const MAX_PRIORITY: u64 = u64::MAX;

/// Outcome of running a queued task: success, or failure carrying back the
/// error and the task itself so the `onError` hook can inspect or re-enqueue
/// it per the host's retry policy (§5 "retry must therefore be safe to
/// re-run").
pub type WorkerResult<T> = std::result::Result<(), (AppError, T)>;

struct Entry<T> {
    priority: u64,
    seq: u64,
    task: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: higher priority dequeues first. Within
        // equal priority, the lower sequence number (inserted earlier) must
        // win, so its comparison is reversed (§4.5 "FIFO within priority").
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A single-worker, priority-ordered task queue (§4.5).
pub struct PriorityTaskQueue<T> {
    heap: Arc<Mutex<BinaryHeap<Entry<T>>>>,
    next_seq: Arc<AtomicU64>,
    paused: Arc<AtomicBool>,
    in_flight: Arc<AtomicBool>,
    notify_added: Arc<Notify>,
    notify_resumed: Arc<Notify>,
    notify_idle: Arc<Notify>,
    shutdown: CancellationToken,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<T> std::fmt::Debug for PriorityTaskQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorityTaskQueue")
            .field("paused", &self.paused.load(AtomicOrdering::SeqCst))
            .field("in_flight", &self.in_flight.load(AtomicOrdering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> PriorityTaskQueue<T> {
    /// Construct an empty, unstarted queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap: Arc::new(Mutex::new(BinaryHeap::new())),
            next_seq: Arc::new(AtomicU64::new(0)),
            paused: Arc::new(AtomicBool::new(true)),
            in_flight: Arc::new(AtomicBool::new(false)),
            notify_added: Arc::new(Notify::new()),
            notify_resumed: Arc::new(Notify::new()),
            notify_idle: Arc::new(Notify::new()),
            shutdown: CancellationToken::new(),
            worker_handle: Mutex::new(None),
        }
    }

    /// Enqueue `task` with the given `priority`. Higher priority dequeues
    /// first; equal priorities preserve insertion order.
    pub async fn add_task(&self, task: T, priority: u64) {
        let seq = self.next_seq.fetch_add(1, AtomicOrdering::SeqCst);
        self.heap.lock().await.push(Entry { priority, seq, task });
        self.notify_added.notify_one();
    }

    /// Number of tasks currently queued (not counting one in flight).
    pub async fn size(&self) -> usize {
        self.heap.lock().await.len()
    }

    /// Remove every queued task without running it. Does not affect a task
    /// already in flight (§5 "an in-flight task is not preempted").
    pub async fn clear(&self) {
        self.heap.lock().await.clear();
    }

    /// Pause dequeuing. The worker finishes any in-flight task, then blocks
    /// until [`PriorityTaskQueue::start`] is called again (reusing `start`
    /// also un-pauses, keeping a single entry point for resuming work).
    pub fn pause(&self) {
        self.paused.store(true, AtomicOrdering::SeqCst);
    }

    /// Resolve once the queue is empty and no task is in flight. If already
    /// idle, resolves immediately on the next poll.
    pub async fn on_idle(&self) {
        loop {
            if self.heap.lock().await.is_empty() && !self.in_flight.load(AtomicOrdering::SeqCst) {
                return;
            }
            self.notify_idle.notified().await;
        }
    }

    /// Start (or resume) the single worker loop. `worker` processes one
    /// task to completion before the next is dequeued (§4.4 "worker is
    /// strictly sequential"). `on_error` is invoked whenever `worker`
    /// returns `Err`; it does not by itself requeue the task.
    pub fn start<W, E>(&self, worker: W, on_error: E)
    where
        W: Fn(T) -> Pin<Box<dyn Future<Output = WorkerResult<T>> + Send>> + Send + Sync + 'static,
        E: Fn(&AppError) + Send + Sync + 'static,
    {
        self.paused.store(false, AtomicOrdering::SeqCst);
        self.notify_resumed.notify_waiters();

        let mut handle_slot = self.worker_handle.try_lock();
        if let Ok(ref mut slot) = handle_slot {
            if slot.as_ref().is_some_and(|h| !h.is_finished()) {
                // Already running; resuming from pause is enough.
                return;
            }
        } else {
            return;
        }

        let heap = Arc::clone(&self.heap);
        let paused = Arc::clone(&self.paused);
        let in_flight = Arc::clone(&self.in_flight);
        let notify_added = Arc::clone(&self.notify_added);
        let notify_resumed = Arc::clone(&self.notify_resumed);
        let notify_idle = Arc::clone(&self.notify_idle);
        let shutdown = self.shutdown.clone();
        let worker = Arc::new(worker);
        let on_error = Arc::new(on_error);

        let join = tokio::spawn(async move {
            loop {
                if shutdown.is_cancelled() {
                    return;
                }
                if paused.load(AtomicOrdering::SeqCst) {
                    tokio::select! {
                        () = shutdown.cancelled() => return,
                        () = notify_resumed.notified() => {}
                    }
                    continue;
                }

                let next = heap.lock().await.pop();
                let Some(entry) = next else {
                    notify_idle.notify_waiters();
                    tokio::select! {
                        () = shutdown.cancelled() => return,
                        () = notify_added.notified() => {}
                    }
                    continue;
                };

                in_flight.store(true, AtomicOrdering::SeqCst);
                let result = worker(entry.task).await;
                in_flight.store(false, AtomicOrdering::SeqCst);

                if let Err((err, _task)) = result {
                    warn!(error = %err, "task worker failed");
                    on_error(&err);
                }
                notify_idle.notify_waiters();
            }
        });

        if let Ok(mut slot) = self.worker_handle.try_lock() {
            *slot = Some(join);
        }
    }

    /// Stop the worker loop permanently. Outside the §4.5 minimal queue
    /// contract (`addTask,start,pause,clear,size,onIdle,onError`); reserved
    /// for process exit, not part of `RealtimeSyncService::kill()` (which
    /// uses `pause`/`clear` per §4.4). Does not itself clear pending tasks.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl<T: Send + 'static> Default for PriorityTaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::error::{AppError, DomainError};

    #[tokio::test]
    async fn tasks_run_in_priority_order() {
        let queue: PriorityTaskQueue<u64> = PriorityTaskQueue::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        queue.add_task(30, MAX_PRIORITY - 30).await;
        queue.add_task(10, MAX_PRIORITY - 10).await;
        queue.add_task(20, MAX_PRIORITY - 20).await;

        queue.start(
            move |n: u64| {
                let tx = tx.clone();
                Box::pin(async move {
                    tx.send(n).unwrap();
                    Ok(())
                })
            },
            |_err| {},
        );

        queue.on_idle().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut seen = Vec::new();
        while let Ok(n) = rx.try_recv() {
            seen.push(n);
        }
        assert_eq!(seen, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn equal_priority_preserves_fifo_order() {
        let queue: PriorityTaskQueue<u64> = PriorityTaskQueue::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        for n in [1, 2, 3] {
            queue.add_task(n, 5).await;
        }

        queue.start(
            move |n: u64| {
                let tx = tx.clone();
                Box::pin(async move {
                    tx.send(n).unwrap();
                    Ok(())
                })
            },
            |_err| {},
        );

        queue.on_idle().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut seen = Vec::new();
        while let Ok(n) = rx.try_recv() {
            seen.push(n);
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn on_error_hook_invoked_without_stalling_the_worker() {
        let queue: PriorityTaskQueue<u64> = PriorityTaskQueue::new();
        let errors = Arc::new(AtomicUsize::new(0));
        let errors_clone = Arc::clone(&errors);
        let (tx, mut rx) = mpsc::unbounded_channel();

        queue.add_task(1, 10).await;
        queue.add_task(2, 9).await;

        queue.start(
            move |n: u64| {
                let tx = tx.clone();
                Box::pin(async move {
                    if n == 1 {
                        Err((
                            AppError::Domain(DomainError::LocalChainInvariantViolated(
                                "boom".into(),
                            )),
                            n,
                        ))
                    } else {
                        tx.send(n).unwrap();
                        Ok(())
                    }
                })
            },
            move |_err| {
                errors_clone.fetch_add(1, AtomicOrdering::SeqCst);
            },
        );

        queue.on_idle().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(errors.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(rx.try_recv(), Ok(2));
    }

    #[tokio::test]
    async fn clear_drops_queued_tasks() {
        let queue: PriorityTaskQueue<u64> = PriorityTaskQueue::new();
        queue.add_task(1, 1).await;
        queue.add_task(2, 2).await;
        assert_eq!(queue.size().await, 2);
        queue.clear().await;
        assert_eq!(queue.size().await, 0);
    }

    #[test]
    fn queue_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PriorityTaskQueue<u64>>();
    }
}
