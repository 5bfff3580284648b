//! A bin: a buffered queue of similar queries and the worker that flushes
//! them as one downstream access window.
//!
//! # Worker state machine
//!
//! The worker is a single long-lived task that interleaves three states in
//! one loop: idle (queue empty, timer armed), accumulating (queue non-empty,
//! timer armed), and flushing (queue swapped out, downstream call in
//! flight). Three events wake it:
//!
//! - the shutdown latch, which always wins and triggers a final drain
//! - the coalescing flush signal, raised when the queue reaches
//!   `max_batch_size` (or `max_batch_size` drops below the queue length)
//! - the wait timer, so no query waits longer than `max_wait`
//!
//! A fourth event, the rearm signal, wakes the worker to re-read a changed
//! `max_wait` without flushing anything.
//!
//! The timer re-arms after every flush regardless of which event fired.
//! At most one flush is in progress per bin; new submissions land in the
//! fresh queue while a flush is in flight. The queue mutex is held only for
//! enqueue, swap-out, and threshold reads, never across a remote call.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use querylane_core::config::BatchConfig;
use querylane_core::error::{LaneError, LaneResult};
use querylane_core::traits::{LlmClient, VectorStore};
use querylane_core::types::SearchResponse;

use crate::query::Query;

// ============================================================================
// STATS
// ============================================================================

/// Per-bin counters, updated concurrently by submitters and the worker.
#[derive(Debug, Default)]
struct BinStats {
    submitted: AtomicU64,
    batches_flushed: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    batch_size_sum: AtomicU64,
}

impl BinStats {
    fn snapshot(&self) -> BinStatsSnapshot {
        let batches = self.batches_flushed.load(Ordering::Relaxed);
        let size_sum = self.batch_size_sum.load(Ordering::Relaxed);
        BinStatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            batches_flushed: batches,
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            avg_batch_size: if batches > 0 {
                size_sum as f64 / batches as f64
            } else {
                0.0
            },
        }
    }
}

/// Non-atomic copy of a bin's counters, for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinStatsSnapshot {
    pub submitted: u64,
    pub batches_flushed: u64,
    pub delivered: u64,
    pub failed: u64,
    pub avg_batch_size: f64,
}

// ============================================================================
// BIN
// ============================================================================

/// A buffer + worker pair batching semantically similar queries.
pub struct Bin {
    store: Arc<dyn VectorStore>,
    llm: Option<Arc<dyn LlmClient>>,
    queue: Mutex<Vec<Query>>,
    max_batch_size: AtomicUsize,
    max_wait_ms: AtomicU64,
    top_k: u32,
    flush_signal: Notify,
    rearm_signal: Notify,
    shutdown_signal: Notify,
    shutting_down: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
    stats: BinStats,
}

impl Bin {
    /// Create a bin and start its worker task.
    ///
    /// Must be called within a tokio runtime. The worker keeps the bin
    /// alive until [`shutdown`](Self::shutdown) drains it.
    pub fn spawn(
        store: Arc<dyn VectorStore>,
        llm: Option<Arc<dyn LlmClient>>,
        config: BatchConfig,
    ) -> Arc<Self> {
        let bin = Arc::new(Self {
            store,
            llm,
            queue: Mutex::new(Vec::with_capacity(config.max_batch_size)),
            max_batch_size: AtomicUsize::new(config.max_batch_size),
            max_wait_ms: AtomicU64::new(config.max_wait.as_millis() as u64),
            top_k: config.top_k,
            flush_signal: Notify::new(),
            rearm_signal: Notify::new(),
            shutdown_signal: Notify::new(),
            shutting_down: AtomicBool::new(false),
            worker: Mutex::new(None),
            stats: BinStats::default(),
        });

        let handle = tokio::spawn(worker_loop(Arc::clone(&bin)));
        *bin.worker.lock() = Some(handle);
        bin
    }

    /// Append a query to the queue.
    ///
    /// Non-blocking. Signals the worker when the queue reaches
    /// `max_batch_size`.
    ///
    /// # Errors
    /// `LaneError::BinClosed` once shutdown has begun.
    pub fn submit(&self, query: Query) -> LaneResult<()> {
        let queue_len = {
            let mut queue = self.queue.lock();
            if self.shutting_down.load(Ordering::SeqCst) {
                return Err(LaneError::BinClosed);
            }
            queue.push(query);
            queue.len()
        };

        self.stats.submitted.fetch_add(1, Ordering::Relaxed);

        if queue_len >= self.max_batch_size.load(Ordering::SeqCst) {
            self.flush_signal.notify_one();
        }
        Ok(())
    }

    /// Update the size threshold.
    ///
    /// Takes effect for subsequent reads; if the queue already holds at
    /// least `size` queries, a flush is signalled immediately. The wait
    /// timer re-arms in the worker's normal flush epilogue.
    pub fn set_batch_size(&self, size: usize) {
        if size == 0 {
            tracing::warn!("ignoring max_batch_size of 0");
            return;
        }
        self.max_batch_size.store(size, Ordering::SeqCst);

        if self.queue.lock().len() >= size {
            self.flush_signal.notify_one();
        }
    }

    /// Update the wait threshold.
    ///
    /// Wakes the worker so the timer re-arms with the new duration.
    /// Buffered queries are not flushed; they wait for the next size,
    /// timer, or shutdown trigger.
    pub fn set_wait_time(&self, wait: Duration) {
        if wait.is_zero() {
            tracing::warn!("ignoring max_wait of 0");
            return;
        }
        self.max_wait_ms
            .store(wait.as_millis() as u64, Ordering::SeqCst);
        self.rearm_signal.notify_one();
    }

    /// Gracefully shut the bin down.
    ///
    /// No further submissions are admitted; the worker drains the queue in
    /// one final flush and exits. Idempotent.
    ///
    /// # Errors
    /// `LaneError::DeadlineExceeded` if the worker has not exited within
    /// `wait`. The worker keeps draining in the background; a later call
    /// can wait for it again.
    pub async fn shutdown(&self, wait: Duration) -> LaneResult<()> {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.shutdown_signal.notify_one();

        let Some(mut handle) = self.worker.lock().take() else {
            return Ok(());
        };

        match tokio::time::timeout(wait, &mut handle).await {
            Ok(_) => Ok(()),
            Err(_) => {
                *self.worker.lock() = Some(handle);
                Err(LaneError::DeadlineExceeded)
            }
        }
    }

    /// Whether shutdown has begun.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Number of buffered queries.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Snapshot of the bin's counters.
    #[must_use]
    pub fn stats(&self) -> BinStatsSnapshot {
        self.stats.snapshot()
    }

    fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms.load(Ordering::SeqCst))
    }

    /// Take the current queue and run one downstream batch.
    ///
    /// A no-op when the queue is empty. Results are delivered in the
    /// insertion order of the batch; a failed downstream call fails the
    /// whole batch. The extracted batch sits in a [`BatchGuard`] so that an
    /// unwind mid-flush still fails every undelivered query.
    async fn flush(&self) {
        let batch = {
            let mut queue = self.queue.lock();
            if queue.is_empty() {
                return;
            }
            let capacity = self.max_batch_size.load(Ordering::SeqCst);
            std::mem::replace(&mut *queue, Vec::with_capacity(capacity))
        };

        let batch_len = batch.len();
        tracing::debug!(batch = batch_len, "flushing bin");

        let embeddings: Vec<Vec<f32>> = batch.iter().map(|q| q.embedding().to_vec()).collect();
        let mut batch = BatchGuard::new(batch);

        match self.store.query_batch(&embeddings, self.top_k).await {
            Ok(responses) => {
                let mut responses = responses.into_iter();
                while let Some(query) = batch.front() {
                    let result = match responses.next() {
                        Some(response) => self.render(query.text(), response).await,
                        None => Err(LaneError::MissingResult),
                    };
                    if result.is_ok() {
                        self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                    } else {
                        self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    }
                    if let Some(query) = batch.pop() {
                        query.deliver(result);
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, batch = batch_len, "downstream batch failed");
                self.stats
                    .failed
                    .fetch_add(batch_len as u64, Ordering::Relaxed);
                while let Some(query) = batch.pop() {
                    query.deliver(Err(err.clone()));
                }
            }
        }

        self.stats.batches_flushed.fetch_add(1, Ordering::Relaxed);
        self.stats
            .batch_size_sum
            .fetch_add(batch_len as u64, Ordering::Relaxed);
    }

    /// Turn one query's search response into the caller-visible result.
    ///
    /// With an LLM attached, retrieved chunk texts become the context of a
    /// completion prompt; otherwise the raw match payload is returned.
    async fn render(&self, question: &str, response: SearchResponse) -> LaneResult<String> {
        match &self.llm {
            Some(llm) => {
                let mut context = String::new();
                for m in &response.matches {
                    if let Some(chunk) = m.text() {
                        context.push_str(chunk);
                        context.push_str("\n\n");
                    }
                }
                let prompt = format!(
                    "Answer the question using only the provided context.\n\n\
                     Context:\n{context}\n\
                     Question: {question}\n\
                     Answer:"
                );
                llm.complete(&prompt).await
            }
            None => serde_json::to_string(&response.matches).map_err(LaneError::downstream),
        }
    }

    /// Fail every buffered query and refuse further submissions.
    ///
    /// Last resort when the worker cannot continue.
    fn fail_pending(&self, err: LaneError) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let stranded = std::mem::take(&mut *self.queue.lock());
        self.stats
            .failed
            .fetch_add(stranded.len() as u64, Ordering::Relaxed);
        for query in stranded {
            query.deliver(Err(err.clone()));
        }
    }
}

/// Owns a batch while its flush is in flight.
///
/// Queries are popped out one at a time as their results are delivered.
/// If the flush unwinds instead, the drop delivers `DownstreamFailure` to
/// every query still inside, so no completion slot dies unsent.
struct BatchGuard {
    queries: VecDeque<Query>,
}

impl BatchGuard {
    fn new(queries: Vec<Query>) -> Self {
        Self {
            queries: queries.into(),
        }
    }

    fn front(&self) -> Option<&Query> {
        self.queries.front()
    }

    fn pop(&mut self) -> Option<Query> {
        self.queries.pop_front()
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        for query in self.queries.drain(..) {
            query.deliver(Err(LaneError::DownstreamFailure {
                message: "bin worker aborted".to_string(),
            }));
        }
    }
}

impl std::fmt::Debug for Bin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bin")
            .field("queue_len", &self.queue_len())
            .field("max_batch_size", &self.max_batch_size.load(Ordering::SeqCst))
            .field("max_wait_ms", &self.max_wait_ms.load(Ordering::SeqCst))
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// What woke the worker. Timer expiry and the flush signal are equivalent
/// triggers, so both map to `Flush`.
enum WakeEvent {
    Shutdown,
    Flush,
    Rearm,
}

/// The bin's single worker task.
///
/// Shutdown takes priority over the other events and always performs a
/// final drain; a rearm wake only restarts the timer with the current
/// `max_wait`. A panicking flush (a buggy collaborator) is caught: the
/// in-flight batch fails through its guard, everything still queued fails
/// with `DownstreamFailure`, and the bin closes instead of stranding its
/// queue.
async fn worker_loop(bin: Arc<Bin>) {
    loop {
        let wait = bin.max_wait();

        let event = tokio::select! {
            biased;
            _ = bin.shutdown_signal.notified() => WakeEvent::Shutdown,
            _ = bin.flush_signal.notified() => WakeEvent::Flush,
            _ = bin.rearm_signal.notified() => WakeEvent::Rearm,
            _ = tokio::time::sleep(wait) => WakeEvent::Flush,
        };

        if matches!(event, WakeEvent::Rearm) {
            continue;
        }

        let flushed = std::panic::AssertUnwindSafe(bin.flush())
            .catch_unwind()
            .await;

        if flushed.is_err() {
            tracing::error!("bin flush panicked; failing pending queries and closing");
            bin.fail_pending(LaneError::DownstreamFailure {
                message: "bin worker aborted".to_string(),
            });
            return;
        }

        if matches!(event, WakeEvent::Shutdown) {
            tracing::debug!("bin worker drained and exiting");
            return;
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
