//! The query router: owns the bin table and the routing policy.
//!
//! Every incoming query is embedded, scanned against the representative
//! vector of each existing bin under a read lock, and placed by a three-way
//! decision: join the best-matching bin when its similarity clears the
//! grouping threshold, open a new bin when it does not and the cap allows,
//! or fall back to the best match once the cap is reached.
//!
//! Representatives are fixed at bin creation. Keeping them immutable keeps
//! the similarity scan stable under concurrency and means the table only
//! ever takes a write lock to append. The scan is O(max_bins * dim) per
//! submission, which is trivially cheap at the default cap of 100 bins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;

use querylane_core::config::{BatchConfig, RouterConfig};
use querylane_core::error::{LaneError, LaneResult};
use querylane_core::similarity::{cosine_similarity, normalize};
use querylane_core::traits::{Embedder, LlmClient, VectorStore};

use crate::bin::Bin;
use crate::query::Query;

/// Fallback bin cap when the configured value is zero.
const DEFAULT_MAX_BINS: usize = 100;

/// Bins and their representative vectors, index-aligned.
#[derive(Default)]
struct BinTable {
    bins: Vec<Arc<Bin>>,
    vectors: Vec<Vec<f32>>,
}

impl BinTable {
    /// Index and similarity of the best-matching bin.
    ///
    /// First match wins ties, so selection is deterministic for a fixed
    /// bin order. Callers must ensure the table is non-empty.
    fn best_match(&self, embedding: &[f32]) -> (usize, f32) {
        let mut best_idx = 0;
        let mut best_sim = -1.0f32;
        for (idx, vector) in self.vectors.iter().enumerate() {
            let sim = cosine_similarity(embedding, vector);
            if sim > best_sim {
                best_sim = sim;
                best_idx = idx;
            }
        }
        (best_idx, best_sim)
    }
}

/// Snapshot of the router's shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouterStats {
    pub num_bins: usize,
    pub grouping_threshold: f32,
    pub max_bins: usize,
}

/// Routes queries to bins by embedding similarity.
///
/// Collaborators are injected at construction and shared with every bin.
/// The router starts with an empty table; the first query's embedding
/// becomes bin 0's representative.
pub struct Router {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    llm: Option<Arc<dyn LlmClient>>,
    table: RwLock<BinTable>,
    grouping_threshold: f32,
    max_bins: usize,
    batch: BatchConfig,
    closed: AtomicBool,
}

impl Router {
    /// Create a router.
    ///
    /// A `max_bins` of zero falls back to 100.
    ///
    /// # Errors
    /// `LaneError::Config` when the configuration is invalid.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        llm: Option<Arc<dyn LlmClient>>,
        config: RouterConfig,
    ) -> LaneResult<Self> {
        config.validate()?;

        let max_bins = if config.max_bins == 0 {
            DEFAULT_MAX_BINS
        } else {
            config.max_bins
        };

        tracing::info!(
            grouping_threshold = config.grouping_threshold,
            max_bins,
            "router initialized"
        );

        Ok(Self {
            embedder,
            store,
            llm,
            table: RwLock::new(BinTable::default()),
            grouping_threshold: config.grouping_threshold,
            max_bins,
            batch: config.batch,
            closed: AtomicBool::new(false),
        })
    }

    /// Seed the table with one bin whose representative is a random unit
    /// vector, instead of waiting for the first query.
    ///
    /// The lazy first-query policy usually produces a more meaningful
    /// centroid; seeding exists for workloads that want a single catch-all
    /// bin up front. No-op if the table is not empty.
    pub fn seed_random_bin(&self, dim: usize) {
        use rand::Rng;

        let mut table = self.table.write();
        if !table.bins.is_empty() {
            return;
        }

        let mut rng = rand::thread_rng();
        let mut vector: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
        normalize(&mut vector);

        let bin = Bin::spawn(Arc::clone(&self.store), self.llm.clone(), self.batch.clone());
        table.vectors.push(vector);
        table.bins.push(bin);
        tracing::info!("seeded bin 0 with a random representative");
    }

    /// Process a query and return its result.
    ///
    /// Embeds the text, routes it to a bin, and waits for the batched
    /// downstream call to deliver. Dropping the returned future abandons
    /// the wait but not the query: it still flushes with its batch and the
    /// delivery is discarded.
    ///
    /// # Errors
    /// - `LaneError::EmbeddingUnavailable` when embedding fails
    /// - `LaneError::BinClosed` when the router is shut down
    /// - whatever the batch delivered (`DownstreamFailure`, `MissingResult`)
    pub async fn query(&self, text: &str) -> LaneResult<String> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LaneError::BinClosed);
        }

        let (query, ticket) = Query::embed(self.embedder.as_ref(), text).await?;
        self.dispatch(query)?;
        ticket.wait().await
    }

    /// [`query`](Self::query) bounded by a deadline.
    ///
    /// # Errors
    /// `LaneError::DeadlineExceeded` when the deadline fires first.
    pub async fn query_with_deadline(
        &self,
        text: &str,
        deadline: Duration,
    ) -> LaneResult<String> {
        match tokio::time::timeout(deadline, self.query(text)).await {
            Ok(result) => result,
            Err(_) => Err(LaneError::DeadlineExceeded),
        }
    }

    /// Snapshot of the router's shape.
    #[must_use]
    pub fn stats(&self) -> RouterStats {
        RouterStats {
            num_bins: self.table.read().bins.len(),
            grouping_threshold: self.grouping_threshold,
            max_bins: self.max_bins,
        }
    }

    /// Shut every bin down in order, draining buffered queries.
    ///
    /// Later bins are still shut down after a failure; the first error is
    /// returned. New submissions fail with `BinClosed` from the moment this
    /// is called.
    ///
    /// # Errors
    /// `LaneError::DeadlineExceeded` when a bin's worker does not drain in
    /// time.
    pub async fn close(&self, deadline: Duration) -> LaneResult<()> {
        self.closed.store(true, Ordering::SeqCst);

        let bins: Vec<Arc<Bin>> = self.table.read().bins.clone();
        tracing::info!(bins = bins.len(), "shutting down bins");

        let closing_until = tokio::time::Instant::now() + deadline;
        let mut first_err = None;

        for (idx, bin) in bins.iter().enumerate() {
            let remaining = closing_until
                .saturating_duration_since(tokio::time::Instant::now());
            if let Err(err) = bin.shutdown(remaining).await {
                tracing::warn!(bin = idx, error = %err, "bin shutdown failed");
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }

        match first_err {
            None => {
                tracing::info!("all bins shut down");
                Ok(())
            }
            Some(err) => Err(err),
        }
    }

    /// Route a query to its bin.
    ///
    /// Never blocks and never holds a table lock across a remote call:
    /// `Bin::submit` is non-blocking by contract.
    fn dispatch(&self, query: Query) -> LaneResult<()> {
        let num_bins = self.table.read().bins.len();
        if num_bins == 0 {
            tracing::debug!(text = query.text(), "no bins exist, creating the first");
            return self.submit_to_new_bin(query);
        }

        let (best_idx, best_sim, can_create, best_bin) = {
            let table = self.table.read();
            let (idx, sim) = table.best_match(query.embedding());
            (
                idx,
                sim,
                table.bins.len() < self.max_bins,
                Arc::clone(&table.bins[idx]),
            )
        };

        if best_sim >= self.grouping_threshold {
            tracing::debug!(
                text = query.text(),
                bin = best_idx,
                similarity = best_sim,
                "assigned to existing bin"
            );
            best_bin.submit(query)
        } else if can_create {
            tracing::debug!(
                text = query.text(),
                similarity = best_sim,
                threshold = self.grouping_threshold,
                "below threshold, creating new bin"
            );
            self.submit_to_new_bin(query)
        } else {
            tracing::debug!(
                text = query.text(),
                bin = best_idx,
                similarity = best_sim,
                max_bins = self.max_bins,
                "bin cap reached, assigning to closest bin"
            );
            best_bin.submit(query)
        }
    }

    /// Append a bin whose representative is this query's embedding, then
    /// submit the query to it.
    ///
    /// Re-checks the cap under the write lock: a racing creator may have
    /// filled the table, in which case the query falls back to the best
    /// existing match.
    fn submit_to_new_bin(&self, query: Query) -> LaneResult<()> {
        let bin = {
            let mut table = self.table.write();

            if !table.bins.is_empty() && table.bins.len() >= self.max_bins {
                let (idx, _) = table.best_match(query.embedding());
                let bin = Arc::clone(&table.bins[idx]);
                drop(table);
                return bin.submit(query);
            }

            let mut representative = query.embedding().to_vec();
            normalize(&mut representative);

            let bin = Bin::spawn(Arc::clone(&self.store), self.llm.clone(), self.batch.clone());
            table.vectors.push(representative);
            table.bins.push(Arc::clone(&bin));
            debug_assert_eq!(table.bins.len(), table.vectors.len());

            tracing::info!(bin = table.bins.len() - 1, total = table.bins.len(), "created bin");
            bin
        };

        bin.submit(query)
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("Router")
            .field("num_bins", &stats.num_bins)
            .field("grouping_threshold", &stats.grouping_threshold)
            .field("max_bins", &stats.max_bins)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}
