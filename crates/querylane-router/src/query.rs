//! A single retrieval query and its completion slot.
//!
//! Each query carries its text, its embedding, and the write end of a
//! one-shot channel. The submitter keeps the read end as a [`QueryTicket`].
//! Delivery is non-blocking and first-write-wins: the bin worker publishing
//! a result can never block on a slow reader, and a reader that went away
//! simply never observes the result.

use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use uuid::Uuid;

use querylane_core::error::{LaneError, LaneResult};
use querylane_core::traits::Embedder;

/// A query buffered inside a bin, awaiting a batched downstream call.
#[derive(Debug)]
pub struct Query {
    id: Uuid,
    text: String,
    embedding: Vec<f32>,
    submitted_at: Instant,
    completion: oneshot::Sender<LaneResult<String>>,
}

/// The read end of a query's completion slot.
///
/// Single-consumer: `wait` takes `self`. Dropping the ticket silently
/// discards whatever result is later delivered.
#[derive(Debug)]
pub struct QueryTicket {
    receiver: oneshot::Receiver<LaneResult<String>>,
}

impl Query {
    /// Create a query with a caller-provided embedding.
    ///
    /// The caller asserts the embedding matches the dimension of the bin
    /// representatives it will be compared against.
    #[must_use]
    pub fn new(text: impl Into<String>, embedding: Vec<f32>) -> (Self, QueryTicket) {
        let (tx, rx) = oneshot::channel();
        let query = Self {
            id: Uuid::new_v4(),
            text: text.into(),
            embedding,
            submitted_at: Instant::now(),
            completion: tx,
        };
        (query, QueryTicket { receiver: rx })
    }

    /// Create a query by embedding `text` through the collaborator.
    ///
    /// # Errors
    /// `LaneError::EmbeddingUnavailable` when the embedding call fails.
    pub async fn embed(embedder: &dyn Embedder, text: &str) -> LaneResult<(Self, QueryTicket)> {
        let embedding = embedder.embed(text).await?;
        Ok(Self::new(text, embedding))
    }

    /// Query id, for tracing.
    #[inline]
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The query text.
    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The embedding vector.
    #[inline]
    #[must_use]
    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    /// Time since the query was created.
    #[inline]
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.submitted_at.elapsed()
    }

    /// Publish the result into the completion slot.
    ///
    /// Non-blocking. Consumes the query, so only one delivery can ever
    /// happen; a dropped ticket makes the send a silent no-op.
    pub fn deliver(self, result: LaneResult<String>) {
        let _ = self.completion.send(result);
    }
}

impl QueryTicket {
    /// Wait for the result.
    ///
    /// # Errors
    /// `LaneError::Cancelled` if the query was dropped without a delivery,
    /// which only happens when its bin worker is gone.
    pub async fn wait(self) -> LaneResult<String> {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(LaneError::Cancelled),
        }
    }

    /// Wait for the result, giving up after `deadline`.
    ///
    /// Giving up abandons the wait only; the query stays in its bin and the
    /// eventual delivery is discarded.
    ///
    /// # Errors
    /// `LaneError::DeadlineExceeded` when the deadline fires first.
    pub async fn wait_with_deadline(self, deadline: Duration) -> LaneResult<String> {
        match tokio::time::timeout(deadline, self.wait()).await {
            Ok(result) => result,
            Err(_) => Err(LaneError::DeadlineExceeded),
        }
    }
}
