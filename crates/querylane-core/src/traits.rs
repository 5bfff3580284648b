//! Collaborator seams.
//!
//! The router never talks to a concrete service. It is handed three
//! capabilities at construction: an [`Embedder`] that turns text into
//! vectors, a [`VectorStore`] that answers similarity searches, and
//! optionally an [`LlmClient`] that synthesizes an answer from retrieved
//! context. Production wires gRPC and REST clients; tests wire stubs.
//!
//! All traits are object-safe and `Send + Sync` so implementations can be
//! shared across bin workers behind an `Arc`.

use async_trait::async_trait;

use crate::error::{LaneError, LaneResult};
use crate::types::{IndexStats, SearchRequest, SearchResponse, VectorRecord};

/// Turns text into a fixed-dimension embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single prompt.
    async fn embed(&self, text: &str) -> LaneResult<Vec<f32>>;

    /// Embed several prompts in one round trip.
    ///
    /// The default loops over [`embed`](Self::embed); clients with a batch
    /// RPC override it.
    async fn embed_batch(&self, texts: &[String]) -> LaneResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// A remote vector database.
///
/// The batching layer depends only on this capability surface; the concrete
/// backend is injected at router construction and held by every bin.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Similarity search for a single vector.
    async fn query(&self, request: SearchRequest) -> LaneResult<SearchResponse>;

    /// Insert or update vectors.
    async fn upsert(&self, vectors: Vec<VectorRecord>) -> LaneResult<()>;

    /// Delete vectors by id.
    async fn delete(&self, ids: &[String]) -> LaneResult<()>;

    /// Delete vectors matching a metadata filter.
    async fn delete_by_filter(&self, filter: serde_json::Value) -> LaneResult<()>;

    /// Index-level statistics.
    async fn stats(&self) -> LaneResult<IndexStats>;

    /// Search for a whole batch of embeddings, in order.
    ///
    /// The provided implementation issues single-shot queries in insertion
    /// order and aborts on the first failure, so a batch either succeeds
    /// with one response per embedding or fails as a whole. Backends with a
    /// native batch endpoint can override this.
    async fn query_batch(
        &self,
        embeddings: &[Vec<f32>],
        top_k: u32,
    ) -> LaneResult<Vec<SearchResponse>> {
        let mut responses = Vec::with_capacity(embeddings.len());
        for embedding in embeddings {
            let response = self
                .query(SearchRequest::new(embedding.clone(), top_k))
                .await
                .map_err(|e| LaneError::downstream(e))?;
            responses.push(response);
        }
        Ok(responses)
    }
}

/// A text-completion model used to synthesize answers from retrieved
/// context. Called from bin workers only.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete a prompt and return the model's text.
    async fn complete(&self, prompt: &str) -> LaneResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SearchMatch;

    struct FixedStore;

    #[async_trait]
    impl VectorStore for FixedStore {
        async fn query(&self, request: SearchRequest) -> LaneResult<SearchResponse> {
            Ok(SearchResponse {
                matches: vec![SearchMatch {
                    id: format!("dim{}", request.vector.len()),
                    score: 1.0,
                    values: None,
                    metadata: None,
                }],
            })
        }

        async fn upsert(&self, _vectors: Vec<VectorRecord>) -> LaneResult<()> {
            Ok(())
        }

        async fn delete(&self, _ids: &[String]) -> LaneResult<()> {
            Ok(())
        }

        async fn delete_by_filter(&self, _filter: serde_json::Value) -> LaneResult<()> {
            Ok(())
        }

        async fn stats(&self) -> LaneResult<IndexStats> {
            Ok(IndexStats {
                total_vector_count: 0,
                dimension: 0,
                index_fullness: 0.0,
            })
        }
    }

    struct FailingStore;

    #[async_trait]
    impl VectorStore for FailingStore {
        async fn query(&self, _request: SearchRequest) -> LaneResult<SearchResponse> {
            Err(LaneError::downstream("boom"))
        }

        async fn upsert(&self, _vectors: Vec<VectorRecord>) -> LaneResult<()> {
            Ok(())
        }

        async fn delete(&self, _ids: &[String]) -> LaneResult<()> {
            Ok(())
        }

        async fn delete_by_filter(&self, _filter: serde_json::Value) -> LaneResult<()> {
            Ok(())
        }

        async fn stats(&self) -> LaneResult<IndexStats> {
            Err(LaneError::downstream("boom"))
        }
    }

    #[tokio::test]
    async fn query_batch_preserves_order() {
        let store = FixedStore;
        let embeddings = vec![vec![1.0], vec![1.0, 2.0], vec![1.0, 2.0, 3.0]];
        let responses = store.query_batch(&embeddings, 5).await.unwrap();

        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0].matches[0].id, "dim1");
        assert_eq!(responses[1].matches[0].id, "dim2");
        assert_eq!(responses[2].matches[0].id, "dim3");
    }

    #[tokio::test]
    async fn query_batch_fails_as_a_whole() {
        let store = FailingStore;
        let embeddings = vec![vec![1.0], vec![2.0]];
        let err = store.query_batch(&embeddings, 5).await.unwrap_err();
        assert!(matches!(err, LaneError::DownstreamFailure { .. }));
    }

    #[tokio::test]
    async fn embed_batch_default_loops() {
        struct LenEmbedder;

        #[async_trait]
        impl Embedder for LenEmbedder {
            async fn embed(&self, text: &str) -> LaneResult<Vec<f32>> {
                Ok(vec![text.len() as f32])
            }
        }

        let texts = vec!["a".to_string(), "abc".to_string()];
        let out = LenEmbedder.embed_batch(&texts).await.unwrap();
        assert_eq!(out, vec![vec![1.0], vec![3.0]]);
    }
}
