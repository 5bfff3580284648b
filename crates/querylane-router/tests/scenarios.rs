//! End-to-end routing and batching scenarios against stub collaborators.
//!
//! The stub vector store records every batch window it serves, so the
//! tests can assert how submissions were grouped, ordered, and drained.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use querylane_core::config::{BatchConfig, RouterConfig};
use querylane_core::error::{LaneError, LaneResult};
use querylane_core::traits::{Embedder, VectorStore};
use querylane_core::types::{
    IndexStats, SearchMatch, SearchRequest, SearchResponse, VectorRecord,
};
use querylane_router::Router;

/// Embeds a fixed vocabulary of test prompts.
struct VocabEmbedder;

#[async_trait]
impl Embedder for VocabEmbedder {
    async fn embed(&self, text: &str) -> LaneResult<Vec<f32>> {
        let embedding = match text {
            "ml-basics" | "ml-algorithms" => vec![1.0, 0.0, 0.0, 0.0],
            "cooking" => vec![0.0, 1.0, 0.0, 0.0],
            "sports" => vec![0.0, 0.0, 1.0, 0.0],
            other => return Err(LaneError::embedding(format!("unknown prompt: {other}"))),
        };
        Ok(embedding)
    }
}

/// Records every batch window and answers with the first component of each
/// query vector.
struct WindowStore {
    windows: Mutex<Vec<(Instant, usize)>>,
}

impl WindowStore {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            windows: Mutex::new(Vec::new()),
        })
    }

    fn window_sizes(&self) -> Vec<usize> {
        self.windows.lock().iter().map(|(_, n)| *n).collect()
    }
}

#[async_trait]
impl VectorStore for WindowStore {
    async fn query(&self, request: SearchRequest) -> LaneResult<SearchResponse> {
        Ok(SearchResponse {
            matches: vec![SearchMatch {
                id: format!("R{}", request.vector[0]),
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
            dimension: 4,
            index_fullness: 0.0,
        })
    }

    async fn query_batch(
        &self,
        embeddings: &[Vec<f32>],
        top_k: u32,
    ) -> LaneResult<Vec<SearchResponse>> {
        self.windows.lock().push((Instant::now(), embeddings.len()));
        let mut responses = Vec::with_capacity(embeddings.len());
        for embedding in embeddings {
            responses.push(self.query(SearchRequest::new(embedding.clone(), top_k)).await?);
        }
        Ok(responses)
    }
}

fn build_router(
    store: Arc<WindowStore>,
    max_bins: usize,
    threshold: f32,
    max_batch_size: usize,
    max_wait: Duration,
) -> Arc<Router> {
    let config = RouterConfig {
        max_bins,
        grouping_threshold: threshold,
        batch: BatchConfig {
            max_batch_size,
            max_wait,
            top_k: 5,
        },
    };
    Arc::new(Router::new(Arc::new(VocabEmbedder), store, None, config).unwrap())
}

#[tokio::test]
async fn batch_by_size_flushes_once() {
    let store = WindowStore::new();
    let router = build_router(store.clone(), 4, 0.0, 3, Duration::from_secs(10));

    let started = Instant::now();
    let mut tasks = Vec::new();
    for text in ["ml-basics", "ml-algorithms", "cooking"] {
        let router = Arc::clone(&router);
        tasks.push(tokio::spawn(async move { router.query(text).await }));
        // Stagger so the first submission has created bin 0 before the
        // rest are routed; at threshold 0.0 they all join it.
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }

    // Far below the 10s timer: the third submission triggered the flush.
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(store.window_sizes(), vec![3]);

    router.close(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn batch_by_time_flushes_lone_query() {
    let store = WindowStore::new();
    let router = build_router(store.clone(), 4, 0.0, 100, Duration::from_millis(50));

    let started = Instant::now();
    let result = router.query("ml-basics").await.unwrap();
    let elapsed = started.elapsed();

    assert!(result.contains("R1"));
    assert!(elapsed >= Duration::from_millis(40), "flushed early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(1), "flushed late: {elapsed:?}");
    assert_eq!(store.window_sizes(), vec![1]);

    router.close(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn dissimilar_queries_open_new_bins() {
    let store = WindowStore::new();
    let router = build_router(store.clone(), 4, 0.9, 100, Duration::from_millis(30));

    router.query("ml-basics").await.unwrap();
    router.query("cooking").await.unwrap();

    assert_eq!(router.stats().num_bins, 2);

    router.close(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn bin_cap_falls_back_to_closest() {
    let store = WindowStore::new();
    let router = build_router(store.clone(), 1, 0.99, 100, Duration::from_millis(30));

    router.query("ml-basics").await.unwrap();
    let result = router.query("cooking").await.unwrap();

    // Both serviced, still a single bin.
    assert!(result.contains("R0"));
    assert_eq!(router.stats().num_bins, 1);
    assert_eq!(store.window_sizes().iter().sum::<usize>(), 2);

    router.close(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn cancelled_waiter_does_not_cancel_the_flush() {
    let store = WindowStore::new();
    let router = build_router(store.clone(), 4, 0.0, 100, Duration::from_millis(100));

    let err = router
        .query_with_deadline("ml-basics", Duration::from_millis(10))
        .await
        .unwrap_err();
    assert_eq!(err, LaneError::DeadlineExceeded);

    // The query stays in its bin; the timer flush still reaches the store.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(store.window_sizes(), vec![1]);

    router.close(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn close_drains_buffered_queries() {
    let store = WindowStore::new();
    let router = build_router(store.clone(), 4, 0.0, 100, Duration::from_secs(10));

    let tasks: Vec<_> = ["ml-basics", "ml-algorithms"]
        .into_iter()
        .map(|text| {
            let router = Arc::clone(&router);
            tokio::spawn(async move { router.query(text).await })
        })
        .collect();

    // Let both submissions reach the bin queue before closing.
    tokio::time::sleep(Duration::from_millis(50)).await;
    router.close(Duration::from_secs(5)).await.unwrap();

    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }
    assert_eq!(store.window_sizes().iter().sum::<usize>(), 2);

    // The router admits nothing after close.
    assert_eq!(
        router.query("ml-basics").await.unwrap_err(),
        LaneError::BinClosed
    );
}

#[tokio::test]
async fn grouped_workload_lands_in_expected_bins() {
    let store = WindowStore::new();
    let router = build_router(store.clone(), 10, 0.9, 2, Duration::from_millis(50));

    // Settle bin 0 on the ml topic first, then fan the rest out.
    router.query("ml-basics").await.unwrap();

    let tasks: Vec<_> = ["ml-algorithms", "cooking", "sports"]
        .into_iter()
        .map(|text| {
            let router = Arc::clone(&router);
            tokio::spawn(async move { router.query(text).await })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }

    // Three topics, three bins; the two ml prompts shared one.
    assert_eq!(router.stats().num_bins, 3);

    router.close(Duration::from_secs(1)).await.unwrap();
}
