//! gRPC client for the text embedding service.
//!
//! The connection is expensive and shared, so the production path goes
//! through a process-global handle with an explicit lifecycle:
//!
//! ```text
//! uninitialized ──init_embedding_client()──► ready(client)
//!       │                                        │
//!       └──────────── init failed ──────────► failed(error)
//! ```
//!
//! Initialization is idempotent and failure-sticky: once an init attempt
//! fails, every later call observes the same error until
//! [`close_embedding_client`] resets the state. Nothing constructs the
//! global implicitly on first read; [`global_embedder`] fails fast when
//! uninitialized. The router takes the client by dependency injection, so
//! tests never touch the global.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tonic::transport::{Channel, Endpoint};

use querylane_core::error::{LaneError, LaneResult};
use querylane_core::traits::Embedder;
use querylane_core::EMBEDDING_DIM;

use crate::error::{ClientError, ClientResult};
use crate::proto::embedding_service_client::EmbeddingServiceClient;
use crate::proto::{EmbeddingBatchRequest, EmbeddingRequest};

/// Client for the embedding service.
///
/// Cheap to clone; the underlying channel is multiplexed.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    client: EmbeddingServiceClient<Channel>,
}

impl EmbeddingClient {
    /// Connect to the embedding service at `addr` (host:port).
    ///
    /// The transport is insecure HTTP/2 with keep-alive pings every 10 s,
    /// a 3 s ping timeout, and pings permitted while idle, so a quiet
    /// connection is noticed dead before the next query pays for it.
    pub async fn connect(addr: &str) -> ClientResult<Self> {
        let endpoint = Endpoint::from_shared(format!("http://{addr}"))
            .map_err(|e| ClientError::Config(e.to_string()))?
            .http2_keep_alive_interval(Duration::from_secs(10))
            .keep_alive_timeout(Duration::from_secs(3))
            .keep_alive_while_idle(true);

        let channel = endpoint.connect().await?;
        tracing::info!(addr, "connected to embedding service");

        Ok(Self {
            client: EmbeddingServiceClient::new(channel),
        })
    }

    /// Embed a single prompt.
    pub async fn get_embedding(&self, prompt: &str) -> ClientResult<Vec<f32>> {
        let mut client = self.client.clone();
        let response = client
            .get_embedding(EmbeddingRequest {
                prompt: prompt.to_string(),
            })
            .await?;
        Ok(response.into_inner().embedding)
    }

    /// Embed several prompts in one round trip.
    pub async fn get_embedding_batch(&self, prompts: &[String]) -> ClientResult<Vec<Vec<f32>>> {
        let mut client = self.client.clone();
        let response = client
            .get_embedding_batch(EmbeddingBatchRequest {
                prompts: prompts.to_vec(),
            })
            .await?;
        Ok(response
            .into_inner()
            .embeddings
            .into_iter()
            .map(|e| e.embedding)
            .collect())
    }
}

fn check_dimension(embedding: Vec<f32>) -> LaneResult<Vec<f32>> {
    if embedding.len() != EMBEDDING_DIM {
        return Err(LaneError::DimensionMismatch {
            expected: EMBEDDING_DIM,
            actual: embedding.len(),
        });
    }
    Ok(embedding)
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed(&self, text: &str) -> LaneResult<Vec<f32>> {
        let embedding = self
            .get_embedding(text)
            .await
            .map_err(LaneError::embedding)?;
        check_dimension(embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> LaneResult<Vec<Vec<f32>>> {
        let embeddings = self
            .get_embedding_batch(texts)
            .await
            .map_err(LaneError::embedding)?;
        embeddings.into_iter().map(check_dimension).collect()
    }
}

// ============================================================================
// PROCESS-GLOBAL LIFECYCLE
// ============================================================================

/// State machine for the shared client.
#[derive(Default)]
struct GlobalState {
    client: Option<Arc<EmbeddingClient>>,
    init_error: Option<String>,
}

static GLOBAL_EMBEDDING_CLIENT: OnceLock<Arc<RwLock<GlobalState>>> = OnceLock::new();

fn global_slot() -> &'static Arc<RwLock<GlobalState>> {
    GLOBAL_EMBEDDING_CLIENT.get_or_init(|| Arc::new(RwLock::new(GlobalState::default())))
}

/// Initialize the process-global embedding client.
///
/// Idempotent: once a connection exists, later calls are no-ops. Failure
/// is sticky: after a failed attempt, later calls return the recorded
/// error without retrying until [`close_embedding_client`] resets the
/// state.
pub async fn init_embedding_client(addr: &str) -> ClientResult<()> {
    let mut state = global_slot().write().await;

    if state.client.is_some() {
        tracing::debug!("embedding client already initialized");
        return Ok(());
    }
    if let Some(ref err) = state.init_error {
        return Err(ClientError::Config(format!(
            "embedding client initialization previously failed: {err}"
        )));
    }

    match EmbeddingClient::connect(addr).await {
        Ok(client) => {
            state.client = Some(Arc::new(client));
            Ok(())
        }
        Err(err) => {
            tracing::error!(addr, error = %err, "embedding client initialization failed");
            state.init_error = Some(err.to_string());
            Err(err)
        }
    }
}

/// Get the process-global embedding client.
///
/// Fails fast when [`init_embedding_client`] has not run or has failed.
pub fn global_embedder() -> ClientResult<Arc<EmbeddingClient>> {
    let state = global_slot()
        .try_read()
        .map_err(|_| ClientError::Config("embedding client is busy initializing".to_string()))?;

    if let Some(ref err) = state.init_error {
        return Err(ClientError::Config(format!(
            "embedding client initialization failed: {err}"
        )));
    }

    state.client.as_ref().map(Arc::clone).ok_or_else(|| {
        ClientError::Config(
            "embedding client not initialized, call init_embedding_client first".to_string(),
        )
    })
}

/// Drop the process-global client and clear any sticky failure.
pub async fn close_embedding_client() {
    let mut state = global_slot().write().await;
    *state = GlobalState::default();
    tracing::debug!("embedding client closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_dimension_accepts_service_dim() {
        let v = vec![0.0; EMBEDDING_DIM];
        assert!(check_dimension(v).is_ok());
    }

    #[test]
    fn check_dimension_rejects_other_dims() {
        let err = check_dimension(vec![0.0; 3]).unwrap_err();
        assert_eq!(
            err,
            LaneError::DimensionMismatch {
                expected: EMBEDDING_DIM,
                actual: 3
            }
        );
    }

    // Single test for the global lifecycle: the state is process-wide, so
    // splitting these assertions across tests would make them race.
    #[tokio::test]
    async fn global_lifecycle_fails_fast_and_is_sticky() {
        close_embedding_client().await;

        let err = global_embedder().unwrap_err();
        assert!(err.to_string().contains("not initialized"));

        // Nothing listens on this port; init records the failure.
        assert!(init_embedding_client("127.0.0.1:1").await.is_err());

        let err = init_embedding_client("127.0.0.1:1").await.unwrap_err();
        assert!(err.to_string().contains("previously failed"));

        let err = global_embedder().unwrap_err();
        assert!(err.to_string().contains("initialization failed"));

        close_embedding_client().await;
        let err = global_embedder().unwrap_err();
        assert!(err.to_string().contains("not initialized"));
    }
}
