//! Core building blocks for querylane.
//!
//! querylane sits between an agentic RAG client and a remote vector
//! database. Incoming queries are classified by embedding similarity into
//! bins, each bin batches its queries into a single downstream access
//! window, and results are fanned back to the original callers.
//!
//! This crate holds the pieces shared by the router and the client
//! implementations:
//!
//! - **`LaneError`**: the error type surfaced to callers
//! - **`similarity`**: cosine similarity and vector normalization
//! - **`traits`**: the collaborator seams (embedding, vector store, LLM)
//! - **`types`**: wire shapes for vector store requests and responses
//! - **config**: environment, batching, and routing configuration

pub mod config;
pub mod error;
pub mod similarity;
pub mod traits;
pub mod types;

pub use config::{BatchConfig, EnvConfig, RouterConfig};
pub use error::{LaneError, LaneResult};
pub use traits::{Embedder, LlmClient, VectorStore};
pub use types::{IndexStats, SearchMatch, SearchRequest, SearchResponse, VectorRecord};

/// Embedding dimension produced by the embedding service.
pub const EMBEDDING_DIM: usize = 384;
