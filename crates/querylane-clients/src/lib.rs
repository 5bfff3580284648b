//! Collaborator clients for querylane.
//!
//! Concrete implementations of the `querylane-core` collaborator traits:
//!
//! - [`EmbeddingClient`]: gRPC client for the text embedding service, with
//!   a process-global lifecycle for the production path
//! - [`PineconeClient`]: REST client for the Pinecone data plane
//! - [`GeminiClient`]: REST client for answer synthesis
//!
//! All clients are thread-safe and intended to be shared behind an `Arc`.

pub mod embedding;
pub mod error;
pub mod llm;
pub mod pinecone;

/// Generated protobuf types for the embedding service.
pub mod proto {
    tonic::include_proto!("embedding");
}

pub use embedding::{
    close_embedding_client, global_embedder, init_embedding_client, EmbeddingClient,
};
pub use error::{ClientError, ClientResult};
pub use llm::{GeminiClient, GeminiConfig};
pub use pinecone::{PineconeClient, PineconeConfig};
