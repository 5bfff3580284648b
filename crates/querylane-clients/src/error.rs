//! Errors raised by the collaborator clients.
//!
//! `ClientError` stays inside this crate; at the trait boundary each client
//! maps into the `LaneError` variant the router expects (embedding failures
//! into `EmbeddingUnavailable`, store and LLM failures into
//! `DownstreamFailure`).

use thiserror::Error;

/// Result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors from the embedding, vector store, and LLM clients.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("rpc error: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error: {0}")]
    Api(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_displays_message() {
        let err = ClientError::Api("index missing".to_string());
        assert!(err.to_string().contains("index missing"));
    }

    #[test]
    fn serde_error_converts() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ClientError = parse_err.into();
        assert!(matches!(err, ClientError::Serialization(_)));
    }
}
