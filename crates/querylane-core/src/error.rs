//! Error type shared across the querylane crates.
//!
//! Errors either come back from `Router::query` at submission time
//! (embedding failures, closed bins) or are delivered through a query's
//! completion slot (downstream failures, missing results). Collaborator
//! errors are attached to the affected query, never masked, and never tear
//! down a bin.

use thiserror::Error;

/// Result alias used throughout querylane.
pub type LaneResult<T> = Result<T, LaneError>;

/// Top-level error type for routing and batching operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LaneError {
    /// The embedding client is not initialized or the remote call failed.
    ///
    /// Surfaced from `Router::query` before the query enters a bin.
    #[error("embedding service unavailable: {message}")]
    EmbeddingUnavailable { message: String },

    /// Submission raced with bin shutdown.
    #[error("bin is shut down")]
    BinClosed,

    /// The downstream vector store call failed. Every query in the affected
    /// batch receives this; a batch fails as a whole or not at all.
    #[error("vector store query failed: {message}")]
    DownstreamFailure { message: String },

    /// The downstream returned fewer results than queries in the batch.
    #[error("no result returned for query")]
    MissingResult,

    /// The caller's context was cancelled while waiting.
    #[error("query cancelled")]
    Cancelled,

    /// The caller's deadline fired while waiting.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// An embedding had the wrong dimension.
    #[error("invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Invalid configuration.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl LaneError {
    /// Build a `DownstreamFailure` from any displayable error.
    pub fn downstream(err: impl std::fmt::Display) -> Self {
        Self::DownstreamFailure {
            message: err.to_string(),
        }
    }

    /// Build an `EmbeddingUnavailable` from any displayable error.
    pub fn embedding(err: impl std::fmt::Display) -> Self {
        Self::EmbeddingUnavailable {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = LaneError::DimensionMismatch {
            expected: 384,
            actual: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("384"));
        assert!(msg.contains('3'));
    }

    #[test]
    fn downstream_wraps_message() {
        let err = LaneError::downstream("connection reset");
        assert_eq!(
            err,
            LaneError::DownstreamFailure {
                message: "connection reset".to_string()
            }
        );
    }

    #[test]
    fn variants_are_cloneable_for_fan_out() {
        let err = LaneError::MissingResult;
        let copy = err.clone();
        assert_eq!(err, copy);
    }
}
