//! Configuration for querylane.
//!
//! Three layers:
//!
//! - [`EnvConfig`]: connection settings read from the environment
//! - [`BatchConfig`]: per-bin flush thresholds
//! - [`RouterConfig`]: bin-table sizing and the grouping threshold
//!
//! All config structs provide `Default`, and `validate()` returns a
//! `LaneError::Config` describing the first invalid field. Invalid config
//! is an error, never a silent fallback.
//!
//! # Environment variables
//!
//! | Variable | Default | Required |
//! |----------|---------|----------|
//! | `EMBEDDING_SERVER_ADDR` | `localhost:50051` | no |
//! | `PINECONE_API_KEY` | | yes (Pinecone path) |
//! | `PINECONE_INDEX` | | yes (Pinecone path) |
//! | `PINECONE_REGION` | | no |

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LaneError, LaneResult};

// ============================================================================
// ENVIRONMENT CONFIG
// ============================================================================

/// Connection configuration read from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Address of the gRPC embedding service.
    pub embedding_server_addr: String,
    /// Pinecone API key.
    pub pinecone_api_key: String,
    /// Pinecone index name.
    pub pinecone_index: String,
    /// Pinecone region hint.
    pub pinecone_region: String,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            embedding_server_addr: "localhost:50051".to_string(),
            pinecone_api_key: String::new(),
            pinecone_index: String::new(),
            pinecone_region: String::new(),
        }
    }
}

impl EnvConfig {
    /// Read configuration from the process environment.
    ///
    /// Unset variables fall back to defaults; call [`validate`](Self::validate)
    /// before using the Pinecone fields.
    pub fn from_env() -> Self {
        Self {
            embedding_server_addr: env_or("EMBEDDING_SERVER_ADDR", "localhost:50051"),
            pinecone_api_key: env_or("PINECONE_API_KEY", ""),
            pinecone_index: env_or("PINECONE_INDEX", ""),
            pinecone_region: env_or("PINECONE_REGION", ""),
        }
    }

    /// Validate fields needed for the Pinecone-backed path.
    ///
    /// # Errors
    /// `LaneError::Config` if the API key or index name is missing.
    pub fn validate(&self) -> LaneResult<()> {
        if self.pinecone_api_key.is_empty() {
            return Err(LaneError::Config {
                message: "PINECONE_API_KEY is required".to_string(),
            });
        }
        if self.pinecone_index.is_empty() {
            return Err(LaneError::Config {
                message: "PINECONE_INDEX is required".to_string(),
            });
        }
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

// ============================================================================
// BATCH CONFIG
// ============================================================================

/// Flush thresholds for a single bin.
///
/// A bin flushes when its queue reaches `max_batch_size` or when the oldest
/// buffered query has waited `max_wait`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Queue length that triggers an immediate flush.
    pub max_batch_size: usize,
    /// Longest a buffered query may wait before a timer flush.
    #[serde(with = "duration_ms")]
    pub max_wait: Duration,
    /// Results returned per query from the vector store.
    pub top_k: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 6,
            max_wait: Duration::from_millis(500),
            top_k: 5,
        }
    }
}

impl BatchConfig {
    /// Validate the thresholds.
    ///
    /// # Errors
    /// `LaneError::Config` if any threshold is zero.
    pub fn validate(&self) -> LaneResult<()> {
        if self.max_batch_size == 0 {
            return Err(LaneError::Config {
                message: "max_batch_size must be > 0".to_string(),
            });
        }
        if self.max_wait.is_zero() {
            return Err(LaneError::Config {
                message: "max_wait must be > 0".to_string(),
            });
        }
        if self.top_k == 0 {
            return Err(LaneError::Config {
                message: "top_k must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// ROUTER CONFIG
// ============================================================================

/// Bin-table sizing and routing thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Upper bound on the number of bins. Non-positive values fall back to
    /// the default of 100 at router construction.
    pub max_bins: usize,
    /// Minimum cosine similarity for a query to join an existing bin.
    /// Lower values group more loosely and create fewer bins.
    pub grouping_threshold: f32,
    /// Per-bin flush thresholds.
    pub batch: BatchConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_bins: 100,
            grouping_threshold: 0.7,
            batch: BatchConfig::default(),
        }
    }
}

impl RouterConfig {
    /// Validate the routing parameters.
    ///
    /// # Errors
    /// `LaneError::Config` if the threshold is outside [-1, 1] or the nested
    /// batch config is invalid.
    pub fn validate(&self) -> LaneResult<()> {
        if !(-1.0..=1.0).contains(&self.grouping_threshold) {
            return Err(LaneError::Config {
                message: format!(
                    "grouping_threshold must be in [-1, 1], got {}",
                    self.grouping_threshold
                ),
            });
        }
        self.batch.validate()
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
