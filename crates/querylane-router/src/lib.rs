//! Similarity-routed batching for remote vector databases.
//!
//! Agentic RAG workloads issue semantically unrelated retrieval queries
//! back to back, which defeats any cache on the database side and pays the
//! full per-request overhead of a disaggregated store on every call. This
//! crate restores locality by routing each query to a bin of semantically
//! similar queries and flushing each bin as one batched downstream access
//! window.
//!
//! # Architecture
//!
//! ```text
//! Caller ──query()──► Router ──similarity scan──► Bin ──► queue
//!                        │                         │
//!                        │ (new bin below          │ worker: size/time/
//!                        │  threshold, under cap)  │ shutdown triggers
//!                        ▼                         ▼
//!                     bin table               VectorStore batch
//!                                                  │
//! Caller ◄──completion slot◄──────────────────────┘
//! ```
//!
//! - [`Query`]: text + embedding + a single-shot completion slot
//! - [`Bin`]: buffered queue with one worker task that flushes batches
//! - [`Router`]: owns the bin table and the routing policy
//!
//! # Example
//!
//! ```rust,ignore
//! use querylane_core::RouterConfig;
//! use querylane_router::Router;
//!
//! let router = Router::new(embedder, store, None, RouterConfig::default())?;
//! let answer = router.query("What is machine learning?").await?;
//! router.close(Duration::from_secs(5)).await?;
//! ```

pub mod bin;
pub mod query;
pub mod router;

pub use bin::{Bin, BinStatsSnapshot};
pub use query::{Query, QueryTicket};
pub use router::{Router, RouterStats};
