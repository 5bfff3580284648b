//! Wire shapes for vector store requests and responses.
//!
//! These structs are the structural contract between the router and any
//! `VectorStore` implementation. Field names serialize in the camelCase
//! form the Pinecone data plane expects; other backends can reuse the same
//! shapes or adapt them in their client.

use serde::{Deserialize, Serialize};

/// A vector with its id and optional metadata, as stored in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// A similarity search against the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub vector: Vec<f32>,
    pub top_k: u32,
    pub include_metadata: bool,
    pub include_values: bool,
    /// Optional metadata filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<serde_json::Value>,
    /// Optional namespace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl SearchRequest {
    /// A metadata-only search with no filter or namespace.
    #[must_use]
    pub fn new(vector: Vec<f32>, top_k: u32) -> Self {
        Self {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
            filter: None,
            namespace: None,
        }
    }
}

/// A single match returned by a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMatch {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl SearchMatch {
    /// The `text` metadata field, when present.
    ///
    /// Retrieval corpora ingested for RAG carry the chunk text under this
    /// key; it is what gets assembled into LLM context.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.metadata.as_ref()?.get("text")?.as_str()
    }
}

/// Full response to a search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub matches: Vec<SearchMatch>,
}

/// Index-level statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    #[serde(default)]
    pub total_vector_count: u64,
    #[serde(default)]
    pub dimension: u32,
    #[serde(default)]
    pub index_fullness: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_request_serializes_camel_case() {
        let req = SearchRequest::new(vec![0.1, 0.2], 5);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["topK"], 5);
        assert_eq!(json["includeMetadata"], true);
        assert!(json.get("filter").is_none());
    }

    #[test]
    fn search_match_text_reads_metadata() {
        let m = SearchMatch {
            id: "a".to_string(),
            score: 0.9,
            values: None,
            metadata: Some(serde_json::json!({ "text": "chunk body" })),
        };
        assert_eq!(m.text(), Some("chunk body"));
    }

    #[test]
    fn search_match_text_absent_metadata() {
        let m = SearchMatch {
            id: "a".to_string(),
            score: 0.9,
            values: None,
            metadata: None,
        };
        assert_eq!(m.text(), None);
    }

    #[test]
    fn search_response_tolerates_missing_matches() {
        let resp: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.matches.is_empty());
    }
}
