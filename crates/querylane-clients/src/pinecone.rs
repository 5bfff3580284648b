//! REST client for the Pinecone vector database.
//!
//! Connecting resolves the index's data-plane host through the control
//! plane, then all vector operations go straight to that host with the
//! `Api-Key` header. The wire shapes live in `querylane-core::types`; this
//! client only adds transport.
//!
//! # Configuration
//!
//! - `PINECONE_API_KEY`: API key (required)
//! - `PINECONE_INDEX`: index name (required)
//! - `PINECONE_REGION`: region hint, informational

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use querylane_core::config::EnvConfig;
use querylane_core::error::{LaneError, LaneResult};
use querylane_core::traits::VectorStore;
use querylane_core::types::{IndexStats, SearchRequest, SearchResponse, VectorRecord};

use crate::error::{ClientError, ClientResult};

const CONTROL_PLANE: &str = "https://api.pinecone.io";

/// Configuration for the Pinecone client.
#[derive(Debug, Clone)]
pub struct PineconeConfig {
    /// API key.
    pub api_key: String,
    /// Index name.
    pub index: String,
    /// Region hint.
    pub region: String,
    /// Optional namespace applied to queries without one.
    pub namespace: Option<String>,
    /// Connection timeout in seconds.
    pub timeout_secs: u64,
}

impl PineconeConfig {
    /// Build from the shared environment config.
    pub fn from_env_config(env: &EnvConfig) -> Self {
        Self {
            api_key: env.pinecone_api_key.clone(),
            index: env.pinecone_index.clone(),
            region: env.pinecone_region.clone(),
            namespace: None,
            timeout_secs: 30,
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    /// `ClientError::Config` if the API key or index name is missing.
    pub fn validate(&self) -> ClientResult<()> {
        if self.api_key.is_empty() {
            return Err(ClientError::Config("api_key cannot be empty".to_string()));
        }
        if self.index.is_empty() {
            return Err(ClientError::Config("index cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// Control-plane description of an index.
#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
    #[serde(default)]
    dimension: u32,
}

/// Pinecone REST client.
pub struct PineconeClient {
    http: Client,
    api_key: String,
    host: String,
    namespace: Option<String>,
}

impl PineconeClient {
    /// Connect to an index: resolves its data-plane host, then returns a
    /// client bound to it.
    pub async fn connect(config: PineconeConfig) -> ClientResult<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        let url = format!("{CONTROL_PLANE}/indexes/{}", config.index);
        let response = http
            .get(&url)
            .header("Api-Key", &config.api_key)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(config.index));
        }
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api(format!(
                "failed to describe index {}: {body}",
                config.index
            )));
        }

        let description: IndexDescription = response.json().await?;
        tracing::info!(
            index = %config.index,
            host = %description.host,
            dimension = description.dimension,
            "connected to Pinecone index"
        );

        Ok(Self {
            http,
            api_key: config.api_key,
            host: description.host,
            namespace: config.namespace,
        })
    }

    fn data_url(&self, path: &str) -> String {
        format!("https://{}/{path}", self.host)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> ClientResult<T> {
        let response = self
            .http
            .post(self.data_url(path))
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api(format!("{path} returned {status}: {body}")));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl VectorStore for PineconeClient {
    async fn query(&self, mut request: SearchRequest) -> LaneResult<SearchResponse> {
        if request.namespace.is_none() {
            request.namespace = self.namespace.clone();
        }
        let body = serde_json::to_value(&request).map_err(LaneError::downstream)?;
        self.post_json("query", &body)
            .await
            .map_err(LaneError::downstream)
    }

    async fn upsert(&self, vectors: Vec<VectorRecord>) -> LaneResult<()> {
        let mut body = serde_json::json!({ "vectors": vectors });
        if let Some(ref ns) = self.namespace {
            body["namespace"] = serde_json::json!(ns);
        }
        let _: serde_json::Value = self
            .post_json("vectors/upsert", &body)
            .await
            .map_err(LaneError::downstream)?;
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> LaneResult<()> {
        let body = serde_json::json!({ "ids": ids });
        let _: serde_json::Value = self
            .post_json("vectors/delete", &body)
            .await
            .map_err(LaneError::downstream)?;
        Ok(())
    }

    async fn delete_by_filter(&self, filter: serde_json::Value) -> LaneResult<()> {
        let body = serde_json::json!({ "filter": filter });
        let _: serde_json::Value = self
            .post_json("vectors/delete", &body)
            .await
            .map_err(LaneError::downstream)?;
        Ok(())
    }

    async fn stats(&self) -> LaneResult<IndexStats> {
        self.post_json("describe_index_stats", &serde_json::json!({}))
            .await
            .map_err(LaneError::downstream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_requires_api_key() {
        let config = PineconeConfig {
            api_key: String::new(),
            index: "idx".to_string(),
            region: String::new(),
            namespace: None,
            timeout_secs: 30,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_requires_index() {
        let config = PineconeConfig {
            api_key: "key".to_string(),
            index: String::new(),
            region: String::new(),
            namespace: None,
            timeout_secs: 30,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_from_env_config_copies_fields() {
        let env = EnvConfig {
            embedding_server_addr: "localhost:50051".to_string(),
            pinecone_api_key: "key".to_string(),
            pinecone_index: "idx".to_string(),
            pinecone_region: "us-east-1".to_string(),
        };
        let config = PineconeConfig::from_env_config(&env);
        assert_eq!(config.api_key, "key");
        assert_eq!(config.index, "idx");
        assert_eq!(config.region, "us-east-1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn index_description_parses_control_plane_response() {
        let json = r#"{
            "name": "demo",
            "host": "demo-abc123.svc.us-east-1.pinecone.io",
            "dimension": 384,
            "metric": "cosine"
        }"#;
        let description: IndexDescription = serde_json::from_str(json).unwrap();
        assert_eq!(description.host, "demo-abc123.svc.us-east-1.pinecone.io");
        assert_eq!(description.dimension, 384);
    }

    #[test]
    fn stats_response_parses_data_plane_shape() {
        let json = r#"{
            "namespaces": {},
            "dimension": 384,
            "indexFullness": 0.1,
            "totalVectorCount": 1200
        }"#;
        let stats: IndexStats = serde_json::from_str(json).unwrap();
        assert_eq!(stats.total_vector_count, 1200);
        assert_eq!(stats.dimension, 384);
    }
}
