//! LLM client for answer synthesis.
//!
//! Used by bin workers to turn retrieved context into an answer. The
//! router runs fine without one; results then carry the raw match payload.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use querylane_core::error::{LaneError, LaneResult};
use querylane_core::traits::LlmClient;

use crate::error::{ClientError, ClientResult};

const GENERATE_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Configuration for the Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key (`GEMINI_API_KEY`).
    pub api_key: String,
    /// Model name.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl GeminiConfig {
    /// Read the key from the environment; `None` when unset.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty())?;
        Some(Self {
            api_key,
            model: "gemini-1.5-flash".to_string(),
            timeout_secs: 60,
        })
    }
}

/// Response shape of the generateContent endpoint, reduced to the fields
/// the client reads.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

fn first_candidate_text(response: GenerateResponse) -> ClientResult<String> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().next())
        .map(|p| p.text)
        .ok_or_else(|| ClientError::Api("empty completion response".to_string()))
}

/// REST client for the Google Generative Language API.
pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    /// Create a client.
    pub fn new(config: GeminiConfig) -> ClientResult<Self> {
        if config.api_key.is_empty() {
            return Err(ClientError::Config("api_key cannot be empty".to_string()));
        }
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;
        Ok(Self { http, config })
    }

    async fn generate(&self, prompt: &str) -> ClientResult<String> {
        let url = format!(
            "{GENERATE_ENDPOINT}/{}:generateContent?key={}",
            self.config.model, self.config.api_key
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self.http.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api(format!(
                "generateContent returned {status}: {body}"
            )));
        }

        first_candidate_text(response.json().await?)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, prompt: &str) -> LaneResult<String> {
        self.generate(prompt).await.map_err(LaneError::downstream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_api_key() {
        let config = GeminiConfig {
            api_key: String::new(),
            model: "gemini-1.5-flash".to_string(),
            timeout_secs: 60,
        };
        assert!(GeminiClient::new(config).is_err());
    }

    #[test]
    fn parses_candidate_text() {
        let json = r#"{
            "candidates": [
                { "content": { "parts": [{ "text": "an answer" }], "role": "model" } }
            ]
        }"#;
        let response: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(first_candidate_text(response).unwrap(), "an answer");
    }

    #[test]
    fn empty_candidates_is_an_api_error() {
        let response: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(first_candidate_text(response).is_err());
    }
}
