//! OpenAI-compatible embedding provider
//!
//! # Endpoint Format
//!
//! - POST `{base_url}/v1/embeddings` (or `{base_url}/embeddings` when the base already ends in `/v1`)
//! - Header: `Authorization: Bearer <api_key>`
//! - Request: `{"model": "...", "input": "text"}`
//! - Response: `{"data": [{"embedding": [...], "index": 0}], ...}`
//!
//! # Example
//!
//! ```ignore
//! use shopsearch_search::embeddings::openai::{OpenAIConfig, OpenAIProvider};
//!
//! let provider = OpenAIProvider::new(OpenAIConfig::openai("sk-..."))?;
//! let vector = provider.embed("walnut side table").await?;
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http;
use super::provider::{EmbeddingProvider, EmbeddingProviderType};
use crate::error::{Result, SearchError};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Default embedding model
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Default timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Default max retries
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Configuration for OpenAI-compatible provider
#[derive(Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API (e.g., "https://api.openai.com" or "http://localhost:11434/v1")
    pub base_url: String,
    /// Bearer token
    pub api_key: String,
    /// Embedding model
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
}

impl OpenAIConfig {
    /// Create config for the OpenAI API
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Set base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set max retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

impl std::fmt::Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

/// Request body for the embeddings endpoint
#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
}

/// Single embedding in the response
#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// Response from the embeddings endpoint
#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

/// OpenAI-compatible embedding provider
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    /// Create a new OpenAI-compatible provider
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(SearchError::Configuration(
                "OpenAI provider requires an API key".into(),
            ));
        }
        let client = http::build_client(config.timeout_secs)?;
        Ok(Self { client, config })
    }

    /// Get the embeddings endpoint URL
    fn embeddings_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{}/embeddings", base)
        } else {
            format!("{}/v1/embeddings", base)
        }
    }

    /// Send a single request to the endpoint
    async fn send_request(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(self.embeddings_url())
            .bearer_auth(&self.config.api_key)
            .json(&EmbeddingsRequest {
                model: &self.config.model,
                input: text,
            })
            .send()
            .await
            .map_err(http::send_error)?;

        let response = http::check_status(response).await?;

        let body: EmbeddingsResponse = response.json().await.map_err(|e| {
            SearchError::ExternalService(format!("invalid embeddings response: {}", e))
        })?;

        let vector = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| {
                SearchError::ExternalService("embeddings response contained no data".into())
            })?;

        http::validate_vector(vector)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        http::with_retry(self.config.max_retries, || self.send_request(text)).await
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn provider_type(&self) -> EmbeddingProviderType {
        EmbeddingProviderType::Openai
    }
}

impl std::fmt::Debug for OpenAIProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIProvider")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("timeout_secs", &self.config.timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mock_response(dim: usize) -> serde_json::Value {
        serde_json::json!({
            "object": "list",
            "data": [{
                "object": "embedding",
                "embedding": vec![0.1_f32; dim],
                "index": 0
            }],
            "model": "test-model",
            "usage": {"prompt_tokens": 3, "total_tokens": 3}
        })
    }

    fn test_config(server: &MockServer) -> OpenAIConfig {
        OpenAIConfig::openai("test-key")
            .with_base_url(server.uri())
            .with_model("test-model")
            .with_timeout(5)
            .with_max_retries(0)
    }

    #[tokio::test]
    async fn test_embed_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_json(serde_json::json!({
                "model": "test-model",
                "input": "hello world"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(8)))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server)).unwrap();
        let vector = provider.embed("hello world").await.unwrap();

        assert_eq!(vector.len(), 8);
    }

    #[tokio::test]
    async fn test_base_url_with_v1_suffix() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(4)))
            .mount(&server)
            .await;

        let config = test_config(&server).with_base_url(format!("{}/v1/", server.uri()));
        let provider = OpenAIProvider::new(config).unwrap();
        assert!(provider.embed("x").await.is_ok());
    }

    #[test]
    fn test_missing_key_rejected() {
        let result = OpenAIProvider::new(OpenAIConfig::openai("  "));
        assert!(matches!(result, Err(SearchError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_auth_failure_is_external_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server)).unwrap();
        let err = provider.embed("test").await.unwrap_err();

        assert!(matches!(err, SearchError::ExternalService(ref msg) if msg.contains("401")));
    }

    #[tokio::test]
    async fn test_empty_data_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})),
            )
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server)).unwrap();
        let err = provider.embed("test").await.unwrap_err();
        assert!(matches!(err, SearchError::ExternalService(_)));
    }

    #[tokio::test]
    async fn test_empty_vector_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(0)))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server)).unwrap();
        let err = provider.embed("test").await.unwrap_err();
        assert!(matches!(err, SearchError::ExternalService(_)));
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server)).unwrap();
        let err = provider.embed("test").await.unwrap_err();
        assert!(matches!(
            err,
            SearchError::RateLimited {
                retry_after: Some(7)
            }
        ));
    }

    #[tokio::test]
    async fn test_retries_transient_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(4)))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server).with_max_retries(1)).unwrap();
        let vector = provider.embed("test").await.unwrap();
        assert_eq!(vector.len(), 4);
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(mock_response(4))
                    .set_delay(std::time::Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server).with_timeout(1)).unwrap();
        let err = provider.embed("test").await.unwrap_err();
        assert!(matches!(err, SearchError::Timeout(_)));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let config = OpenAIConfig::openai("secret-key");
        assert!(!format!("{:?}", config).contains("secret-key"));
    }
}
