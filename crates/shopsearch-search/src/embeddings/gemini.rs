//! Gemini embedding provider
//!
//! # Endpoint Format
//!
//! - POST `{base_url}/v1beta/models/{model}:embedContent?key=<api_key>`
//! - Request: `{"content": {"parts": [{"text": "..."}]}}`
//! - Response: `{"embedding": {"values": [...]}}`
//!
//! The model may be given with or without its `models/` prefix.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http;
use super::provider::{EmbeddingProvider, EmbeddingProviderType};
use crate::error::{Result, SearchError};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default embedding model
pub const DEFAULT_MODEL: &str = "text-embedding-004";

/// Configuration for the Gemini provider
#[derive(Clone)]
pub struct GeminiConfig {
    /// API base URL
    pub base_url: String,
    /// API key, sent as the `key` query parameter
    pub api_key: String,
    /// Embedding model, with or without `models/` prefix
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            timeout_secs: super::openai::DEFAULT_TIMEOUT_SECS,
            max_retries: super::openai::DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Model name without the `models/` prefix.
    pub fn model_id(&self) -> &str {
        let model = self.model.trim();
        model.strip_prefix("models/").unwrap_or(model)
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest<'a> {
    content: Content<'a>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: Option<ContentEmbedding>,
}

/// Gemini embedding provider
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(SearchError::Configuration(
                "Gemini provider requires an API key".into(),
            ));
        }
        let client = http::build_client(config.timeout_secs)?;
        Ok(Self { client, config })
    }

    fn embed_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:embedContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model_id()
        )
    }

    async fn send_request(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(self.embed_url())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&EmbedContentRequest {
                content: Content {
                    parts: [Part { text }],
                },
            })
            .send()
            .await
            .map_err(http::send_error)?;

        let response = http::check_status(response).await?;

        let body: EmbedContentResponse = response.json().await.map_err(|e| {
            SearchError::ExternalService(format!("invalid embedContent response: {}", e))
        })?;

        let vector = body.embedding.map(|e| e.values).ok_or_else(|| {
            SearchError::ExternalService("embedContent response missing embedding".into())
        })?;

        http::validate_vector(vector)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        http::with_retry(self.config.max_retries, || self.send_request(text)).await
    }

    fn model(&self) -> &str {
        self.config.model_id()
    }

    fn provider_type(&self) -> EmbeddingProviderType {
        EmbeddingProviderType::Gemini
    }
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}
