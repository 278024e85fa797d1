//! Provider factory for creating embedding providers from configuration
//!
//! The provider is chosen once, here, from the configured provider name.

use std::sync::Arc;

use super::gemini::{self, GeminiConfig, GeminiProvider};
use super::openai::{self, OpenAIConfig, OpenAIProvider};
use super::provider::{EmbeddingProvider, EmbeddingProviderType};
use crate::error::{Result, SearchError};

/// Runtime configuration for embedding providers
#[derive(Clone)]
pub struct EmbeddingConfig {
    /// Which provider to use
    pub provider: EmbeddingProviderType,
    /// API key; blank or missing disables embeddings
    pub api_key: Option<String>,
    /// Base URL override
    pub base_url: Option<String>,
    /// Model override
    pub model: Option<String>,
    /// Hard request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
    /// Expected vector dimension
    pub dimension: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::default(),
            api_key: None,
            base_url: None,
            model: None,
            timeout_secs: openai::DEFAULT_TIMEOUT_SECS,
            max_retries: openai::DEFAULT_MAX_RETRIES,
            dimension: None,
        }
    }
}

impl EmbeddingConfig {
    /// Config for the OpenAI provider
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            provider: EmbeddingProviderType::Openai,
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// Config for the Gemini provider
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self {
            provider: EmbeddingProviderType::Gemini,
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
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

    /// Whether a non-blank API key is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    fn base_url_or(&self, default: &str) -> String {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(default)
            .to_string()
    }

    fn model_or(&self, default: &str) -> String {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .unwrap_or(default)
            .to_string()
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("provider", &self.provider)
            .field("has_api_key", &self.has_api_key())
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

/// Create an embedding provider from configuration
///
/// Returns an `Arc<dyn EmbeddingProvider>` that can be shared across
/// async tasks and threads.
///
/// # Errors
///
/// `SearchError::Configuration` when no API key is configured.
pub fn create(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let api_key = config
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            SearchError::Configuration(format!("no API key configured for {}", config.provider))
        })?;

    match config.provider {
        EmbeddingProviderType::Openai => {
            tracing::info!("Using OpenAI-compatible embedding provider");
            let provider_config = OpenAIConfig::openai(api_key)
                .with_base_url(config.base_url_or(openai::DEFAULT_BASE_URL))
                .with_model(config.model_or(openai::DEFAULT_MODEL))
                .with_timeout(config.timeout_secs)
                .with_max_retries(config.max_retries);
            Ok(Arc::new(OpenAIProvider::new(provider_config)?))
        }
        EmbeddingProviderType::Gemini => {
            tracing::info!("Using Gemini embedding provider");
            let provider_config = GeminiConfig::new(api_key)
                .with_base_url(config.base_url_or(gemini::DEFAULT_BASE_URL))
                .with_model(config.model_or(gemini::DEFAULT_MODEL))
                .with_timeout(config.timeout_secs)
                .with_max_retries(config.max_retries);
            Ok(Arc::new(GeminiProvider::new(provider_config)?))
        }
    }
}
