//! Embedding provider trait and types
//!
//! Defines the core abstraction for embedding generation with two remote
//! implementations:
//! - `OpenAIProvider` - OpenAI-compatible `/v1/embeddings` APIs
//! - `GeminiProvider` - Google Gemini `embedContent` API

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};

/// Type of embedding provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingProviderType {
    /// OpenAI-compatible API (bearer token)
    #[default]
    Openai,
    /// Gemini API (key as query parameter)
    Gemini,
}

impl std::fmt::Display for EmbeddingProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingProviderType::Openai => write!(f, "openai"),
            EmbeddingProviderType::Gemini => write!(f, "gemini"),
        }
    }
}

impl std::str::FromStr for EmbeddingProviderType {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(EmbeddingProviderType::Openai),
            "gemini" | "google" => Ok(EmbeddingProviderType::Gemini),
            other => Err(SearchError::Configuration(format!(
                "unknown embedding provider '{}'",
                other
            ))),
        }
    }
}

/// Status of an embedding provider
///
/// Contains health and capability information for diagnostics.
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    /// Whether the provider is available and responding
    pub available: bool,
    /// Type of provider
    pub provider_type: EmbeddingProviderType,
    /// Model answering requests
    pub model: String,
    /// Last health check latency in milliseconds
    pub latency_ms: Option<u64>,
    /// Vector length reported by the probe
    pub dimension: Option<usize>,
    /// Error message if provider is unavailable
    pub error: Option<String>,
}

impl ProviderStatus {
    /// Create a status for a healthy provider
    pub fn healthy(provider_type: EmbeddingProviderType, model: impl Into<String>) -> Self {
        Self {
            available: true,
            provider_type,
            model: model.into(),
            latency_ms: None,
            dimension: None,
            error: None,
        }
    }

    /// Create a status for an unavailable provider
    pub fn unavailable(
        provider_type: EmbeddingProviderType,
        model: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            available: false,
            provider_type,
            model: model.into(),
            latency_ms: None,
            dimension: None,
            error: Some(error.into()),
        }
    }

    /// Set latency from a health check
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    /// Set the probed vector dimension
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }
}

/// Embedding provider trait
///
/// Turns one piece of text into one vector. Adapters own their request and
/// response shapes; callers only see `Vec<f32>`.
///
/// Implementations must be `Send + Sync` for use with async runtimes and
/// concurrent access.
///
/// # Example
///
/// ```ignore
/// use shopsearch_search::embeddings::EmbeddingProvider;
///
/// async fn example(provider: &dyn EmbeddingProvider) -> shopsearch_search::Result<()> {
///     let vector = provider.embed("walnut side table").await?;
///     assert!(!vector.is_empty());
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed already-trimmed, non-blank text.
    ///
    /// Returns `ExternalService` on non-success or malformed responses and
    /// `Timeout` when the hard request timeout elapses.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Check provider connectivity and status
    async fn check_status(&self) -> Result<ProviderStatus> {
        let start = std::time::Instant::now();
        match self.embed("health check").await {
            Ok(vector) => Ok(ProviderStatus::healthy(self.provider_type(), self.model())
                .with_latency(start.elapsed().as_millis() as u64)
                .with_dimension(vector.len())),
            Err(e) => Ok(ProviderStatus::unavailable(
                self.provider_type(),
                self.model(),
                e.to_string(),
            )),
        }
    }

    /// Model name sent to the provider
    fn model(&self) -> &str;

    /// Get the provider type identifier
    fn provider_type(&self) -> EmbeddingProviderType;
}
