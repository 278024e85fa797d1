//! Embedding client used by the search and backfill paths
//!
//! Wraps an optional provider. A client built without credentials is
//! *disabled*: every `embed` call fails fast with
//! `SearchError::Configuration` and never touches the network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use super::factory::{self, EmbeddingConfig};
use super::provider::{EmbeddingProvider, ProviderStatus};
use crate::error::{Result, SearchError};

/// Text → vector with credential, input and dimension checks
pub struct EmbeddingClient {
    provider: Option<Arc<dyn EmbeddingProvider>>,
    disabled_reason: String,
    /// Dimension of the first vector seen (0 = unknown)
    dimension: AtomicUsize,
}

impl EmbeddingClient {
    /// Client backed by `provider`.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider: Some(provider),
            disabled_reason: String::new(),
            dimension: AtomicUsize::new(0),
        }
    }

    /// Client that rejects every call with `reason`.
    pub fn disabled(reason: impl Into<String>) -> Self {
        Self {
            provider: None,
            disabled_reason: reason.into(),
            dimension: AtomicUsize::new(0),
        }
    }

    /// Build from configuration; missing credentials yield a disabled client.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        if !config.has_api_key() {
            warn!(
                "No API key configured for {}; semantic search and backfill are disabled",
                config.provider
            );
            return Ok(Self::disabled(format!(
                "no API key configured for {}",
                config.provider
            )));
        }

        let client = Self::new(factory::create(config)?);
        if let Some(dim) = config.dimension {
            client.dimension.store(dim, Ordering::Relaxed);
        }
        Ok(client)
    }

    /// Expect vectors of exactly `dimension` components.
    pub fn with_dimension(self, dimension: usize) -> Self {
        self.dimension.store(dimension, Ordering::Relaxed);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Vector length established so far, if any.
    pub fn dimension(&self) -> Option<usize> {
        match self.dimension.load(Ordering::Relaxed) {
            0 => None,
            dim => Some(dim),
        }
    }

    /// The underlying provider, if enabled.
    pub fn provider(&self) -> Option<&Arc<dyn EmbeddingProvider>> {
        self.provider.as_ref()
    }

    /// Embed `text`.
    ///
    /// # Errors
    ///
    /// - `Configuration` when the client is disabled
    /// - `InvalidInput` for blank text, before any network call
    /// - `DimensionMismatch` when the vector length differs from earlier vectors
    /// - provider errors (`ExternalService`, `Timeout`, ...) otherwise
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let provider = self.require_provider()?;

        let text = text.trim();
        if text.is_empty() {
            return Err(SearchError::InvalidInput("text to embed is blank".into()));
        }

        debug!("Embedding {} chars with {}", text.len(), provider.model());
        let vector = provider.embed(text).await?;
        self.check_dimension(vector.len())?;
        Ok(vector)
    }

    /// Probe the provider.
    pub async fn check_status(&self) -> Result<ProviderStatus> {
        self.require_provider()?.check_status().await
    }

    fn require_provider(&self) -> Result<&Arc<dyn EmbeddingProvider>> {
        self.provider
            .as_ref()
            .ok_or_else(|| SearchError::Configuration(self.disabled_reason.clone()))
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        match self
            .dimension
            .compare_exchange(0, actual, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => Ok(()),
            Err(expected) if expected == actual => Ok(()),
            Err(expected) => Err(SearchError::DimensionMismatch { expected, actual }),
        }
    }
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("enabled", &self.is_enabled())
            .field("dimension", &self.dimension())
            .finish()
    }
}
