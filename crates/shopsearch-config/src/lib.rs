//! ShopSearch Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.shopsearch/config.toml`
//! - Local config: `.shopsearch/config.toml` (in workspace)
//! - Environment fallbacks for embedding credentials (`EMBEDDINGS_*`)
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → environment → CLI overrides.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable holding the provider name.
pub const ENV_PROVIDER: &str = "EMBEDDINGS_PROVIDER";

/// Environment variable holding the provider base URL.
pub const ENV_BASE_URL: &str = "EMBEDDINGS_API_BASE_URL";

/// Environment variable holding the embedding model.
pub const ENV_MODEL: &str = "EMBEDDINGS_MODEL";

/// Default environment variable holding the provider API key.
pub const DEFAULT_API_KEY_ENV: &str = "EMBEDDINGS_API_KEY";

/// Root configuration for ShopSearch.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ShopConfig {
    /// Product catalog storage
    pub store: StoreConfig,

    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Vector index configuration
    pub vector: VectorConfig,

    /// Search tuning knobs
    pub search: SearchTuning,

    /// Embedding backfill defaults
    pub backfill: BackfillConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Embedding provider configuration.
///
/// # Example TOML
///
/// ```toml
/// [embedding]
/// provider = "gemini"  # or "openai"
/// api_key_env = "GEMINI_API_KEY"
/// model = "text-embedding-004"
/// timeout_secs = 20
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which embedding provider to use
    pub provider: EmbeddingProviderType,

    /// Environment variable name containing the API key
    pub api_key_env: Option<String>,

    /// Inline API key (prefer `api_key_env`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// API base URL (None = provider default)
    pub base_url: Option<String>,

    /// Embedding model (None = provider default)
    pub model: Option<String>,

    /// Hard request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retry attempts for transient failures
    pub max_retries: u32,

    /// Expected vector dimension, checked against provider responses
    pub dimension: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::default(),
            api_key_env: Some(DEFAULT_API_KEY_ENV.to_string()),
            api_key: None,
            base_url: None,
            model: None,
            timeout_secs: 20,
            max_retries: 2,
            dimension: None,
        }
    }
}

impl EmbeddingConfig {
    /// Resolve the API key: inline key first, then the configured env var.
    ///
    /// Blank values count as missing.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    /// Resolve the API key using a custom environment lookup.
    pub fn resolve_api_key_with(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| self.api_key_env.as_deref().and_then(&env))
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }

    /// Base URL, falling back to the provider default.
    pub fn effective_base_url(&self) -> String {
        self.base_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
    }

    /// Model, falling back to the provider default.
    pub fn effective_model(&self) -> String {
        self.model
            .clone()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    /// Validate embedding settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "embedding.timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.dimension == Some(0) {
            return Err(ConfigError::invalid_value(
                "embedding.dimension",
                "must be greater than zero when set",
            ));
        }
        Ok(())
    }
}

/// Embedding provider type selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingProviderType {
    /// OpenAI-compatible `/v1/embeddings` API (default)
    #[default]
    Openai,
    /// Google Gemini `embedContent` API
    Gemini,
}

impl EmbeddingProviderType {
    /// Default API base URL for this provider.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Openai => "https://api.openai.com",
            Self::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    /// Default embedding model for this provider.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Openai => "text-embedding-3-small",
            Self::Gemini => "text-embedding-004",
        }
    }
}

impl std::fmt::Display for EmbeddingProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Openai => write!(f, "openai"),
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

impl std::str::FromStr for EmbeddingProviderType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::Openai),
            "gemini" | "google" => Ok(Self::Gemini),
            _ => Err(ConfigError::unknown_variant(
                "embedding provider",
                s.trim(),
                "openai, gemini",
            )),
        }
    }
}

/// Product catalog storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database path (relative paths resolve against the workspace)
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("shopsearch.db"),
        }
    }
}

/// Vector index backend selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// Exhaustive cosine scan over embeddings in the product store
    #[default]
    Exact,
    /// Qdrant collection
    Qdrant,
}

impl std::fmt::Display for VectorBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Qdrant => write!(f, "qdrant"),
        }
    }
}

impl std::str::FromStr for VectorBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "qdrant" => Ok(Self::Qdrant),
            _ => Err(ConfigError::unknown_variant(
                "vector backend",
                s.trim(),
                "exact, qdrant",
            )),
        }
    }
}

/// Vector index configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    /// Which index answers nearest-neighbor queries
    pub backend: VectorBackend,

    /// Qdrant server URL
    pub url: String,

    /// Qdrant API key (optional)
    pub api_key: Option<String>,

    /// Vector index (collection) name
    pub index_name: String,

    /// Vector field path within each document
    pub vector_path: String,

    /// Vector dimension used when creating the collection
    pub dimension: u64,

    /// Connection timeout in seconds
    pub timeout_secs: u64,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::default(),
            url: "http://localhost:6334".to_string(),
            api_key: None,
            index_name: "product_embedding".to_string(),
            vector_path: "embedding".to_string(),
            dimension: 1536, // text-embedding-3-small
            timeout_secs: 10,
        }
    }
}

/// Search tuning knobs.
///
/// Score thresholds are relative to the similarity metric of the vector
/// index (cosine by default).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchTuning {
    /// Keep semantic hits scoring at least `best * min_score_ratio`
    pub min_score_ratio: f32,

    /// Absolute floor for semantic hit scores
    pub min_score: f32,

    /// Return no semantic hits unless the best score reaches this (0 = off)
    pub min_best_score: f32,

    /// Maximum number of purely semantic hits kept
    pub semantic_top_k: usize,

    /// Queries this short (in characters) rank lexical hits first
    pub short_query_chars: usize,

    /// Result limit when the caller does not give one
    pub default_limit: usize,

    /// Upper bound on the whole semantic sub-search
    pub semantic_timeout_secs: u64,
}

impl Default for SearchTuning {
    fn default() -> Self {
        Self {
            min_score_ratio: 0.80,
            min_score: 0.0,
            min_best_score: 0.0,
            semantic_top_k: 20,
            short_query_chars: 4,
            default_limit: 60,
            semantic_timeout_secs: 25,
        }
    }
}

impl SearchTuning {
    /// Validate threshold ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.min_score_ratio) {
            return Err(ConfigError::invalid_value(
                "search.min_score_ratio",
                format!("must be within [0, 1], got {}", self.min_score_ratio),
            ));
        }
        if self.min_score < 0.0 || self.min_score.is_nan() {
            return Err(ConfigError::invalid_value(
                "search.min_score",
                "must not be negative",
            ));
        }
        if self.min_best_score < 0.0 || self.min_best_score.is_nan() {
            return Err(ConfigError::invalid_value(
                "search.min_best_score",
                "must not be negative",
            ));
        }
        if self.semantic_top_k == 0 {
            return Err(ConfigError::invalid_value(
                "search.semantic_top_k",
                "must be greater than zero",
            ));
        }
        if self.default_limit == 0 {
            return Err(ConfigError::invalid_value(
                "search.default_limit",
                "must be greater than zero",
            ));
        }
        if self.semantic_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "search.semantic_timeout_secs",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Embedding backfill defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillConfig {
    /// Re-embed products that already have a vector
    pub force: bool,

    /// Stop after this many products (0 = unlimited)
    pub limit: usize,

    /// Minimum spacing between provider calls in milliseconds
    pub delay_ms: u64,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            force: false,
            limit: 0,
            delay_ms: 150,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Single-line compact format
    Compact,
}

/// CLI overrides for configuration values.
///
/// Used to apply command-line arguments over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override SQLite database path
    pub db_path: Option<PathBuf>,

    /// Override Qdrant URL (implies the Qdrant backend)
    pub qdrant_url: Option<String>,

    /// Override vector backend
    pub vector_backend: Option<VectorBackend>,

    /// Override embedding provider type
    pub embedding_provider: Option<EmbeddingProviderType>,

    /// Override log level
    pub log_level: Option<String>,
}

impl ShopConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref path) = overrides.db_path {
            self.store.path = path.clone();
        }

        if let Some(ref url) = overrides.qdrant_url {
            self.vector.url = url.clone();
            self.vector.backend = VectorBackend::Qdrant;
        }

        if let Some(backend) = overrides.vector_backend {
            self.vector.backend = backend;
        }

        if let Some(provider) = overrides.embedding_provider {
            self.embedding.provider = provider;
        }

        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Apply `EMBEDDINGS_*` environment fallbacks.
    ///
    /// The provider is replaced when the variable is set; base URL and model
    /// only fill values the config files left empty.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(provider) = env(ENV_PROVIDER).filter(|v| !v.trim().is_empty()) {
            self.embedding.provider = provider.parse()?;
        }
        if self.embedding.base_url.is_none() {
            self.embedding.base_url = env(ENV_BASE_URL).filter(|v| !v.trim().is_empty());
        }
        if self.embedding.model.is_none() {
            self.embedding.model = env(ENV_MODEL).filter(|v| !v.trim().is_empty());
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;
        self.search.validate()?;

        if self.vector.index_name.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "vector.index_name",
                "must not be empty",
            ));
        }
        if self.vector.vector_path.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "vector.vector_path",
                "must not be empty",
            ));
        }
        Ok(())
    }

    /// Get the effective database path for a workspace.
    pub fn db_path(&self, workspace_root: &std::path::Path) -> PathBuf {
        if self.store.path.is_absolute() {
            self.store.path.clone()
        } else {
            workspace_root.join(&self.store.path)
        }
    }
}
