//! CLI command implementations
//!
//! Also holds the translation from `shopsearch_config` values into the
//! runtime settings of `shopsearch_search`.

pub mod backfill;
pub mod config;
pub mod import;
pub mod search;
pub mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use shopsearch_config::{
    BackfillConfig, ConfigLoader, EmbeddingProviderType as ConfigProviderType, LoggingConfig,
    SearchTuning, ShopConfig, VectorBackend,
};
use shopsearch_search::{
    BackfillOptions, DocumentStore, EmbeddingClient, EmbeddingConfig as SearchEmbeddingConfig,
    EmbeddingProviderType, ExactVectorIndex, OrchestratorConfig, QdrantConfig, QdrantIndex,
    SemanticConfig, SqliteProductStore, VectorIndex,
};

use crate::GlobalOptions;

/// Resolve the workspace path from options or current directory.
pub fn resolve_workspace(global: &GlobalOptions) -> Result<PathBuf> {
    if let Some(ref ws) = global.workspace {
        if ws.is_dir() {
            return ws
                .canonicalize()
                .with_context(|| format!("Failed to resolve workspace {}", ws.display()));
        }
        anyhow::bail!("Workspace '{}' is not a directory", ws.display());
    }

    std::env::current_dir().context("Failed to get current directory")
}

/// Load configuration for `workspace` with CLI overrides applied.
pub fn load_config(global: &GlobalOptions, workspace: &Path) -> Result<ShopConfig> {
    let mut loader = ConfigLoader::new();
    let overrides = global.to_config_overrides();

    if let Some(ref config_path) = global.config {
        return loader
            .load_file(config_path, Some(&overrides))
            .with_context(|| format!("Failed to load config file {}", config_path.display()));
    }

    loader
        .load(workspace, Some(&overrides))
        .context("Failed to load configuration")
}

/// Logging settings, read before the subscriber exists.
///
/// Configuration problems are reported later by the command itself, so any
/// failure here falls back to the defaults.
pub fn logging_config(global: &GlobalOptions) -> LoggingConfig {
    resolve_workspace(global)
        .and_then(|ws| load_config(global, &ws))
        .map(|config| config.logging)
        .unwrap_or_default()
}

/// Everything a command needs: workspace, effective config, open catalog.
pub struct Session {
    pub workspace: PathBuf,
    pub config: ShopConfig,
    pub store: Arc<SqliteProductStore>,
}

impl Session {
    pub fn open(global: &GlobalOptions) -> Result<Self> {
        let workspace = resolve_workspace(global)?;
        let config = load_config(global, &workspace)?;
        let db_path = config.db_path(&workspace);
        let store = SqliteProductStore::open(&db_path)
            .with_context(|| format!("Failed to open catalog {}", db_path.display()))?;

        Ok(Self {
            workspace,
            config,
            store: Arc::new(store),
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.config.db_path(&self.workspace)
    }

    pub fn document_store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    /// Embedding client; disabled when no API key resolves.
    pub fn embedding_client(&self) -> Result<Arc<EmbeddingClient>> {
        let config = to_search_embedding_config(&self.config);
        let client = EmbeddingClient::from_config(&config)
            .context("Failed to create embedding provider")?;
        Ok(Arc::new(client))
    }

    /// Vector index for the configured backend.
    pub async fn vector_index(&self) -> Result<Arc<dyn VectorIndex>> {
        match self.config.vector.backend {
            VectorBackend::Exact => Ok(Arc::new(ExactVectorIndex::new(self.document_store()))),
            VectorBackend::Qdrant => {
                let index = QdrantIndex::connect(to_qdrant_config(&self.config))
                    .await
                    .context("Failed to connect to Qdrant")?;
                Ok(Arc::new(index))
            }
        }
    }
}

/// Print an info message (respects quiet flag).
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}

/// Print a warning message to stderr.
pub fn print_warning(message: &str) {
    eprintln!("warning: {}", message);
}

/// Convert the config crate's embedding settings to the search crate's.
///
/// The API key is resolved from the environment here, once.
pub fn to_search_embedding_config(config: &ShopConfig) -> SearchEmbeddingConfig {
    let embedding = &config.embedding;
    let provider = match embedding.provider {
        ConfigProviderType::Openai => EmbeddingProviderType::Openai,
        ConfigProviderType::Gemini => EmbeddingProviderType::Gemini,
    };

    SearchEmbeddingConfig {
        provider,
        api_key: embedding.resolve_api_key(),
        base_url: Some(embedding.effective_base_url()),
        model: Some(embedding.effective_model()),
        timeout_secs: embedding.timeout_secs,
        max_retries: embedding.max_retries,
        dimension: embedding.dimension,
    }
}

pub fn to_qdrant_config(config: &ShopConfig) -> QdrantConfig {
    let vector = &config.vector;
    let mut qdrant = QdrantConfig::with_url(&vector.url)
        .index_name(&vector.index_name)
        .vector_name(&vector.vector_path)
        .dimension(vector.dimension);
    qdrant.timeout_secs = vector.timeout_secs;
    if let Some(key) = vector.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        qdrant = qdrant.api_key(key);
    }
    qdrant
}

pub fn to_semantic_config(tuning: &SearchTuning) -> SemanticConfig {
    SemanticConfig::default()
        .with_min_score_ratio(tuning.min_score_ratio)
        .with_min_score(tuning.min_score)
        .with_min_best_score(tuning.min_best_score)
        .with_semantic_top_k(tuning.semantic_top_k)
}

pub fn to_orchestrator_config(tuning: &SearchTuning) -> OrchestratorConfig {
    OrchestratorConfig {
        short_query_chars: tuning.short_query_chars,
        semantic_timeout: Duration::from_secs(tuning.semantic_timeout_secs),
        default_limit: tuning.default_limit,
    }
}

pub fn to_backfill_options(backfill: &BackfillConfig) -> BackfillOptions {
    BackfillOptions {
        force: backfill.force,
        max_items: (backfill.limit > 0).then_some(backfill.limit),
        delay: Duration::from_millis(backfill.delay_ms),
    }
}
