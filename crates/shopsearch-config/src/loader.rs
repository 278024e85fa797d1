//! Layered configuration loading.
//!
//! Sources, lowest precedence first:
//! 1. Global config: `~/.shopsearch/config.toml`
//! 2. Local config: `.shopsearch/config.toml` (in workspace), or an explicit file
//! 3. `EMBEDDINGS_*` environment variables
//! 4. CLI overrides
//!
//! The global file is read once per loader and cached. File layers merge
//! key by key: a key written in the upper file wins even when it spells out
//! the default, and keys it omits keep the lower value.

use crate::error::ConfigError;
use crate::{ConfigOverrides, ShopConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Global configuration directory name.
const GLOBAL_CONFIG_DIR: &str = ".shopsearch";

/// Local configuration directory name.
const LOCAL_CONFIG_DIR: &str = ".shopsearch";

/// Loads and merges `ShopConfig` layers for a workspace.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.shopsearch`)
    global_config_dir: Option<PathBuf>,

    /// Cached global config
    global_config: Option<ConfigLayer>,

    /// Whether `EMBEDDINGS_*` variables are consulted
    read_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Automatically detects the global config directory (`~/.shopsearch`).
    pub fn new() -> Self {
        let global_config_dir = dirs::home_dir().map(|h| h.join(GLOBAL_CONFIG_DIR));

        Self {
            global_config_dir,
            global_config: None,
            read_env: true,
        }
    }

    /// Create a loader with a custom global config directory.
    ///
    /// Useful for testing.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            global_config: None,
            read_env: true,
        }
    }

    /// Skip environment fallbacks.
    pub fn ignore_env(mut self) -> Self {
        self.read_env = false;
        self
    }

    /// Get the global config file path.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Get the local config file path for a workspace.
    pub fn local_config_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(LOCAL_CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration for a workspace with optional CLI overrides.
    ///
    /// Merges config in order: global → local → environment → overrides.
    pub fn load(
        &mut self,
        workspace_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<ShopConfig, ConfigError> {
        let local = self.local_layer(workspace_root)?;
        self.finish(local, overrides)
    }

    /// Load configuration using an explicit file in place of the local config.
    ///
    /// Unlike the local config, a missing explicit file is an error.
    pub fn load_file(
        &mut self,
        config_file: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<ShopConfig, ConfigError> {
        debug!("Loading explicit config from {:?}", config_file);
        let explicit = ConfigLayer::read(config_file)?;
        self.finish(Some(explicit), overrides)
    }

    fn finish(
        &mut self,
        overlay: Option<ConfigLayer>,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<ShopConfig, ConfigError> {
        let mut config = ShopConfig::default();

        if let Some(global) = self.global_layer()? {
            config = merge_configs(config, global);
        }

        if let Some(overlay) = overlay {
            config = merge_configs(config, overlay);
        }

        if self.read_env {
            config.apply_env(|key| std::env::var(key).ok())?;
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load only the global configuration.
    pub fn load_global(&mut self) -> Result<Option<ShopConfig>, ConfigError> {
        Ok(self.global_layer()?.map(|layer| layer.config))
    }

    fn global_layer(&mut self) -> Result<Option<ConfigLayer>, ConfigError> {
        if let Some(ref layer) = self.global_config {
            return Ok(Some(layer.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("Loading global config from {:?}", global_path);
        let layer = ConfigLayer::read(&global_path)?;

        self.global_config = Some(layer.clone());

        Ok(Some(layer))
    }

    /// Load only the local configuration for a workspace.
    pub fn load_local(&self, workspace_root: &Path) -> Result<Option<ShopConfig>, ConfigError> {
        Ok(self.local_layer(workspace_root)?.map(|layer| layer.config))
    }

    fn local_layer(&self, workspace_root: &Path) -> Result<Option<ConfigLayer>, ConfigError> {
        let local_path = self.local_config_path(workspace_root);

        if !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("Loading local config from {:?}", local_path);
        ConfigLayer::read(&local_path).map(Some)
    }

    /// Save configuration to the local config file for a workspace.
    pub fn save_local(&self, workspace_root: &Path, config: &ShopConfig) -> Result<(), ConfigError> {
        let local_path = self.local_config_path(workspace_root);
        save_config_file(&local_path, config)
    }

    /// Initialize local configuration for a workspace.
    ///
    /// Creates `.shopsearch/config.toml` with default configuration.
    /// An existing file is left untouched.
    pub fn init_local(&self, workspace_root: &Path) -> Result<PathBuf, ConfigError> {
        let local_dir = workspace_root.join(LOCAL_CONFIG_DIR);

        if !local_dir.exists() {
            std::fs::create_dir_all(&local_dir)
                .map_err(|e| ConfigError::write(&local_dir, e))?;
        }

        let config_path = local_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            save_config_file(&config_path, &ShopConfig::default())?;
        }

        Ok(config_path)
    }
}

/// One config file: its typed contents plus the raw table of keys it sets.
#[derive(Debug, Clone)]
struct ConfigLayer {
    config: ShopConfig,
    table: toml::Table,
}

impl ConfigLayer {
    fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;
        Self::parse(&content).map_err(|e| ConfigError::parse(path, e))
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        Ok(Self {
            config: toml::from_str(content)?,
            table: toml::from_str(content)?,
        })
    }
}

/// Save a configuration file to disk.
fn save_config_file(path: &Path, config: &ShopConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::write(parent, e))?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write(path, e))
}

/// Keys written in one section of an overlay file.
#[derive(Debug, Clone, Copy, Default)]
struct Explicit<'a>(Option<&'a toml::Table>);

impl<'a> Explicit<'a> {
    fn section(table: &'a toml::Table, name: &str) -> Self {
        Self(table.get(name).and_then(toml::Value::as_table))
    }

    fn has(&self, key: &str) -> bool {
        self.0.is_some_and(|t| t.contains_key(key))
    }

    /// Overlay wins when the key is written out or differs from the default.
    fn pick<T: PartialEq>(&self, key: &str, base: T, overlay: T, default: T) -> T {
        if self.has(key) || overlay != default {
            overlay
        } else {
            base
        }
    }
}

/// Merge a config file over `base`, key by key.
fn merge_configs(base: ShopConfig, overlay: ConfigLayer) -> ShopConfig {
    let ConfigLayer { config, table } = overlay;
    let section = |name: &str| Explicit::section(&table, name);

    ShopConfig {
        store: merge_store(base.store, config.store, section("store")),
        embedding: merge_embedding(base.embedding, config.embedding, section("embedding")),
        vector: merge_vector(base.vector, config.vector, section("vector")),
        search: merge_search(base.search, config.search, section("search")),
        backfill: merge_backfill(base.backfill, config.backfill, section("backfill")),
        logging: merge_logging(base.logging, config.logging, section("logging")),
    }
}

fn merge_store(
    base: crate::StoreConfig,
    overlay: crate::StoreConfig,
    set: Explicit<'_>,
) -> crate::StoreConfig {
    let default = crate::StoreConfig::default();
    crate::StoreConfig {
        path: set.pick("path", base.path, overlay.path, default.path),
    }
}

fn merge_embedding(
    base: crate::EmbeddingConfig,
    overlay: crate::EmbeddingConfig,
    set: Explicit<'_>,
) -> crate::EmbeddingConfig {
    let default = crate::EmbeddingConfig::default();
    crate::EmbeddingConfig {
        provider: set.pick("provider", base.provider, overlay.provider, default.provider),
        api_key_env: set.pick(
            "api_key_env",
            base.api_key_env,
            overlay.api_key_env,
            default.api_key_env,
        ),
        api_key: overlay.api_key.or(base.api_key),
        base_url: overlay.base_url.or(base.base_url),
        model: overlay.model.or(base.model),
        timeout_secs: set.pick(
            "timeout_secs",
            base.timeout_secs,
            overlay.timeout_secs,
            default.timeout_secs,
        ),
        max_retries: set.pick(
            "max_retries",
            base.max_retries,
            overlay.max_retries,
            default.max_retries,
        ),
        dimension: overlay.dimension.or(base.dimension),
    }
}

fn merge_vector(
    base: crate::VectorConfig,
    overlay: crate::VectorConfig,
    set: Explicit<'_>,
) -> crate::VectorConfig {
    let default = crate::VectorConfig::default();
    crate::VectorConfig {
        backend: set.pick("backend", base.backend, overlay.backend, default.backend),
        url: set.pick("url", base.url, overlay.url, default.url),
        api_key: overlay.api_key.or(base.api_key),
        index_name: set.pick(
            "index_name",
            base.index_name,
            overlay.index_name,
            default.index_name,
        ),
        vector_path: set.pick(
            "vector_path",
            base.vector_path,
            overlay.vector_path,
            default.vector_path,
        ),
        dimension: set.pick("dimension", base.dimension, overlay.dimension, default.dimension),
        timeout_secs: set.pick(
            "timeout_secs",
            base.timeout_secs,
            overlay.timeout_secs,
            default.timeout_secs,
        ),
    }
}

fn merge_search(
    base: crate::SearchTuning,
    overlay: crate::SearchTuning,
    set: Explicit<'_>,
) -> crate::SearchTuning {
    let default = crate::SearchTuning::default();
    crate::SearchTuning {
        min_score_ratio: set.pick(
            "min_score_ratio",
            base.min_score_ratio,
            overlay.min_score_ratio,
            default.min_score_ratio,
        ),
        min_score: set.pick("min_score", base.min_score, overlay.min_score, default.min_score),
        min_best_score: set.pick(
            "min_best_score",
            base.min_best_score,
            overlay.min_best_score,
            default.min_best_score,
        ),
        semantic_top_k: set.pick(
            "semantic_top_k",
            base.semantic_top_k,
            overlay.semantic_top_k,
            default.semantic_top_k,
        ),
        short_query_chars: set.pick(
            "short_query_chars",
            base.short_query_chars,
            overlay.short_query_chars,
            default.short_query_chars,
        ),
        default_limit: set.pick(
            "default_limit",
            base.default_limit,
            overlay.default_limit,
            default.default_limit,
        ),
        semantic_timeout_secs: set.pick(
            "semantic_timeout_secs",
            base.semantic_timeout_secs,
            overlay.semantic_timeout_secs,
            default.semantic_timeout_secs,
        ),
    }
}

fn merge_backfill(
    base: crate::BackfillConfig,
    overlay: crate::BackfillConfig,
    set: Explicit<'_>,
) -> crate::BackfillConfig {
    let default = crate::BackfillConfig::default();
    crate::BackfillConfig {
        force: set.pick("force", base.force, overlay.force, default.force),
        limit: set.pick("limit", base.limit, overlay.limit, default.limit),
        delay_ms: set.pick("delay_ms", base.delay_ms, overlay.delay_ms, default.delay_ms),
    }
}

fn merge_logging(
    base: crate::LoggingConfig,
    overlay: crate::LoggingConfig,
    set: Explicit<'_>,
) -> crate::LoggingConfig {
    let default = crate::LoggingConfig::default();
    crate::LoggingConfig {
        level: set.pick("level", base.level, overlay.level, default.level),
        format: set.pick("format", base.format, overlay.format, default.format),
    }
}
