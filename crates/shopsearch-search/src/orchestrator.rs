//! Search orchestration with fail-open fallback
//!
//! Per request:
//!
//! ```text
//! START ─┬─ lexical mode / blank text ──────────────► LEXICAL_ONLY
//!        └─ semantic mode ─► HYBRID_PENDING ─┬─────► MERGED
//!                                            ├─────► FALLBACK_LEXICAL
//!                                            └─────► EMPTY_SEMANTIC_LEXICAL
//! ```
//!
//! In hybrid mode the lexical and semantic sub-searches run concurrently.
//! The semantic side is bounded by a timeout; configuration and external
//! service failures (including that timeout) degrade to the lexical result.
//! Document store failures propagate, since lexical search has no fallback.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ErrorKind, Result, SearchError};
use crate::lexical::LexicalSearchEngine;
use crate::merge::merge;
use crate::schema::{Product, ScoredCandidate, SearchMode, SearchQuery, DEFAULT_LIMIT};
use crate::semantic::SemanticSearchEngine;

/// Queries this short (in chars, after trimming) trust lexical hits first
pub const DEFAULT_SHORT_QUERY_CHARS: usize = 4;

/// Default bound on the semantic sub-search
pub const DEFAULT_SEMANTIC_TIMEOUT: Duration = Duration::from_secs(25);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub short_query_chars: usize,
    pub semantic_timeout: Duration,
    pub default_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            short_query_chars: DEFAULT_SHORT_QUERY_CHARS,
            semantic_timeout: DEFAULT_SEMANTIC_TIMEOUT,
            default_limit: DEFAULT_LIMIT,
        }
    }
}

/// Terminal state of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPath {
    LexicalOnly,
    Merged,
    FallbackLexical,
    EmptySemanticLexical,
}

impl std::fmt::Display for SearchPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SearchPath::LexicalOnly => "lexical_only",
            SearchPath::Merged => "merged",
            SearchPath::FallbackLexical => "fallback_lexical",
            SearchPath::EmptySemanticLexical => "empty_semantic_lexical",
        };
        f.write_str(s)
    }
}

/// Which list leads a hybrid merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOrder {
    LexicalFirst,
    SemanticFirst,
}

impl MergeOrder {
    /// Short queries put lexical hits first.
    pub fn for_query(text: &str, short_query_chars: usize) -> Self {
        if text.trim().chars().count() <= short_query_chars {
            MergeOrder::LexicalFirst
        } else {
            MergeOrder::SemanticFirst
        }
    }
}

/// Result of a search request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub hits: Vec<ScoredCandidate>,
    pub path: SearchPath,
    /// Why the semantic side was abandoned, for `FallbackLexical`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl SearchOutcome {
    fn new(hits: Vec<ScoredCandidate>, path: SearchPath) -> Self {
        Self {
            hits,
            path,
            fallback_reason: None,
        }
    }

    pub fn products(&self) -> Vec<Product> {
        self.hits.iter().map(|c| c.product.clone()).collect()
    }

    pub fn into_products(self) -> Vec<Product> {
        self.hits.into_iter().map(|c| c.product).collect()
    }

    pub fn is_degraded(&self) -> bool {
        self.path == SearchPath::FallbackLexical
    }
}

/// Outcome of the semantic sub-search before reconciliation
pub type SemanticAttempt = std::result::Result<Vec<ScoredCandidate>, SearchError>;

/// Reconcile a semantic attempt with the lexical result.
pub trait FailOpen {
    /// Merge on success, fall back to `lexical` on recoverable failure or
    /// an empty semantic result, propagate anything else.
    fn or_lexical(
        self,
        lexical: Vec<ScoredCandidate>,
        order: MergeOrder,
        limit: usize,
    ) -> Result<SearchOutcome>;
}

impl FailOpen for SemanticAttempt {
    fn or_lexical(
        self,
        lexical: Vec<ScoredCandidate>,
        order: MergeOrder,
        limit: usize,
    ) -> Result<SearchOutcome> {
        match self {
            Ok(semantic) if semantic.is_empty() => {
                debug!("No confident semantic hits, returning lexical results");
                Ok(SearchOutcome::new(lexical, SearchPath::EmptySemanticLexical))
            }
            Ok(semantic) => {
                let hits = match order {
                    MergeOrder::LexicalFirst => merge(lexical, semantic, limit),
                    MergeOrder::SemanticFirst => merge(semantic, lexical, limit),
                };
                Ok(SearchOutcome::new(hits, SearchPath::Merged))
            }
            Err(e) if e.triggers_fallback() => {
                if e.kind() == ErrorKind::Configuration {
                    warn!("Semantic search unavailable, using lexical results: {}", e);
                } else {
                    warn!("Semantic search failed, using lexical results: {}", e);
                }
                Ok(SearchOutcome {
                    hits: lexical,
                    path: SearchPath::FallbackLexical,
                    fallback_reason: Some(e.to_string()),
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// Top-level search policy
pub struct SearchOrchestrator {
    lexical: LexicalSearchEngine,
    semantic: SemanticSearchEngine,
    config: OrchestratorConfig,
}

impl SearchOrchestrator {
    pub fn new(
        lexical: LexicalSearchEngine,
        semantic: SemanticSearchEngine,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            lexical,
            semantic,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run `query`, degrading to lexical results when the semantic side fails.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchOutcome> {
        let limit = query.effective_limit(self.config.default_limit);
        let text = query.text();
        let categories = &query.categories;

        if query.mode == SearchMode::Lexical || text.is_empty() {
            let products = self.lexical.search(categories, text, limit).await?;
            return Ok(SearchOutcome::new(
                products.into_iter().map(ScoredCandidate::lexical).collect(),
                SearchPath::LexicalOnly,
            ));
        }

        let (lexical, semantic) = tokio::join!(
            self.lexical.search(categories, text, limit),
            self.semantic_attempt(categories, text, limit)
        );
        let lexical: Vec<ScoredCandidate> =
            lexical?.into_iter().map(ScoredCandidate::lexical).collect();

        let order = MergeOrder::for_query(text, self.config.short_query_chars);
        let outcome = semantic.or_lexical(lexical, order, limit)?;

        info!(
            "Search {:?}: {} results via {}",
            text,
            outcome.hits.len(),
            outcome.path
        );
        Ok(outcome)
    }

    /// Products only.
    pub async fn search_products(&self, query: &SearchQuery) -> Result<Vec<Product>> {
        Ok(self.search(query).await?.into_products())
    }

    async fn semantic_attempt(
        &self,
        categories: &[String],
        text: &str,
        limit: usize,
    ) -> SemanticAttempt {
        match tokio::time::timeout(
            self.config.semantic_timeout,
            self.semantic.search_scored(categories, text, limit),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SearchError::Timeout("semantic search".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{EmbeddingClient, EmbeddingProvider, EmbeddingProviderType};
    use crate::index::{VectorHit, VectorIndex, VectorQuery};
    use crate::semantic::SemanticConfig;
    use crate::store::{DocumentStore, SqliteProductStore};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    struct FixedProvider;

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn model(&self) -> &str {
            "fixed"
        }

        fn provider_type(&self) -> EmbeddingProviderType {
            EmbeddingProviderType::Openai
        }
    }

    enum Behavior {
        Hits(Vec<(&'static str, &'static str, f32)>),
        Fail(fn() -> SearchError),
        Hang,
    }

    struct ScriptedIndex(Behavior);

    #[async_trait]
    impl VectorIndex for ScriptedIndex {
        async fn query(&self, query: &VectorQuery) -> Result<Vec<VectorHit>> {
            match &self.0 {
                Behavior::Hits(hits) => Ok(hits
                    .iter()
                    .take(query.limit)
                    .map(|(id, name, score)| VectorHit {
                        id: id.to_string(),
                        product: Product::new(*id, *name),
                        score: *score,
                    })
                    .collect()),
                Behavior::Fail(make) => Err(make()),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(vec![])
                }
            }
        }

        async fn upsert(&self, _product: &Product, _vector: &[f32]) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    async fn catalog() -> Arc<dyn DocumentStore> {
        let store = SqliteProductStore::open_in_memory().unwrap();
        for product in [
            Product::new("1", "Desk Lamp"),
            Product::new("2", "Table"),
            Product::new("3", "Leather Sofa"),
            Product::new("4", "Lamp Oil"),
        ] {
            store.upsert(&product).await.unwrap();
        }
        Arc::new(store)
    }

    async fn orchestrator(
        client: EmbeddingClient,
        behavior: Behavior,
        semantic_config: SemanticConfig,
    ) -> SearchOrchestrator {
        let store = catalog().await;
        SearchOrchestrator::new(
            LexicalSearchEngine::new(store),
            SemanticSearchEngine::new(
                Arc::new(client),
                Arc::new(ScriptedIndex(behavior)),
                semantic_config,
            ),
            OrchestratorConfig {
                semantic_timeout: Duration::from_millis(200),
                ..Default::default()
            },
        )
    }

    fn enabled() -> EmbeddingClient {
        EmbeddingClient::new(Arc::new(FixedProvider))
    }

    fn ids(outcome: &SearchOutcome) -> Vec<&str> {
        outcome.hits.iter().map(|c| c.product_id()).collect()
    }

    #[tokio::test]
    async fn test_lexical_mode() {
        let orch = orchestrator(enabled(), Behavior::Hang, SemanticConfig::default()).await;
        let outcome = orch.search(&SearchQuery::new("lamp")).await.unwrap();
        assert_eq!(outcome.path, SearchPath::LexicalOnly);
        assert_eq!(ids(&outcome), vec!["1", "4"]);
    }

    #[tokio::test]
    async fn test_blank_semantic_query_is_lexical() {
        let orch = orchestrator(enabled(), Behavior::Hang, SemanticConfig::default()).await;
        let query = SearchQuery::new("   ").mode(SearchMode::Semantic);
        let outcome = orch.search(&query).await.unwrap();
        assert_eq!(outcome.path, SearchPath::LexicalOnly);
        assert_eq!(outcome.hits.len(), 4);
    }

    #[tokio::test]
    async fn test_disabled_provider_falls_back() {
        let orch = orchestrator(
            EmbeddingClient::disabled("no key"),
            Behavior::Hang,
            SemanticConfig::default(),
        )
        .await;

        let lexical = orch.search(&SearchQuery::new("sofa")).await.unwrap();
        let semantic = orch
            .search(&SearchQuery::new("sofa").mode(SearchMode::Semantic))
            .await
            .unwrap();

        assert_eq!(semantic.path, SearchPath::FallbackLexical);
        assert!(semantic.is_degraded());
        assert_eq!(semantic.products(), lexical.products());
    }

    #[tokio::test]
    async fn test_index_failure_falls_back() {
        let orch = orchestrator(
            enabled(),
            Behavior::Fail(|| SearchError::VectorIndex("connection refused".into())),
            SemanticConfig::default(),
        )
        .await;

        let outcome = orch
            .search(&SearchQuery::new("lamp").mode(SearchMode::Semantic))
            .await
            .unwrap();
        assert_eq!(outcome.path, SearchPath::FallbackLexical);
        assert!(outcome
            .fallback_reason
            .as_deref()
            .is_some_and(|r| r.contains("connection refused")));
        assert_eq!(ids(&outcome), vec!["1", "4"]);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let orch = orchestrator(
            enabled(),
            Behavior::Fail(|| SearchError::Store("disk I/O error".into())),
            SemanticConfig::default(),
        )
        .await;

        let err = orch
            .search(&SearchQuery::new("lamp").mode(SearchMode::Semantic))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Store(_)));
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let orch = orchestrator(enabled(), Behavior::Hang, SemanticConfig::default()).await;
        let outcome = orch
            .search(&SearchQuery::new("lamp").mode(SearchMode::Semantic))
            .await
            .unwrap();
        assert_eq!(outcome.path, SearchPath::FallbackLexical);
        assert_eq!(
            outcome.fallback_reason.as_deref(),
            Some("semantic search timed out")
        );
    }

    #[tokio::test]
    async fn test_low_confidence_returns_lexical() {
        let orch = orchestrator(
            enabled(),
            Behavior::Hits(vec![("3", "Leather Sofa", 0.2)]),
            SemanticConfig::default().with_min_best_score(0.5),
        )
        .await;

        let outcome = orch
            .search(&SearchQuery::new("lamp").mode(SearchMode::Semantic))
            .await
            .unwrap();
        assert_eq!(outcome.path, SearchPath::EmptySemanticLexical);
        assert_eq!(ids(&outcome), vec!["1", "4"]);
    }

    #[tokio::test]
    async fn test_short_query_puts_lexical_first() {
        let orch = orchestrator(
            enabled(),
            Behavior::Hits(vec![("3", "Leather Sofa", 0.9), ("4", "Lamp Oil", 0.5)]),
            SemanticConfig::default(),
        )
        .await;

        let outcome = orch
            .search(&SearchQuery::new("lamp").mode(SearchMode::Semantic))
            .await
            .unwrap();
        assert_eq!(outcome.path, SearchPath::Merged);
        assert_eq!(ids(&outcome), vec!["1", "4", "3"]);
    }

    #[tokio::test]
    async fn test_long_query_puts_semantic_first() {
        let orch = orchestrator(
            enabled(),
            Behavior::Hits(vec![("3", "Leather Sofa", 0.9), ("4", "Lamp Oil", 0.5)]),
            SemanticConfig::default(),
        )
        .await;

        let outcome = orch
            .search(&SearchQuery::new("lamps").mode(SearchMode::Semantic).limit(2))
            .await
            .unwrap();
        assert_eq!(outcome.path, SearchPath::Merged);
        assert_eq!(ids(&outcome), vec!["3", "4"]);
        assert_eq!(outcome.hits[0].score, Some(0.9));
    }

    #[test]
    fn test_merge_order() {
        assert_eq!(MergeOrder::for_query(" lamp ", 4), MergeOrder::LexicalFirst);
        assert_eq!(MergeOrder::for_query("lamps", 4), MergeOrder::SemanticFirst);
    }
}
