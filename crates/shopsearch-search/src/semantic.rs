//! Semantic search with confidence gating
//!
//! Embeds the expanded query, asks the vector index for nearest neighbors,
//! then decides which hits are good enough to keep:
//!
//! 1. If `min_best_score > 0` and the best score is below it, nothing is kept.
//! 2. `cutoff = max(best * min_score_ratio, min_score)`.
//! 3. A hit is kept if it clears the cutoff, or if it lexically matches
//!    the expanded query (a *rescued* hit).
//! 4. Hits kept on score alone are capped at `min(semantic_top_k, limit)`;
//!    rescued hits are never dropped by the cap.

use std::sync::Arc;

use tracing::debug;

use crate::embeddings::EmbeddingClient;
use crate::error::{Result, SearchError};
use crate::expand::{expand, ExpandedQuery};
use crate::index::{VectorHit, VectorIndex, VectorQuery};
use crate::schema::{clamp_limit, num_candidates, Product, ScoredCandidate};

/// Default relative cutoff against the best score
pub const DEFAULT_MIN_SCORE_RATIO: f32 = 0.80;

/// Default cap on hits kept by score alone
pub const DEFAULT_SEMANTIC_TOP_K: usize = 20;

/// Confidence thresholds, fixed at engine construction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SemanticConfig {
    pub min_score_ratio: f32,
    pub min_score: f32,
    /// Gate on the best score; 0 disables it
    pub min_best_score: f32,
    pub semantic_top_k: usize,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            min_score_ratio: DEFAULT_MIN_SCORE_RATIO,
            min_score: 0.0,
            min_best_score: 0.0,
            semantic_top_k: DEFAULT_SEMANTIC_TOP_K,
        }
    }
}

impl SemanticConfig {
    pub fn with_min_score_ratio(mut self, ratio: f32) -> Self {
        self.min_score_ratio = ratio;
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_min_best_score(mut self, min_best_score: f32) -> Self {
        self.min_best_score = min_best_score;
        self
    }

    pub fn with_semantic_top_k(mut self, top_k: usize) -> Self {
        self.semantic_top_k = top_k;
        self
    }
}

/// Apply confidence gating to score-sorted `hits`.
pub fn select_hits(
    hits: Vec<VectorHit>,
    expanded: &ExpandedQuery,
    limit: usize,
    config: &SemanticConfig,
) -> Vec<ScoredCandidate> {
    let best_score = hits
        .iter()
        .map(|h| h.score)
        .fold(None, |best: Option<f32>, s| Some(best.map_or(s, |b| b.max(s))))
        .unwrap_or(0.0);

    if config.min_best_score > 0.0 && best_score < config.min_best_score {
        debug!(
            "Best semantic score {:.4} below gate {:.4}, dropping all hits",
            best_score, config.min_best_score
        );
        return Vec::new();
    }

    let cutoff = (best_score * config.min_score_ratio).max(config.min_score);
    let top_k = config.semantic_top_k.min(limit);

    let mut kept = Vec::new();
    let mut by_score = 0usize;
    let mut rescued = 0usize;

    for hit in hits {
        if kept.len() >= limit {
            break;
        }
        if expanded.matches_product(&hit.product) {
            rescued += 1;
            kept.push(ScoredCandidate::semantic(hit.product, hit.score));
        } else if hit.score >= cutoff && by_score < top_k {
            by_score += 1;
            kept.push(ScoredCandidate::semantic(hit.product, hit.score));
        }
    }

    debug!(
        "Semantic gating: best={:.4} cutoff={:.4} kept={} (score={}, rescued={})",
        best_score,
        cutoff,
        kept.len(),
        by_score,
        rescued
    );
    kept
}

/// Vector search engine
pub struct SemanticSearchEngine {
    client: Arc<EmbeddingClient>,
    index: Arc<dyn VectorIndex>,
    config: SemanticConfig,
}

impl SemanticSearchEngine {
    pub fn new(
        client: Arc<EmbeddingClient>,
        index: Arc<dyn VectorIndex>,
        config: SemanticConfig,
    ) -> Self {
        Self {
            client,
            index,
            config,
        }
    }

    pub fn config(&self) -> &SemanticConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_enabled()
    }

    /// Confident matches as plain products.
    ///
    /// Returns an empty list (not an error) when every hit is judged
    /// low-confidence.
    pub async fn search(
        &self,
        categories: &[String],
        text: &str,
        limit: usize,
    ) -> Result<Vec<Product>> {
        let hits = self.search_scored(categories, text, limit).await?;
        Ok(hits.into_iter().map(|c| c.product).collect())
    }

    /// Confident matches with their similarity scores.
    pub async fn search_scored(
        &self,
        categories: &[String],
        text: &str,
        limit: usize,
    ) -> Result<Vec<ScoredCandidate>> {
        if !self.client.is_enabled() {
            return Err(SearchError::Configuration(
                "embedding provider is not configured".into(),
            ));
        }

        let limit = clamp_limit(limit);
        let expanded = expand(text);
        let vector = self.client.embed(&expanded.embedding_text()).await?;

        let query = VectorQuery {
            vector,
            num_candidates: num_candidates(limit),
            limit,
            categories_all: categories
                .iter()
                .filter(|c| !c.trim().is_empty())
                .cloned()
                .collect(),
        };

        let hits = self.index.query(&query).await?;
        debug!(
            "{} index returned {} hits for {:?}",
            self.index.name(),
            hits.len(),
            expanded.original()
        );

        Ok(select_hits(hits, &expanded, limit, &self.config))
    }
}
