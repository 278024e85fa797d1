//! Product and query types shared by the search engines
//!
//! Defines the catalog document (`Product`), the request shape
//! (`SearchQuery`) and the provenance-tagged result (`ScoredCandidate`).

use serde::{Deserialize, Serialize};

/// Hard upper bound on results per request
pub const MAX_LIMIT: usize = 200;

/// Result limit used when a request does not specify one
pub const DEFAULT_LIMIT: usize = 60;

/// Lower bound on nearest-neighbor candidates examined per query
pub const MIN_NUM_CANDIDATES: usize = 100;

/// Payload field names shared by the document store and Qdrant
pub mod fields {
    pub const PRODUCT_ID: &str = "product_id";
    pub const NAME: &str = "name";
    pub const DESCRIPTION: &str = "description";
    pub const PRICE: &str = "price";
    pub const IMAGE_URL: &str = "image_url";
    pub const SLUG: &str = "slug";
    pub const EXTERNAL_ID: &str = "external_id";
    pub const SKU: &str = "sku";
    pub const CATEGORIES: &str = "categories";
}

/// Clamp a requested limit to `[1, MAX_LIMIT]`.
pub fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_LIMIT)
}

/// Number of ANN candidates to examine for a clamped limit.
pub fn num_candidates(limit: usize) -> usize {
    MIN_NUM_CANDIDATES.max(limit.saturating_mul(10))
}

/// A catalog product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique, stable identifier
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    /// Category labels, first occurrence wins
    #[serde(default)]
    pub categories: Vec<String>,
    /// Embedding vector, absent until backfilled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    /// Set categories, dropping blanks and duplicates.
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories.clear();
        for category in categories {
            let category = category.into();
            if !category.trim().is_empty() && !self.categories.contains(&category) {
                self.categories.push(category);
            }
        }
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Whether a non-empty embedding vector is present.
    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Whether this product carries every requested category.
    pub fn has_all_categories(&self, required: &[String]) -> bool {
        required.iter().all(|c| self.categories.contains(c))
    }
}

/// Search strategy requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Pattern matching against the document store only
    #[default]
    Lexical,
    /// Vector similarity merged with lexical matches
    Semantic,
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchMode::Lexical => write!(f, "lexical"),
            SearchMode::Semantic => write!(f, "semantic"),
        }
    }
}

impl std::str::FromStr for SearchMode {
    type Err = crate::error::SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lexical" | "keyword" => Ok(SearchMode::Lexical),
            "semantic" | "hybrid" => Ok(SearchMode::Semantic),
            other => Err(crate::error::SearchError::InvalidInput(format!(
                "unknown search mode '{}', expected lexical or semantic",
                other
            ))),
        }
    }
}

/// A search request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SearchQuery {
    /// Required categories (match-all)
    pub categories: Vec<String>,
    /// Raw query text, may be blank
    pub search: String,
    pub mode: SearchMode,
    /// Requested limit, `None` or 0 selects the default
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn new(search: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            ..Default::default()
        }
    }

    pub fn mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Trimmed query text.
    pub fn text(&self) -> &str {
        self.search.trim()
    }

    /// Limit after defaulting and clamping.
    pub fn effective_limit(&self, default_limit: usize) -> usize {
        match self.limit {
            Some(0) | None => clamp_limit(default_limit),
            Some(limit) => clamp_limit(limit),
        }
    }
}

/// Which engine produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    Lexical,
    Semantic,
}

impl std::fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CandidateSource::Lexical => write!(f, "lexical"),
            CandidateSource::Semantic => write!(f, "semantic"),
        }
    }
}

/// A product with its provenance and, for semantic hits, similarity score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub product: Product,
    pub score: Option<f32>,
    pub source: CandidateSource,
}

impl ScoredCandidate {
    pub fn lexical(product: Product) -> Self {
        Self {
            product,
            score: None,
            source: CandidateSource::Lexical,
        }
    }

    pub fn semantic(product: Product, score: f32) -> Self {
        Self {
            product,
            score: Some(score),
            source: CandidateSource::Semantic,
        }
    }

    pub fn product_id(&self) -> &str {
        &self.product.id
    }
}
