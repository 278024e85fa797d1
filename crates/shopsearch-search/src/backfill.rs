//! Embedding backfill job
//!
//! Walks every stored product, embeds the ones without a vector (or all of
//! them with `force`), and persists the result to the document store and,
//! when configured, the vector index. Provider calls are strictly
//! sequential and spaced by a rate limiter; per-item failures are logged
//! and counted, never fatal.

use std::sync::Arc;
use std::time::Duration;

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::embeddings::EmbeddingClient;
use crate::error::{Result, SearchError};
use crate::index::VectorIndex;
use crate::schema::Product;
use crate::store::DocumentStore;

/// Default spacing between provider calls
pub const DEFAULT_DELAY: Duration = Duration::from_millis(150);

type BackfillRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Progress callback: (items processed, total items)
pub type ProgressFn = dyn Fn(usize, usize) + Send + Sync;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillOptions {
    /// Re-embed products that already have a vector
    pub force: bool,
    /// Stop after this many processed items
    pub max_items: Option<usize>,
    /// Minimum spacing between provider calls; zero disables throttling
    pub delay: Duration,
}

impl Default for BackfillOptions {
    fn default() -> Self {
        Self {
            force: false,
            max_items: None,
            delay: DEFAULT_DELAY,
        }
    }
}

/// Counters reported by a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillStats {
    pub processed: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub missing_before: usize,
    pub missing_after: usize,
}

/// Lowercased keyword variants for a category label.
///
/// `"Home & Garden"` or `"home+and+garden"` also yield the spaced form and
/// furniture/decor keywords.
pub fn expand_category_keywords(raw: &str) -> Vec<String> {
    let label = raw.trim().to_lowercase();
    if label.is_empty() {
        return Vec::new();
    }

    let spaced = label
        .replace(['+', '&'], " ")
        .split_whitespace()
        .filter(|w| *w != "and")
        .collect::<Vec<_>>()
        .join(" ");

    let mut out = vec![label.clone()];
    if !spaced.is_empty() && spaced != label {
        out.push(spaced.clone());
    }
    if spaced.contains("home") || spaced.contains("garden") {
        out.extend(["home", "garden", "furniture", "decor"].map(String::from));
    }
    if spaced.contains("furniture") {
        out.extend(["home", "decor"].map(String::from));
    }

    let mut unique: Vec<String> = Vec::with_capacity(out.len());
    for keyword in out {
        if !unique.contains(&keyword) {
            unique.push(keyword);
        }
    }
    unique
}

/// Text embedded for a stored product: name, description, categories and
/// category keywords, one per line.
pub fn build_embedding_text(product: &Product) -> String {
    let mut parts: Vec<String> = Vec::new();

    let name = product.name.trim();
    if !name.is_empty() {
        parts.push(name.to_string());
    }
    let description = product.description.trim();
    if !description.is_empty() {
        parts.push(description.to_string());
    }

    let categories: Vec<&str> = product
        .categories
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();
    if !categories.is_empty() {
        parts.push(format!("Categories: {}", categories.join(", ")));

        let mut keywords: Vec<String> = Vec::new();
        for keyword in categories.iter().flat_map(|c| expand_category_keywords(c)) {
            if !keywords.contains(&keyword) {
                keywords.push(keyword);
            }
        }
        parts.push(format!("Category keywords: {}", keywords.join(", ")));
    }

    parts.join("\n")
}

/// Batch job that (re)computes product embeddings
pub struct EmbeddingBackfillJob {
    store: Arc<dyn DocumentStore>,
    client: Arc<EmbeddingClient>,
    index: Option<Arc<dyn VectorIndex>>,
    options: BackfillOptions,
    progress: Option<Box<ProgressFn>>,
}

impl EmbeddingBackfillJob {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        client: Arc<EmbeddingClient>,
        options: BackfillOptions,
    ) -> Self {
        Self {
            store,
            client,
            index: None,
            options,
            progress: None,
        }
    }

    /// Also upsert every new vector into `index`.
    pub fn with_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn options(&self) -> &BackfillOptions {
        &self.options
    }

    /// Run the backfill.
    ///
    /// # Errors
    ///
    /// `SearchError::Configuration` when the embedding client is disabled;
    /// document store errors while listing or counting products. Failures
    /// for individual products are counted in [`BackfillStats::failed`].
    pub async fn run(&self) -> Result<BackfillStats> {
        if !self.client.is_enabled() {
            return Err(SearchError::Configuration(
                "embedding backfill requires a configured provider API key".into(),
            ));
        }

        let products = self.store.find_all().await?;
        let mut stats = BackfillStats {
            missing_before: products.iter().filter(|p| !p.has_embedding()).count(),
            ..Default::default()
        };

        let total = match self.options.max_items {
            Some(max) if max > 0 => products.len().min(max),
            _ => products.len(),
        };

        info!(
            "Embedding backfill starting: products={} missing={} force={} limit={:?}",
            products.len(),
            stats.missing_before,
            self.options.force,
            self.options.max_items
        );

        let limiter: Option<BackfillRateLimiter> =
            Quota::with_period(self.options.delay).map(RateLimiter::direct);

        for product in products.iter().take(total) {
            stats.processed += 1;

            if !self.options.force && product.has_embedding() {
                stats.skipped += 1;
            } else {
                let text = build_embedding_text(product);
                if text.is_empty() {
                    debug!("Product {} has no text to embed", product.id);
                    stats.skipped += 1;
                } else {
                    if let Some(limiter) = &limiter {
                        limiter.until_ready().await;
                    }
                    match self.embed_and_save(product, &text).await {
                        Ok(()) => stats.updated += 1,
                        Err(e) => {
                            warn!("Failed embedding for product id={}: {}", product.id, e);
                            stats.failed += 1;
                        }
                    }
                }
            }

            if let Some(progress) = &self.progress {
                progress(stats.processed, total);
            }
        }

        stats.missing_after = self.store.count_missing_embeddings().await?;

        info!(
            "Embedding backfill finished: processed={} updated={} skipped={} failed={} missing_after={}",
            stats.processed, stats.updated, stats.skipped, stats.failed, stats.missing_after
        );
        Ok(stats)
    }

    /// The index is written first: a stored embedding marks the product as
    /// done for later runs, so it must only land once the index has it too.
    async fn embed_and_save(&self, product: &Product, text: &str) -> Result<()> {
        let vector = self.client.embed(text).await?;
        if let Some(index) = &self.index {
            index.upsert(product, &vector).await?;
        }
        self.store.save_embedding(&product.id, &vector).await?;
        Ok(())
    }
}
