//! Vector index abstraction
//!
//! [`VectorIndex`] answers nearest-neighbor queries with hits pre-sorted by
//! descending similarity. Two implementations exist:
//!
//! - [`ExactVectorIndex`] - brute-force cosine similarity over the embeddings
//!   kept in the document store; no extra service required
//! - [`QdrantIndex`](crate::client::QdrantIndex) - HNSW search in Qdrant

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::schema::Product;
use crate::store::{DocumentStore, ProductQuery};

/// A nearest-neighbor request
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    /// Candidates examined before truncating to `limit`
    pub num_candidates: usize,
    pub limit: usize,
    /// Every listed category must be present on a hit
    pub categories_all: Vec<String>,
}

/// One scored document from the index
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub id: String,
    pub product: Product,
    pub score: f32,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Top `query.limit` documents, sorted by descending score.
    async fn query(&self, query: &VectorQuery) -> Result<Vec<VectorHit>>;

    /// Make `product` searchable under `vector`.
    async fn upsert(&self, product: &Product, vector: &[f32]) -> Result<()>;

    /// Short backend name for logs and status output.
    fn name(&self) -> &'static str;
}

/// Cosine similarity, 0 for zero-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;
    if denom < 1e-12 {
        return 0.0;
    }
    dot / denom
}

/// Brute-force index over stored embeddings
pub struct ExactVectorIndex {
    store: Arc<dyn DocumentStore>,
}

impl ExactVectorIndex {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl VectorIndex for ExactVectorIndex {
    async fn query(&self, query: &VectorQuery) -> Result<Vec<VectorHit>> {
        let candidates = self
            .store
            .find_matching(&ProductQuery::new().categories_all(query.categories_all.iter().cloned()))
            .await?;

        let mut skipped = 0usize;
        let mut hits: Vec<VectorHit> = candidates
            .into_iter()
            .filter_map(|mut product| {
                let embedding = product.embedding.take()?;
                if embedding.len() != query.vector.len() {
                    skipped += 1;
                    return None;
                }
                Some(VectorHit {
                    id: product.id.clone(),
                    score: cosine_similarity(&query.vector, &embedding),
                    product,
                })
            })
            .collect();

        if skipped > 0 {
            debug!("Skipped {} embeddings with a different dimension", skipped);
        }

        // Stable: ties keep store order
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(query.limit);
        Ok(hits)
    }

    async fn upsert(&self, _product: &Product, _vector: &[f32]) -> Result<()> {
        // Reads embeddings straight from the store
        Ok(())
    }

    fn name(&self) -> &'static str {
        "exact"
    }
}
