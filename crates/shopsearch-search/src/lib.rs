//! ShopSearch Search - Hybrid lexical and semantic product search
//!
//! This crate finds catalog products by combining pattern matching against
//! a document store with nearest-neighbor search over embedding vectors.
//!
//! # Features
//!
//! - **Query expansion**: singular/plural variants and a small synonym table
//! - **Confidence gating**: relative and absolute score cutoffs, lexical rescue,
//!   and a cap on the low-confidence tail
//! - **Fail-open**: semantic failures degrade to lexical results
//! - **Backends**: SQLite catalog, exact in-process or Qdrant vector index,
//!   OpenAI-compatible or Gemini embedding providers
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use shopsearch_search::{
//!     EmbeddingClient, EmbeddingConfig, ExactVectorIndex, LexicalSearchEngine,
//!     OrchestratorConfig, SearchMode, SearchOrchestrator, SearchQuery,
//!     SemanticConfig, SemanticSearchEngine, SqliteProductStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(SqliteProductStore::open("shopsearch.db".as_ref())?);
//!     let client = Arc::new(EmbeddingClient::from_config(&EmbeddingConfig::openai("sk-..."))?);
//!
//!     let orchestrator = SearchOrchestrator::new(
//!         LexicalSearchEngine::new(store.clone()),
//!         SemanticSearchEngine::new(
//!             client,
//!             Arc::new(ExactVectorIndex::new(store)),
//!             SemanticConfig::default(),
//!         ),
//!         OrchestratorConfig::default(),
//!     );
//!
//!     let query = SearchQuery::new("running shoes").mode(SearchMode::Semantic);
//!     let outcome = orchestrator.search(&query).await?;
//!     println!("{} results via {}", outcome.hits.len(), outcome.path);
//!     Ok(())
//! }
//! ```

pub mod backfill;
pub mod catalog;
pub mod client;
pub mod embeddings;
pub mod error;
pub mod expand;
pub mod index;
pub mod lexical;
pub mod merge;
pub mod orchestrator;
pub mod schema;
pub mod semantic;
pub mod store;

// Re-exports for convenience
pub use backfill::{BackfillOptions, BackfillStats, EmbeddingBackfillJob};
pub use catalog::ImportStats;
pub use client::{QdrantConfig, QdrantIndex};
pub use error::{ErrorKind, Result, SearchError};
pub use expand::{expand, ExpandedQuery};
pub use index::{ExactVectorIndex, VectorHit, VectorIndex, VectorQuery};
pub use lexical::LexicalSearchEngine;
pub use merge::merge;
pub use orchestrator::{
    FailOpen, MergeOrder, OrchestratorConfig, SearchOrchestrator, SearchOutcome, SearchPath,
    SemanticAttempt,
};
pub use schema::{CandidateSource, Product, ScoredCandidate, SearchMode, SearchQuery};
pub use semantic::{SemanticConfig, SemanticSearchEngine};
pub use store::{DocumentStore, ProductField, ProductQuery, SqliteProductStore};

pub use embeddings::{
    create_provider, EmbeddingClient, EmbeddingConfig, EmbeddingProvider, EmbeddingProviderType,
    GeminiConfig, GeminiProvider, OpenAIConfig, OpenAIProvider, ProviderStatus,
};
