//! Common test utilities for shopsearch-search integration tests.
//!
//! Embedding providers are faked with wiremock; the catalog is an
//! in-memory SQLite store.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use shopsearch_search::{
    DocumentStore, EmbeddingClient, EmbeddingConfig, ExactVectorIndex, LexicalSearchEngine,
    OrchestratorConfig, Product, SearchOrchestrator, SemanticConfig, SemanticSearchEngine,
    SqliteProductStore,
};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// In-memory catalog holding `products`, in order
pub async fn seed_store(products: &[Product]) -> Arc<SqliteProductStore> {
    let store = SqliteProductStore::open_in_memory().expect("Failed to open store");
    for product in products {
        store.upsert(product).await.expect("Failed to seed product");
    }
    Arc::new(store)
}

/// OpenAI-style embeddings response
pub fn embeddings_body(vector: &[f32]) -> serde_json::Value {
    serde_json::json!({
        "object": "list",
        "data": [{"object": "embedding", "embedding": vector, "index": 0}],
        "model": "text-embedding-3-small"
    })
}

/// Answer embedding requests whose body mentions `fragment` with `vector`
pub async fn mock_embedding(server: &MockServer, fragment: &str, vector: &[f32]) {
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(body_string_contains(fragment))
        .respond_with(ResponseTemplate::new(200).set_body_json(embeddings_body(vector)))
        .mount(server)
        .await;
}

/// Client pointed at the mock server, no retries
pub fn mock_client(server: &MockServer) -> EmbeddingClient {
    let config = EmbeddingConfig::openai("test-key")
        .with_base_url(server.uri())
        .with_timeout(5)
        .with_max_retries(0);
    EmbeddingClient::from_config(&config).expect("Failed to build client")
}

/// Orchestrator over `store` with the exact in-process vector index
pub fn orchestrator(
    store: Arc<SqliteProductStore>,
    client: EmbeddingClient,
    semantic: SemanticConfig,
) -> SearchOrchestrator {
    let store: Arc<dyn DocumentStore> = store;
    SearchOrchestrator::new(
        LexicalSearchEngine::new(store.clone()),
        SemanticSearchEngine::new(
            Arc::new(client),
            Arc::new(ExactVectorIndex::new(store)),
            semantic,
        ),
        OrchestratorConfig {
            semantic_timeout: Duration::from_secs(10),
            ..Default::default()
        },
    )
}

/// Ids of `products`, in order
pub fn ids(products: &[Product]) -> Vec<String> {
    products.iter().map(|p| p.id.clone()).collect()
}
