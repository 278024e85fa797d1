//! Qdrant-backed vector index
//!
//! Products live in one collection with a single named vector field
//! (`embedding` by default) and their catalog fields as payload, so search
//! hits can be returned without a round trip to the document store.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    vectors_config::Config, Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    Distance, FieldType, Filter, PointStruct, SearchParamsBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, Value, VectorParams, VectorParamsMap, VectorsConfig,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{Result, SearchError};
use crate::index::{VectorHit, VectorIndex, VectorQuery};
use crate::schema::{fields, Product};

/// Configuration for connecting to Qdrant
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    /// Qdrant server URL (e.g., "http://localhost:6334")
    pub url: String,
    /// Optional API key for authentication
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Collection holding product vectors
    pub index_name: String,
    /// Named vector field inside the collection
    pub vector_name: String,
    /// Vector dimension used when creating the collection
    pub dimension: u64,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
            timeout_secs: 10,
            index_name: "product_embedding".to_string(),
            vector_name: "embedding".to_string(),
            dimension: 1536,
        }
    }
}

impl QdrantConfig {
    /// Create config with custom URL
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set API key
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = name.into();
        self
    }

    pub fn vector_name(mut self, name: impl Into<String>) -> Self {
        self.vector_name = name.into();
        self
    }

    pub fn dimension(mut self, dimension: u64) -> Self {
        self.dimension = dimension;
        self
    }
}

/// Stable numeric point id for a product id.
pub fn point_id(product_id: &str) -> u64 {
    let digest = Sha256::digest(product_id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Filter requiring every category (match-all).
fn categories_filter(categories: &[String]) -> Option<Filter> {
    if categories.is_empty() {
        return None;
    }
    Some(Filter::must(
        categories
            .iter()
            .map(|c| Condition::matches(fields::CATEGORIES, c.clone())),
    ))
}

fn product_payload(product: &Product) -> Result<Payload> {
    Payload::try_from(json!({
        fields::PRODUCT_ID: product.id,
        fields::NAME: product.name,
        fields::DESCRIPTION: product.description,
        fields::PRICE: product.price,
        fields::IMAGE_URL: product.image_url,
        fields::SLUG: product.slug,
        fields::EXTERNAL_ID: product.external_id,
        fields::SKU: product.sku,
        fields::CATEGORIES: product.categories,
    }))
    .map_err(|e| SearchError::VectorIndex(format!("invalid payload for {}: {}", product.id, e)))
}

/// Rebuild a product from a hit payload, `None` without a product id.
fn payload_to_product(payload: &HashMap<String, Value>) -> Option<Product> {
    let get_string = |key: &str| -> Option<String> {
        payload
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    };

    let id = get_string(fields::PRODUCT_ID).filter(|id| !id.trim().is_empty())?;
    let categories = payload
        .get(fields::CATEGORIES)
        .and_then(|v| v.as_list())
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();

    Some(Product {
        id,
        name: get_string(fields::NAME).unwrap_or_default(),
        description: get_string(fields::DESCRIPTION).unwrap_or_default(),
        price: payload.get(fields::PRICE).and_then(|v| v.as_double()),
        image_url: get_string(fields::IMAGE_URL),
        slug: get_string(fields::SLUG),
        external_id: get_string(fields::EXTERNAL_ID),
        sku: get_string(fields::SKU),
        categories,
        embedding: None,
    })
}

/// Vector index stored in a Qdrant collection
pub struct QdrantIndex {
    client: Qdrant,
    config: QdrantConfig,
}

impl QdrantIndex {
    /// Connect to Qdrant server
    pub async fn connect(config: QdrantConfig) -> Result<Self> {
        info!("Connecting to Qdrant at {}", config.url);

        let mut builder =
            Qdrant::from_url(&config.url).timeout(Duration::from_secs(config.timeout_secs));
        if let Some(api_key) = &config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder.build().map_err(|e| {
            SearchError::VectorIndex(format!("Failed to build Qdrant client: {}", e))
        })?;

        // Test connection by listing collections
        client
            .list_collections()
            .await
            .map_err(|e| SearchError::VectorIndex(format!("Failed to connect to Qdrant: {}", e)))?;

        debug!("Connected to Qdrant");
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &QdrantConfig {
        &self.config
    }

    /// Create the product collection and its category index if missing.
    pub async fn ensure_collection(&self) -> Result<()> {
        let name = &self.config.index_name;
        if self.client.collection_exists(name).await? {
            debug!("Collection '{}' already exists", name);
            return Ok(());
        }

        info!(
            "Creating collection '{}' (vector={}, dim={})",
            name, self.config.vector_name, self.config.dimension
        );

        let mut map = HashMap::new();
        map.insert(
            self.config.vector_name.clone(),
            VectorParams {
                size: self.config.dimension,
                distance: Distance::Cosine.into(),
                ..Default::default()
            },
        );
        let vectors_config = VectorsConfig {
            config: Some(Config::ParamsMap(VectorParamsMap { map })),
        };

        self.client
            .create_collection(CreateCollectionBuilder::new(name).vectors_config(vectors_config))
            .await?;

        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                name,
                fields::CATEGORIES,
                FieldType::Keyword,
            ))
            .await?;

        Ok(())
    }

    /// Number of points in the collection.
    pub async fn count(&self) -> Result<u64> {
        use qdrant_client::qdrant::CountPointsBuilder;

        let response = self
            .client
            .count(CountPointsBuilder::new(&self.config.index_name).exact(true))
            .await?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn query(&self, query: &VectorQuery) -> Result<Vec<VectorHit>> {
        let mut request = SearchPointsBuilder::new(
            &self.config.index_name,
            query.vector.clone(),
            query.limit as u64,
        )
        .vector_name(&self.config.vector_name)
        .params(SearchParamsBuilder::default().hnsw_ef(query.num_candidates as u64))
        .with_payload(true);

        if let Some(filter) = categories_filter(&query.categories_all) {
            request = request.filter(filter);
        }

        let response = self.client.search_points(request).await?;

        let hits = response
            .result
            .into_iter()
            .filter_map(|point| {
                let product = payload_to_product(&point.payload)?;
                Some(VectorHit {
                    id: product.id.clone(),
                    product,
                    score: point.score,
                })
            })
            .collect();

        Ok(hits)
    }

    async fn upsert(&self, product: &Product, vector: &[f32]) -> Result<()> {
        let mut vectors = HashMap::new();
        vectors.insert(self.config.vector_name.clone(), vector.to_vec());

        let point = PointStruct::new(point_id(&product.id), vectors, product_payload(product)?);

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.config.index_name, vec![point]).wait(true))
            .await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "qdrant"
    }
}
