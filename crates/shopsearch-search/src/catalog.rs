//! Catalog import from JSON
//!
//! Accepts an array of products either in the native shape
//! (`name`, `imageUrl`, `categories`, ...) or in the fake-store feed shape
//! (`title`, `image`, `category`). Products whose name already exists in the
//! store (ignoring case) are skipped.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{Result, SearchError};
use crate::schema::Product;
use crate::store::DocumentStore;

/// One record of either supported shape
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogRecord {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default, alias = "title")]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default, alias = "image")]
    image_url: Option<String>,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    external_id: Option<String>,
    #[serde(default)]
    sku: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    category: Option<String>,
}

/// Counters reported by an import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub added: usize,
    pub skipped: usize,
}

/// URL slug: lowercase ASCII alphanumeric runs joined by `-`.
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Deterministic id derived from a product name.
pub fn derive_id(name: &str) -> String {
    let digest = Sha256::digest(name.trim().to_lowercase().as_bytes());
    digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
}

impl CatalogRecord {
    fn into_product(self) -> Option<Product> {
        let name = self.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())?;

        let id = match self.id {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => derive_id(&name),
        };
        let slug = self
            .slug
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| slugify(&name));

        let categories = self.categories.into_iter().chain(self.category);

        let mut product = Product::new(id, name)
            .with_description(self.description.unwrap_or_default())
            .with_slug(slug)
            .with_categories(categories);
        product.price = self.price;
        product.image_url = self.image_url;
        product.external_id = self.external_id;
        product.sku = self.sku;
        Some(product)
    }
}

/// Parse a JSON array of products. Records without a name are dropped.
pub fn parse_catalog(json: &str) -> Result<Vec<Product>> {
    let records: Vec<CatalogRecord> = serde_json::from_str(json)?;
    let total = records.len();
    let products: Vec<Product> = records
        .into_iter()
        .filter_map(CatalogRecord::into_product)
        .collect();
    if products.len() < total {
        debug!("Dropped {} records without a name", total - products.len());
    }
    Ok(products)
}

/// Add `products` that are not already present by name.
///
/// A feed id already held by a differently named product is replaced with
/// [`derive_id`]; the record is skipped when that id is taken as well.
/// Existing products are never overwritten.
pub async fn import_products(
    store: &dyn DocumentStore,
    products: Vec<Product>,
) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    for mut product in products {
        if store.find_by_name_ci(&product.name).await?.is_some() {
            debug!("Skipping existing product '{}'", product.name);
            stats.skipped += 1;
            continue;
        }
        if let Some(holder) = store.find_by_id(&product.id).await? {
            let fresh = derive_id(&product.name);
            if fresh == product.id || store.find_by_id(&fresh).await?.is_some() {
                debug!(
                    "Skipping '{}': id {} belongs to '{}'",
                    product.name, product.id, holder.name
                );
                stats.skipped += 1;
                continue;
            }
            debug!(
                "Id {} belongs to '{}', storing '{}' as {}",
                product.id, holder.name, product.name, fresh
            );
            product.id = fresh;
        }
        store.upsert(&product).await?;
        debug!("Added '{}' ({})", product.name, product.id);
        stats.added += 1;
    }

    info!(
        "Catalog import complete: added={} skipped={}",
        stats.added, stats.skipped
    );
    Ok(stats)
}

/// Read and import a catalog file.
pub async fn import_file(store: &dyn DocumentStore, path: &Path) -> Result<ImportStats> {
    let json = tokio::fs::read_to_string(path).await.map_err(|e| {
        SearchError::InvalidInput(format!("cannot read catalog {}: {}", path.display(), e))
    })?;
    let products = parse_catalog(&json)?;
    import_products(store, products).await
}
