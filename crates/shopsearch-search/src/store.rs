//! Product document store
//!
//! [`DocumentStore`] is the narrow read/write surface the search engines and
//! the backfill job need from the catalog. [`SqliteProductStore`] implements
//! it on a single SQLite file: categories and embeddings are JSON columns,
//! category containment uses `json_each`, and pattern matching uses a
//! registered `REGEXP` function backed by the `regex` crate.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Type, Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::error::{Result, SearchError};
use crate::schema::Product;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Table definition
const SCHEMA_CREATE_PRODUCTS: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    price REAL,
    image_url TEXT,
    slug TEXT,
    external_id TEXT,
    sku TEXT,
    categories TEXT NOT NULL DEFAULT '[]',
    embedding TEXT
)
"#;

const SCHEMA_CREATE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_products_name_ci ON products (lower(name));
CREATE INDEX IF NOT EXISTS idx_products_slug ON products (slug);
"#;

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.description, p.price, p.image_url, p.slug, \
     p.external_id, p.sku, p.categories, p.embedding";

/// Text fields a pattern can be matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductField {
    Name,
    Description,
    Slug,
    /// Matches if any single category label matches
    Categories,
}

impl ProductField {
    /// Fields consulted by lexical search.
    pub const LEXICAL: [ProductField; 3] = [
        ProductField::Name,
        ProductField::Slug,
        ProductField::Categories,
    ];

    fn predicate(self, param: usize) -> String {
        match self {
            ProductField::Name => format!("p.name REGEXP ?{}", param),
            ProductField::Description => format!("p.description REGEXP ?{}", param),
            ProductField::Slug => format!("p.slug REGEXP ?{}", param),
            ProductField::Categories => format!(
                "EXISTS (SELECT 1 FROM json_each(p.categories) c WHERE c.value REGEXP ?{})",
                param
            ),
        }
    }
}

/// Regex applied to any of several fields (logical OR)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPattern {
    pub fields: Vec<ProductField>,
    pub pattern: String,
}

/// Conjunctive catalog query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuery {
    /// Every listed category must be present on the product
    pub categories_all: Vec<String>,
    pub pattern: Option<FieldPattern>,
    /// `None` returns every match
    pub limit: Option<usize>,
}

impl ProductQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn categories_all<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories_all = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn pattern(mut self, fields: &[ProductField], pattern: impl Into<String>) -> Self {
        self.pattern = Some(FieldPattern {
            fields: fields.to_vec(),
            pattern: pattern.into(),
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Catalog operations used by search and backfill
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Product>>;

    /// All products in store order.
    async fn find_all(&self) -> Result<Vec<Product>>;

    /// Products satisfying every clause of `query`, in store order.
    async fn find_matching(&self, query: &ProductQuery) -> Result<Vec<Product>>;

    async fn find_matching_categories_all(&self, categories: &[String]) -> Result<Vec<Product>> {
        self.find_matching(&ProductQuery::new().categories_all(categories.iter().cloned()))
            .await
    }

    async fn find_matching_pattern(
        &self,
        fields: &[ProductField],
        pattern: &str,
    ) -> Result<Vec<Product>> {
        self.find_matching(&ProductQuery::new().pattern(fields, pattern))
            .await
    }

    /// First product whose name equals `name` ignoring ASCII case.
    async fn find_by_name_ci(&self, name: &str) -> Result<Option<Product>>;

    /// Insert or replace a product. An existing embedding is kept when
    /// `product.embedding` is `None`.
    async fn upsert(&self, product: &Product) -> Result<()>;

    /// Overwrite the embedding of an existing product.
    async fn save_embedding(&self, id: &str, embedding: &[f32]) -> Result<()>;

    async fn count(&self) -> Result<usize>;

    async fn count_missing_embeddings(&self) -> Result<usize>;
}

/// SQLite-backed [`DocumentStore`]
#[derive(Clone)]
pub struct SqliteProductStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteProductStore {
    /// Open (creating if needed) the catalog at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::initialize(conn)
    }

    /// In-memory catalog (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        register_regexp(&conn)?;
        conn.execute(SCHEMA_CREATE_PRODUCTS, [])?;
        conn.execute_batch(SCHEMA_CREATE_INDEXES)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| SearchError::Store("connection mutex poisoned".into()))?;
            f(&guard)
        })
        .await?
    }
}

impl std::fmt::Debug for SqliteProductStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteProductStore").finish_non_exhaustive()
    }
}

/// `regexp(pattern, text)`, so that `text REGEXP pattern` works.
///
/// The compiled pattern is cached per statement. NULL text never matches.
fn register_regexp(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let regex: Arc<Regex> = ctx.get_or_create_aux(0, |vr| -> std::result::Result<_, BoxError> {
                Ok(Regex::new(vr.as_str()?)?)
            })?;
            let is_match = match ctx.get_raw(1) {
                ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                    .map(|text| regex.is_match(text))
                    .unwrap_or(false),
                _ => false,
            };
            Ok(is_match)
        },
    )?;
    Ok(())
}

/// SQL and bound values for a [`ProductQuery`].
fn build_match_sql(query: &ProductQuery) -> Result<(String, Vec<Value>)> {
    let mut sql = format!("SELECT {} FROM products p WHERE 1 = 1", PRODUCT_COLUMNS);
    let mut values: Vec<Value> = Vec::new();

    if !query.categories_all.is_empty() {
        values.push(Value::Text(serde_json::to_string(&query.categories_all)?));
        sql.push_str(&format!(
            " AND NOT EXISTS (SELECT 1 FROM json_each(?{n}) req \
             WHERE req.value NOT IN (SELECT c.value FROM json_each(p.categories) c))",
            n = values.len()
        ));
    }

    if let Some(pattern) = &query.pattern {
        if pattern.fields.is_empty() {
            return Err(SearchError::InvalidInput(
                "pattern query names no fields".into(),
            ));
        }
        values.push(Value::Text(pattern.pattern.clone()));
        let n = values.len();
        let clauses: Vec<String> = pattern.fields.iter().map(|f| f.predicate(n)).collect();
        sql.push_str(&format!(" AND ({})", clauses.join(" OR ")));
    }

    // Negative LIMIT means unbounded in SQLite
    let limit = query
        .limit
        .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
        .unwrap_or(-1);
    values.push(Value::Integer(limit));
    sql.push_str(&format!(" ORDER BY p.rowid LIMIT ?{}", values.len()));

    Ok((sql, values))
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_product(row: &Row<'_>) -> rusqlite::Result<Product> {
    let embedding: Option<String> = row.get(9)?;
    let embedding = match embedding {
        Some(text) => Some(serde_json::from_str::<Vec<f32>>(&text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e))
        })?),
        None => None,
    };

    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        image_url: row.get(4)?,
        slug: row.get(5)?,
        external_id: row.get(6)?,
        sku: row.get(7)?,
        categories: json_column(row, 8)?,
        embedding,
    })
}

fn query_products(conn: &Connection, sql: &str, values: Vec<Value>) -> Result<Vec<Product>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params_from_iter(values), row_to_product)?;
    let products = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(products)
}

#[async_trait]
impl DocumentStore for SqliteProductStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Product>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let sql = format!("SELECT {} FROM products p WHERE p.id = ?1", PRODUCT_COLUMNS);
            let product = conn
                .query_row(&sql, [&id], row_to_product)
                .optional()?;
            Ok(product)
        })
        .await
    }

    async fn find_all(&self) -> Result<Vec<Product>> {
        self.find_matching(&ProductQuery::new()).await
    }

    async fn find_matching(&self, query: &ProductQuery) -> Result<Vec<Product>> {
        let (sql, values) = build_match_sql(query)?;
        debug!("Catalog query: {}", sql);
        self.with_conn(move |conn| query_products(conn, &sql, values))
            .await
    }

    async fn find_by_name_ci(&self, name: &str) -> Result<Option<Product>> {
        let name = name.trim().to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM products p WHERE lower(p.name) = lower(?1) ORDER BY p.rowid LIMIT 1",
                PRODUCT_COLUMNS
            );
            let product = conn
                .query_row(&sql, [&name], row_to_product)
                .optional()?;
            Ok(product)
        })
        .await
    }

    async fn upsert(&self, product: &Product) -> Result<()> {
        if product.id.trim().is_empty() {
            return Err(SearchError::InvalidInput("product id is blank".into()));
        }
        let product = product.clone();
        let categories = serde_json::to_string(&product.categories)?;
        let embedding = product
            .embedding
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO products (id, name, description, price, image_url, slug, \
                 external_id, sku, categories, embedding) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
                 ON CONFLICT(id) DO UPDATE SET \
                    name = excluded.name, \
                    description = excluded.description, \
                    price = excluded.price, \
                    image_url = excluded.image_url, \
                    slug = excluded.slug, \
                    external_id = excluded.external_id, \
                    sku = excluded.sku, \
                    categories = excluded.categories, \
                    embedding = COALESCE(excluded.embedding, products.embedding)",
                params![
                    product.id,
                    product.name,
                    product.description,
                    product.price,
                    product.image_url,
                    product.slug,
                    product.external_id,
                    product.sku,
                    categories,
                    embedding,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn save_embedding(&self, id: &str, embedding: &[f32]) -> Result<()> {
        let id = id.to_string();
        let embedding = serde_json::to_string(embedding)?;
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE products SET embedding = ?2 WHERE id = ?1",
                params![id, embedding],
            )?;
            if changed == 0 {
                return Err(SearchError::Store(format!("product not found: {}", id)));
            }
            Ok(())
        })
        .await
    }

    async fn count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
            Ok(n as usize)
        })
        .await
    }

    async fn count_missing_embeddings(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM products WHERE embedding IS NULL OR embedding = '[]'",
                [],
                |row| row.get(0),
            )?;
            Ok(n as usize)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn seeded_store() -> SqliteProductStore {
        let store = SqliteProductStore::open_in_memory().unwrap();
        let products = [
            Product::new("1", "Desk Lamp")
                .with_slug("desk-lamp")
                .with_categories(["Lighting", "Office"]),
            Product::new("2", "Table").with_categories(["Furniture"]),
            Product::new("3", "Floor Lamp")
                .with_slug("floor-lamp")
                .with_categories(["Lighting"]),
            Product::new("4", "Office Chair")
                .with_description("ergonomic mesh")
                .with_categories(["Furniture", "Office"]),
        ];
        for product in &products {
            store.upsert(product).await.unwrap();
        }
        store
    }

    fn ids(products: &[Product]) -> Vec<&str> {
        products.iter().map(|p| p.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_find_all_in_insert_order() {
        let store = seeded_store().await;
        let all = store.find_all().await.unwrap();
        assert_eq!(ids(&all), vec!["1", "2", "3", "4"]);
        assert_eq!(store.count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_find_by_id_roundtrip() {
        let store = seeded_store().await;
        let product = store.find_by_id("1").await.unwrap().unwrap();
        assert_eq!(product.name, "Desk Lamp");
        assert_eq!(product.slug.as_deref(), Some("desk-lamp"));
        assert_eq!(product.categories, vec!["Lighting", "Office"]);
        assert!(store.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_categories_all_semantics() {
        let store = seeded_store().await;
        let found = store
            .find_matching_categories_all(&["Office".into(), "Furniture".into()])
            .await
            .unwrap();
        assert_eq!(ids(&found), vec!["4"]);

        let found = store
            .find_matching_categories_all(&["Lighting".into()])
            .await
            .unwrap();
        assert_eq!(ids(&found), vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_pattern_over_fields() {
        let store = seeded_store().await;
        let found = store
            .find_matching_pattern(&ProductField::LEXICAL, "(?i)(?:lamp|lamps)")
            .await
            .unwrap();
        assert_eq!(ids(&found), vec!["1", "3"]);

        // Category labels match individually
        let found = store
            .find_matching_pattern(&[ProductField::Categories], "(?i)^furniture$")
            .await
            .unwrap();
        assert_eq!(ids(&found), vec!["2", "4"]);

        // Description is not a lexical field
        let found = store
            .find_matching_pattern(&ProductField::LEXICAL, "(?i)mesh")
            .await
            .unwrap();
        assert!(found.is_empty());
        let found = store
            .find_matching_pattern(&[ProductField::Description], "(?i)mesh")
            .await
            .unwrap();
        assert_eq!(ids(&found), vec!["4"]);
    }

    #[tokio::test]
    async fn test_conjunctive_query_with_limit() {
        let store = seeded_store().await;
        let query = ProductQuery::new()
            .categories_all(["Office"])
            .pattern(&ProductField::LEXICAL, "(?i)lamp");
        assert_eq!(ids(&store.find_matching(&query).await.unwrap()), vec!["1"]);

        let query = ProductQuery::new().limit(2);
        assert_eq!(ids(&store.find_matching(&query).await.unwrap()), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_invalid_pattern_is_store_error() {
        let store = seeded_store().await;
        let err = store
            .find_matching_pattern(&[ProductField::Name], "(unclosed")
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Store(_)));
    }

    #[tokio::test]
    async fn test_embeddings() {
        let store = seeded_store().await;
        assert_eq!(store.count_missing_embeddings().await.unwrap(), 4);

        store.save_embedding("2", &[0.5, 0.25]).await.unwrap();
        let product = store.find_by_id("2").await.unwrap().unwrap();
        assert_eq!(product.embedding, Some(vec![0.5, 0.25]));
        assert_eq!(store.count_missing_embeddings().await.unwrap(), 3);

        // Upsert without an embedding keeps the stored one
        store
            .upsert(&Product::new("2", "Dining Table"))
            .await
            .unwrap();
        let product = store.find_by_id("2").await.unwrap().unwrap();
        assert_eq!(product.name, "Dining Table");
        assert!(product.has_embedding());

        let err = store.save_embedding("nope", &[1.0]).await.unwrap_err();
        assert!(matches!(err, SearchError::Store(_)));
    }

    #[tokio::test]
    async fn test_find_by_name_case_insensitive() {
        let store = seeded_store().await;
        let found = store.find_by_name_ci("desk lamp").await.unwrap().unwrap();
        assert_eq!(found.id, "1");
        assert!(store.find_by_name_ci("lamp").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("catalog.db");
        {
            let store = SqliteProductStore::open(&path).unwrap();
            store.upsert(&Product::new("a", "Rug")).await.unwrap();
        }
        let store = SqliteProductStore::open(&path).unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
