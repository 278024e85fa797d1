//! Lexical search over the document store
//!
//! Conjunctive filter: all requested categories, plus (for non-blank text)
//! the expanded query pattern against name, slug or any category label.
//! Results come back in store order; no relevance ranking is computed.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::expand::expand;
use crate::schema::{clamp_limit, Product};
use crate::store::{DocumentStore, ProductField, ProductQuery};

/// Pattern-matching search engine
#[derive(Clone)]
pub struct LexicalSearchEngine {
    store: Arc<dyn DocumentStore>,
}

impl LexicalSearchEngine {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Products matching every category and, if given, the query text.
    ///
    /// `limit` is clamped to `[1, 200]`. Store failures propagate.
    pub async fn search(
        &self,
        categories: &[String],
        text: &str,
        limit: usize,
    ) -> Result<Vec<Product>> {
        let query = build_query(categories, text, limit);
        debug!(
            "Lexical search: categories={:?} pattern={:?} limit={:?}",
            query.categories_all,
            query.pattern.as_ref().map(|p| p.pattern.as_str()),
            query.limit
        );
        self.store.find_matching(&query).await
    }
}

fn build_query(categories: &[String], text: &str, limit: usize) -> ProductQuery {
    let mut query = ProductQuery::new()
        .categories_all(categories.iter().filter(|c| !c.trim().is_empty()).cloned())
        .limit(clamp_limit(limit));

    if !text.trim().is_empty() {
        query = query.pattern(&ProductField::LEXICAL, expand(text).pattern());
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteProductStore;
    use pretty_assertions::assert_eq;

    async fn engine(products: &[Product]) -> LexicalSearchEngine {
        let store = SqliteProductStore::open_in_memory().unwrap();
        for product in products {
            store.upsert(product).await.unwrap();
        }
        LexicalSearchEngine::new(Arc::new(store))
    }

    fn ids(products: &[Product]) -> Vec<&str> {
        products.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_build_query() {
        let query = build_query(&["Home".into(), " ".into()], "  ", 0);
        assert_eq!(query.categories_all, vec!["Home".to_string()]);
        assert!(query.pattern.is_none());
        assert_eq!(query.limit, Some(1));

        let query = build_query(&[], "lamp", 500);
        assert_eq!(query.limit, Some(200));
        assert_eq!(
            query.pattern.unwrap().pattern,
            "(?i)(?:lamp|lamps)".to_string()
        );
    }

    #[tokio::test]
    async fn test_text_match() {
        let engine = engine(&[Product::new("1", "Desk Lamp"), Product::new("2", "Table")]).await;
        let found = engine.search(&[], "lamp", 10).await.unwrap();
        assert_eq!(ids(&found), vec!["1"]);
    }

    #[tokio::test]
    async fn test_plural_and_synonym_expansion() {
        let engine = engine(&[
            Product::new("1", "Trail Sneakers"),
            Product::new("2", "Leather Couch"),
            Product::new("3", "Wall Clock"),
        ])
        .await;

        assert_eq!(ids(&engine.search(&[], "shoe", 10).await.unwrap()), vec!["1"]);
        assert_eq!(ids(&engine.search(&[], "Sofas", 10).await.unwrap()), vec!["2"]);
    }

    #[tokio::test]
    async fn test_categories_contain_all() {
        let engine = engine(&[
            Product::new("1", "Bench").with_categories(["A", "B"]),
            Product::new("2", "Stool").with_categories(["A"]),
            Product::new("3", "Shelf").with_categories(["B", "C", "A"]),
        ])
        .await;

        let found = engine
            .search(&["A".into(), "B".into()], "", 10)
            .await
            .unwrap();
        assert_eq!(ids(&found), vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_matches_slug_and_category() {
        let engine = engine(&[
            Product::new("1", "Model X").with_slug("standing-desk"),
            Product::new("2", "Model Y").with_categories(["Desks"]),
            Product::new("3", "Model Z"),
        ])
        .await;

        let found = engine.search(&[], "desk", 10).await.unwrap();
        assert_eq!(ids(&found), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_regex_metacharacters_are_literal() {
        let engine = engine(&[
            Product::new("1", "C++ Primer"),
            Product::new("2", "Cat Bed"),
        ])
        .await;

        let found = engine.search(&[], "c++", 10).await.unwrap();
        assert_eq!(ids(&found), vec!["1"]);
    }

    #[tokio::test]
    async fn test_limit_clamped() {
        let products: Vec<Product> = (0..5)
            .map(|i| Product::new(i.to_string(), format!("Lamp {}", i)))
            .collect();
        let engine = engine(&products).await;

        assert_eq!(engine.search(&[], "lamp", 2).await.unwrap().len(), 2);
        assert_eq!(engine.search(&[], "lamp", 0).await.unwrap().len(), 1);
    }
}
