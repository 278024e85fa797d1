//! Order-preserving deduplicating merge of two result lists

use std::collections::HashSet;

use crate::schema::{Product, ScoredCandidate};

/// Anything identified by a product id
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for Product {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for ScoredCandidate {
    fn key(&self) -> &str {
        &self.product.id
    }
}

/// `primary` then `secondary`, first occurrence per id wins, at most `limit` items.
///
/// Items with a blank id are skipped.
pub fn merge<T: Keyed>(primary: Vec<T>, secondary: Vec<T>, limit: usize) -> Vec<T> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::with_capacity(limit.min(primary.len() + secondary.len()));

    for item in primary.into_iter().chain(secondary) {
        if merged.len() >= limit {
            break;
        }
        let key = item.key().trim();
        if key.is_empty() || !seen.insert(key.to_string()) {
            continue;
        }
        merged.push(item);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn products(ids: &[&str]) -> Vec<Product> {
        ids.iter().map(|id| Product::new(*id, "x")).collect()
    }

    fn ids(products: &[Product]) -> Vec<&str> {
        products.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_merge_dedup_preserves_order() {
        let merged = merge(products(&["1", "2"]), products(&["2", "3"]), 10);
        assert_eq!(ids(&merged), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_merge_stops_at_limit() {
        let merged = merge(products(&["1", "2"]), products(&["3", "4"]), 3);
        assert_eq!(ids(&merged), vec!["1", "2", "3"]);
        assert!(merge(products(&["1"]), products(&["2"]), 0).is_empty());
    }

    #[test]
    fn test_merge_skips_blank_ids() {
        let merged = merge(products(&["", "1"]), products(&["  ", "1", "2"]), 10);
        assert_eq!(ids(&merged), vec!["1", "2"]);
    }

    #[test]
    fn test_first_occurrence_wins() {
        let primary = vec![ScoredCandidate::lexical(Product::new("1", "Lamp"))];
        let secondary = vec![
            ScoredCandidate::semantic(Product::new("1", "Lamp"), 0.9),
            ScoredCandidate::semantic(Product::new("2", "Shade"), 0.8),
        ];
        let merged = merge(primary, secondary, 10);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].score, None);
        assert_eq!(merged[1].product_id(), "2");
    }
}
