//! Query expansion for lexical and semantic search
//!
//! Turns a raw query into an ordered, deduplicated token set covering
//! singular/plural variants and a small synonym table. The same token set
//! drives the lexical pattern, the embedding text, and the lexical rescue
//! check in semantic search, so all three agree on what "matches" means.
//!
//! # Example
//!
//! ```ignore
//! use shopsearch_search::expand::expand;
//!
//! let expanded = expand("Running Shoe");
//! assert!(expanded.contains("sneakers"));
//! let pattern = expanded.pattern(); // (?i)(?:running|runnings|shoe|shoes|...)
//! ```

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, SearchError};
use crate::schema::Product;

/// Tokens shorter than this never trigger a lexical rescue
pub const MIN_RESCUE_TOKEN_CHARS: usize = 3;

/// Synonym groups; any member present pulls in the whole group
const SYNONYM_GROUPS: &[&[&str]] = &[
    &["shoe", "shoes", "sneaker", "sneakers", "footwear"],
    &["sofa", "sofas", "couch", "couches"],
    &["tv", "tvs", "television", "televisions"],
    &["phone", "phones", "smartphone", "smartphones"],
    &["laptop", "laptops", "notebook", "notebooks"],
    &["tshirt", "tshirts", "tee", "tees"],
    &["jacket", "jackets", "coat", "coats"],
    &["bag", "bags", "backpack", "backpacks"],
];

/// Token → synonym group index
static SYNONYM_INDEX: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    SYNONYM_GROUPS
        .iter()
        .enumerate()
        .flat_map(|(idx, group)| group.iter().map(move |token| (*token, idx)))
        .collect()
});

/// Strip a single trailing "s".
///
/// Tokens of three characters or fewer and tokens ending in "ss" are
/// returned unchanged. Words ending in "es" keep the "e" ("boxes" → "boxe").
pub fn singularize(token: &str) -> String {
    if token.chars().count() <= 3 || token.ends_with("ss") {
        return token.to_string();
    }
    match token.strip_suffix('s') {
        Some(stem) => stem.to_string(),
        None => token.to_string(),
    }
}

/// Append "s" unless the token is two characters or fewer or already ends in "s".
pub fn pluralize(token: &str) -> String {
    if token.chars().count() <= 2 || token.ends_with('s') {
        return token.to_string();
    }
    format!("{}s", token)
}

/// Result of expanding a raw query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedQuery {
    original: String,
    tokens: Vec<String>,
}

impl ExpandedQuery {
    /// The trimmed query as typed.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Expansion tokens, lowercased, in first-seen order.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    /// Text sent to the embedding provider: the literal query followed by its variants.
    pub fn embedding_text(&self) -> String {
        if self.tokens.is_empty() {
            return self.original.clone();
        }
        format!("{} {}", self.original, self.tokens.join(" "))
            .trim()
            .to_string()
    }

    /// Case-insensitive alternation over the escaped tokens.
    ///
    /// Falls back to the escaped literal query when there are no tokens.
    pub fn pattern(&self) -> String {
        if self.tokens.is_empty() {
            return format!("(?i){}", regex::escape(&self.original));
        }
        let alternatives: Vec<String> = self.tokens.iter().map(|t| regex::escape(t)).collect();
        format!("(?i)(?:{})", alternatives.join("|"))
    }

    /// Compiled form of [`ExpandedQuery::pattern`].
    pub fn regex(&self) -> Result<Regex> {
        Regex::new(&self.pattern())
            .map_err(|e| SearchError::InvalidInput(format!("query pattern rejected: {}", e)))
    }

    /// Substring match of any token (at least three characters) against
    /// name, slug or a category label.
    pub fn matches_product(&self, product: &Product) -> bool {
        let name = product.name.to_lowercase();
        let slug = product.slug.as_deref().unwrap_or_default().to_lowercase();
        let categories: Vec<String> = product
            .categories
            .iter()
            .map(|c| c.to_lowercase())
            .collect();

        self.tokens
            .iter()
            .filter(|t| t.chars().count() >= MIN_RESCUE_TOKEN_CHARS)
            .any(|t| {
                name.contains(t.as_str())
                    || slug.contains(t.as_str())
                    || categories.iter().any(|c| c.contains(t.as_str()))
            })
    }
}

/// Expand a raw query.
///
/// Deterministic and side-effect free. Blank input yields an empty token set.
pub fn expand(raw: &str) -> ExpandedQuery {
    let original = raw.trim().to_string();
    let normalized = original.to_lowercase();

    let mut tokens: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut push = |token: String, tokens: &mut Vec<String>| {
        if !token.is_empty() && seen.insert(token.clone()) {
            tokens.push(token);
        }
    };

    for word in normalized.split_whitespace() {
        push(word.to_string(), &mut tokens);
        push(singularize(word), &mut tokens);
        push(pluralize(word), &mut tokens);
    }

    let mut groups: Vec<usize> = Vec::new();
    for token in &tokens {
        if let Some(&idx) = SYNONYM_INDEX.get(token.as_str()) {
            if !groups.contains(&idx) {
                groups.push(idx);
            }
        }
    }
    for idx in groups {
        for synonym in SYNONYM_GROUPS[idx] {
            push((*synonym).to_string(), &mut tokens);
        }
    }

    ExpandedQuery { original, tokens }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("cats"), "cat");
        assert_eq!(singularize("cup"), "cup");
        assert_eq!(singularize("bus"), "bus");
        assert_eq!(singularize("glass"), "glass");
        assert_eq!(singularize("lamp"), "lamp");
        assert_eq!(singularize("boxes"), "boxe");
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("tv"), "tv");
        assert_eq!(pluralize("cup"), "cups");
        assert_eq!(pluralize("shoes"), "shoes");
        assert_eq!(pluralize("glass"), "glass");
    }

    #[test]
    fn test_expand_synonyms() {
        let expanded = expand("shoe");
        for token in ["shoe", "shoes", "sneaker", "sneakers", "footwear"] {
            assert!(expanded.contains(token), "missing {}", token);
        }
    }

    #[test]
    fn test_expand_order_and_dedup() {
        let expanded = expand("  Desk LAMPS desk ");
        assert_eq!(expanded.original(), "Desk LAMPS desk");
        assert_eq!(expanded.tokens(), &["desk", "desks", "lamps", "lamp"]);
    }

    #[test]
    fn test_expand_blank() {
        let expanded = expand("   ");
        assert!(expanded.is_empty());
        assert_eq!(expanded.embedding_text(), "");
    }

    #[test]
    fn test_expand_is_deterministic() {
        assert_eq!(expand("red couch"), expand("red couch"));
    }

    #[test]
    fn test_embedding_text() {
        let expanded = expand("Lamp");
        assert_eq!(expanded.embedding_text(), "Lamp lamp lamps");
    }

    #[test]
    fn test_pattern_escapes_tokens() {
        let expanded = expand("c++ (beta)");
        let pattern = expanded.pattern();
        assert!(pattern.starts_with("(?i)(?:"));
        assert!(pattern.contains(r"c\+\+"));
        assert!(pattern.contains(r"\(beta\)"));

        let regex = expanded.regex().unwrap();
        assert!(regex.is_match("Learn C++ fast"));
        assert!(!regex.is_match("c"));
    }

    #[test]
    fn test_pattern_fallback_to_literal() {
        let expanded = expand("");
        assert_eq!(expanded.pattern(), "(?i)");
    }

    #[test]
    fn test_matches_product() {
        let lamp = Product::new("1", "Desk Lamp");
        let table = Product::new("2", "Oak Table").with_categories(["Furniture"]);
        let sneaker = Product::new("3", "Trail Runner").with_slug("trail-sneaker");

        let expanded = expand("lamps");
        assert!(expanded.matches_product(&lamp));
        assert!(!expanded.matches_product(&table));

        assert!(expand("furniture").matches_product(&table));
        assert!(expand("shoe").matches_product(&sneaker));
    }

    #[test]
    fn test_short_tokens_do_not_rescue() {
        let product = Product::new("1", "Smart TV Stand");
        assert!(!expand("tv").matches_product(&product));
    }
}
