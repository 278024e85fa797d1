//! Search command - Lexical and hybrid product search

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;
use shopsearch_search::{
    EmbeddingClient, ExactVectorIndex, LexicalSearchEngine, ScoredCandidate, SearchMode,
    SearchOrchestrator, SearchOutcome, SearchPath, SearchQuery, SemanticSearchEngine,
};
use tracing::warn;

use super::{print_warning, to_orchestrator_config, to_semantic_config, Session};
use crate::GlobalOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Pattern matching only (default)
    Lexical,
    /// Vector similarity merged with pattern matches
    Semantic,
}

impl From<Mode> for SearchMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Lexical => SearchMode::Lexical,
            Mode::Semantic => SearchMode::Semantic,
        }
    }
}

/// Arguments for the search command
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search text (may be empty to list by category)
    #[arg(default_value = "")]
    query: String,

    /// Search mode
    #[arg(long, short = 'm', value_enum, default_value = "lexical")]
    mode: Mode,

    /// Require this category (repeatable; all must match)
    #[arg(long = "category", short = 'C')]
    categories: Vec<String>,

    /// Maximum number of results (default from config)
    #[arg(long, short = 'n')]
    limit: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct ResultRow<'a> {
    rank: usize,
    id: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    slug: Option<&'a str>,
    categories: &'a [String],
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f32>,
}

impl<'a> ResultRow<'a> {
    fn new(rank: usize, hit: &'a ScoredCandidate) -> Self {
        Self {
            rank,
            id: &hit.product.id,
            name: &hit.product.name,
            price: hit.product.price,
            slug: hit.product.slug.as_deref(),
            categories: &hit.product.categories,
            source: hit.source.to_string(),
            score: hit.score,
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchReport<'a> {
    query: &'a str,
    mode: SearchMode,
    path: SearchPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback_reason: Option<&'a str>,
    results: Vec<ResultRow<'a>>,
}

async fn build_orchestrator(session: &Session, mode: Mode) -> Result<SearchOrchestrator> {
    let store = session.document_store();
    let tuning = &session.config.search;

    let semantic = if mode == Mode::Semantic {
        let client = session.embedding_client()?;
        match session.vector_index().await {
            Ok(index) => SemanticSearchEngine::new(client, index, to_semantic_config(tuning)),
            Err(e) => {
                warn!("Vector index unavailable: {:#}", e);
                SemanticSearchEngine::new(
                    Arc::new(EmbeddingClient::disabled(format!("{:#}", e))),
                    Arc::new(ExactVectorIndex::new(store.clone())),
                    to_semantic_config(tuning),
                )
            }
        }
    } else {
        // Never consulted for lexical requests
        SemanticSearchEngine::new(
            Arc::new(EmbeddingClient::disabled("lexical mode")),
            Arc::new(ExactVectorIndex::new(store.clone())),
            to_semantic_config(tuning),
        )
    };

    Ok(SearchOrchestrator::new(
        LexicalSearchEngine::new(store),
        semantic,
        to_orchestrator_config(tuning),
    ))
}

/// Execute the search command
pub async fn execute(args: SearchArgs, global: GlobalOptions) -> Result<()> {
    let session = Session::open(&global)?;
    let orchestrator = build_orchestrator(&session, args.mode).await?;

    let mut query = SearchQuery::new(args.query.clone())
        .mode(args.mode.into())
        .categories(args.categories.iter());
    if let Some(limit) = args.limit {
        query = query.limit(limit);
    }

    let outcome = orchestrator.search(&query).await.context("Search failed")?;

    if args.json {
        print_json(&args, &query, &outcome)?;
        return Ok(());
    }

    if let Some(reason) = outcome.fallback_reason.as_deref() {
        if !global.quiet {
            print_warning(&format!(
                "semantic search unavailable ({}); showing lexical results",
                reason
            ));
        }
    }

    if outcome.hits.is_empty() {
        if !global.quiet {
            eprintln!("No results found for: {}", args.query);
        }
        return Ok(());
    }

    if !global.quiet {
        println!(
            "Found {} results for \"{}\" ({}):\n",
            outcome.hits.len(),
            args.query,
            outcome.path
        );
    }

    for (i, hit) in outcome.hits.iter().enumerate() {
        let product = &hit.product;
        match hit.score {
            Some(score) => println!("{}. {} [{} {:.3}]", i + 1, product.name, hit.source, score),
            None => println!("{}. {} [{}]", i + 1, product.name, hit.source),
        }

        let mut details = vec![format!("id: {}", product.id)];
        if let Some(price) = product.price {
            details.push(format!("price: {:.2}", price));
        }
        if !product.categories.is_empty() {
            details.push(format!("categories: {}", product.categories.join(", ")));
        }
        println!("   {}", details.join("  "));
    }

    Ok(())
}

fn print_json(args: &SearchArgs, query: &SearchQuery, outcome: &SearchOutcome) -> Result<()> {
    let report = SearchReport {
        query: &args.query,
        mode: query.mode,
        path: outcome.path,
        fallback_reason: outcome.fallback_reason.as_deref(),
        results: outcome
            .hits
            .iter()
            .enumerate()
            .map(|(i, hit)| ResultRow::new(i + 1, hit))
            .collect(),
    };
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize results")?;
    println!("{}", json);
    Ok(())
}
