//! Status command - Catalog counts, vector backend and provider health

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use shopsearch_config::VectorBackend;
use shopsearch_search::{DocumentStore, QdrantIndex};

use super::{to_qdrant_config, to_search_embedding_config, Session};
use crate::progress;
use crate::GlobalOptions;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Skip the embedding provider probe
    #[arg(long)]
    no_probe: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct ProviderReport {
    provider: String,
    model: String,
    enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimension: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct VectorReport {
    backend: String,
    index_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    points: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    workspace: String,
    database: String,
    products: usize,
    missing_embeddings: usize,
    vector: VectorReport,
    embedding: ProviderReport,
}

/// Execute the status command
pub async fn execute(args: StatusArgs, global: GlobalOptions) -> Result<()> {
    let session = Session::open(&global)?;
    let quiet = global.quiet || args.json;

    let products = session.store.count().await?;
    let missing_embeddings = session.store.count_missing_embeddings().await?;

    let vector = vector_report(&session).await;
    let embedding = provider_report(&session, args.no_probe, quiet).await?;

    let report = StatusReport {
        workspace: session.workspace.display().to_string(),
        database: session.db_path().display().to_string(),
        products,
        missing_embeddings,
        vector,
        embedding,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

async fn vector_report(session: &Session) -> VectorReport {
    let vector = &session.config.vector;
    let mut report = VectorReport {
        backend: vector.backend.to_string(),
        index_name: vector.index_name.clone(),
        url: None,
        points: None,
        error: None,
    };

    if vector.backend == VectorBackend::Qdrant {
        report.url = Some(vector.url.clone());
        let count = match QdrantIndex::connect(to_qdrant_config(&session.config)).await {
            Ok(index) => index.count().await,
            Err(e) => Err(e),
        };
        match count {
            Ok(points) => report.points = Some(points),
            Err(e) => report.error = Some(e.to_string()),
        }
    }
    report
}

async fn provider_report(
    session: &Session,
    no_probe: bool,
    quiet: bool,
) -> Result<ProviderReport> {
    let config = to_search_embedding_config(&session.config);
    let client = session.embedding_client()?;

    let mut report = ProviderReport {
        provider: config.provider.to_string(),
        model: config.model.clone().unwrap_or_default(),
        enabled: client.is_enabled(),
        available: None,
        latency_ms: None,
        dimension: None,
        error: None,
    };

    if !client.is_enabled() || no_probe {
        return Ok(report);
    }

    let spinner = progress::spinner("Probing embedding provider", quiet);
    match client.check_status().await {
        Ok(status) => {
            if status.available {
                progress::finish_spinner(spinner, "Embedding provider reachable");
            } else {
                progress::finish_spinner_warn(spinner, "Embedding provider unavailable");
            }
            report.available = Some(status.available);
            report.latency_ms = status.latency_ms;
            report.dimension = status.dimension;
            report.error = status.error;
        }
        Err(e) => {
            progress::finish_spinner_warn(spinner, "Embedding provider unavailable");
            report.available = Some(false);
            report.error = Some(e.to_string());
        }
    }
    Ok(report)
}

fn print_report(report: &StatusReport) {
    println!("ShopSearch Status");
    println!("=================");
    println!();
    println!("Workspace: {}", report.workspace);
    println!("Database:  {}", report.database);
    println!();
    println!("Catalog:");
    println!("  Products:           {}", report.products);
    println!("  Missing embeddings: {}", report.missing_embeddings);
    println!();

    let vector = &report.vector;
    println!("Vector index:");
    println!("  Backend: {}", vector.backend);
    println!("  Index:   {}", vector.index_name);
    if let Some(url) = &vector.url {
        println!("  URL:     {}", url);
    }
    if let Some(points) = vector.points {
        println!("  Points:  {}", points);
    }
    if let Some(error) = &vector.error {
        println!("  Error:   {}", error);
    }
    println!();

    let embedding = &report.embedding;
    println!("Embeddings:");
    println!("  Provider: {}", embedding.provider);
    println!("  Model:    {}", embedding.model);
    if !embedding.enabled {
        println!("  Status:   disabled (no API key)");
        return;
    }
    match embedding.available {
        Some(true) => {
            let latency = embedding
                .latency_ms
                .map(|ms| format!(" in {}ms", ms))
                .unwrap_or_default();
            println!("  Status:   available{}", latency);
        }
        Some(false) => println!("  Status:   unavailable"),
        None => println!("  Status:   enabled (not probed)"),
    }
    if let Some(dimension) = embedding.dimension {
        println!("  Dimension: {}", dimension);
    }
    if let Some(error) = &embedding.error {
        println!("  Error:    {}", error);
    }
}
