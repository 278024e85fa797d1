//! Backfill command - Embed catalog products

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use shopsearch_config::VectorBackend;
use shopsearch_search::{EmbeddingBackfillJob, QdrantIndex};

use super::{print_info, to_backfill_options, to_qdrant_config, Session};
use crate::progress;
use crate::GlobalOptions;

/// Arguments for the backfill command
#[derive(Args, Debug)]
pub struct BackfillArgs {
    /// Re-embed products that already have a vector
    #[arg(long)]
    force: bool,

    /// Stop after this many products (0 = all)
    #[arg(long, short = 'n')]
    limit: Option<usize>,

    /// Minimum milliseconds between provider calls
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Output counters as JSON
    #[arg(long)]
    json: bool,
}

/// Execute the backfill command
pub async fn execute(args: BackfillArgs, global: GlobalOptions) -> Result<()> {
    let mut session = Session::open(&global)?;

    let backfill = &mut session.config.backfill;
    backfill.force |= args.force;
    if let Some(limit) = args.limit {
        backfill.limit = limit;
    }
    if let Some(delay_ms) = args.delay_ms {
        backfill.delay_ms = delay_ms;
    }
    let options = to_backfill_options(&session.config.backfill);

    let client = session.embedding_client()?;
    let mut job = EmbeddingBackfillJob::new(session.document_store(), client, options);

    if session.config.vector.backend == VectorBackend::Qdrant {
        let index = QdrantIndex::connect(to_qdrant_config(&session.config))
            .await
            .context("Failed to connect to Qdrant")?;
        index
            .ensure_collection()
            .await
            .context("Failed to prepare Qdrant collection")?;
        job = job.with_index(Arc::new(index));
    }

    let quiet = global.quiet || args.json;
    let bar = progress::progress_bar(0, "Embedding", quiet);
    if let Some(pb) = bar.clone() {
        job = job.with_progress(move |done, total| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        });
    }

    print_info(
        &format!("Backfilling embeddings in {}", session.db_path().display()),
        quiet,
    );
    let result = job.run().await;
    progress::finish_progress(bar);
    let stats = result.context("Embedding backfill failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Processed: {}", stats.processed);
    println!("Updated:   {}", stats.updated);
    println!("Skipped:   {}", stats.skipped);
    println!("Failed:    {}", stats.failed);
    println!(
        "Missing embeddings: {} -> {}",
        stats.missing_before, stats.missing_after
    );

    Ok(())
}
