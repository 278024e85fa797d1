//! Import command - Load products from a JSON catalog

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use shopsearch_search::catalog;

use super::Session;
use crate::progress;
use crate::GlobalOptions;

/// Arguments for the import command
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON file holding an array of products
    file: PathBuf,

    /// Output counters as JSON
    #[arg(long)]
    json: bool,
}

/// Execute the import command
pub async fn execute(args: ImportArgs, global: GlobalOptions) -> Result<()> {
    let session = Session::open(&global)?;

    let spinner = progress::spinner(
        &format!("Importing {}", args.file.display()),
        global.quiet || args.json,
    );
    let stats = match catalog::import_file(session.store.as_ref(), &args.file).await {
        Ok(stats) => stats,
        Err(e) => {
            progress::finish_spinner_warn(spinner, "Import failed");
            return Err(e)
                .with_context(|| format!("Failed to import {}", args.file.display()));
        }
    };

    progress::finish_progress(spinner);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Added {} products ({} skipped)", stats.added, stats.skipped);

    Ok(())
}
