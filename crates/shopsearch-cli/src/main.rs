//! ShopSearch CLI - Hybrid product search over a local catalog
//!
//! # Usage
//!
//! ```bash
//! # Load a catalog
//! shopsearch import products.json
//!
//! # Embed every product that has no vector yet
//! shopsearch backfill
//!
//! # Search by pattern, or by meaning
//! shopsearch search "lamp"
//! shopsearch search "something to sit on" --mode semantic -C Furniture
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use shopsearch_config::{ConfigError, ConfigOverrides, EmbeddingProviderType, LogFormat};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod commands;
mod progress;

/// ShopSearch - Lexical and semantic product search
#[derive(Parser, Debug)]
#[command(name = "shopsearch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Workspace directory holding `.shopsearch/config.toml`
    #[arg(long, short = 'w', global = true, env = "SHOPSEARCH_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to a configuration file (replaces the workspace config)
    #[arg(long, short = 'c', global = true, env = "SHOPSEARCH_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite catalog path
    #[arg(long, global = true, env = "SHOPSEARCH_DB")]
    db: Option<PathBuf>,

    /// Qdrant server URL (switches the vector backend to Qdrant)
    #[arg(long, global = true, env = "SHOPSEARCH_QDRANT_URL")]
    qdrant: Option<String>,

    /// Embedding provider (openai, gemini)
    #[arg(long, global = true, env = "SHOPSEARCH_PROVIDER", value_parser = parse_embedding_provider)]
    provider: Option<EmbeddingProviderType>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

fn parse_embedding_provider(s: &str) -> Result<EmbeddingProviderType, String> {
    s.parse().map_err(|e: ConfigError| e.to_string())
}

impl GlobalOptions {
    /// Convert global options to config overrides
    pub fn to_config_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            db_path: self.db.clone(),
            qdrant_url: self.qdrant.clone(),
            embedding_provider: self.provider,
            log_level: self.log_level_flag().map(String::from),
            ..Default::default()
        }
    }

    fn log_level_flag(&self) -> Option<&'static str> {
        if self.quiet {
            Some("error")
        } else if self.verbose {
            Some("debug")
        } else {
            None
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search the catalog
    Search(commands::search::SearchArgs),

    /// Compute embeddings for catalog products
    Backfill(commands::backfill::BackfillArgs),

    /// Import products from a JSON file
    Import(commands::import::ImportArgs),

    /// Show catalog and provider status
    Status(commands::status::StatusArgs),

    /// View and initialize configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

fn init_tracing(global: &GlobalOptions) -> Result<()> {
    let logging = commands::logging_config(global);
    let level = global
        .log_level_flag()
        .map(String::from)
        .unwrap_or(logging.level);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(true);

    match logging.format {
        LogFormat::Compact => {
            tracing::subscriber::set_global_default(builder.compact().finish())?
        }
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.global)?;

    match cli.command {
        Commands::Search(args) => commands::search::execute(args, cli.global).await,
        Commands::Backfill(args) => commands::backfill::execute(args, cli.global).await,
        Commands::Import(args) => commands::import::execute(args, cli.global).await,
        Commands::Status(args) => commands::status::execute(args, cli.global).await,
        Commands::Config(cmd) => commands::config::execute(cmd, cli.global).await,
    }
}
