//! Config command - Inspect and initialize configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;
use shopsearch_config::{ConfigLoader, ShopConfig};

use super::{load_config, resolve_workspace};
use crate::GlobalOptions;

const MASK: &str = "********";

/// Config management commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show(ShowArgs),

    /// Create `.shopsearch/config.toml` in the workspace
    Init,

    /// Show configuration file paths
    Path(PathArgs),
}

/// Arguments for the show command
#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Output as JSON instead of TOML
    #[arg(long)]
    json: bool,
}

/// Arguments for the path command
#[derive(clap::Args, Debug)]
pub struct PathArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Configuration paths
#[derive(Debug, Clone, Serialize)]
pub struct ConfigPaths {
    pub global: Option<PathBuf>,
    pub local: PathBuf,
    pub global_exists: bool,
    pub local_exists: bool,
}

/// Execute the config command
pub async fn execute(cmd: ConfigCommand, global: GlobalOptions) -> Result<()> {
    match cmd {
        ConfigCommand::Show(args) => execute_show(args, global),
        ConfigCommand::Init => execute_init(global),
        ConfigCommand::Path(args) => execute_path(args, global),
    }
}

/// Hide inline secrets before printing.
fn redact(mut config: ShopConfig) -> ShopConfig {
    if config.embedding.api_key.is_some() {
        config.embedding.api_key = Some(MASK.to_string());
    }
    if config.vector.api_key.is_some() {
        config.vector.api_key = Some(MASK.to_string());
    }
    config
}

fn execute_show(args: ShowArgs, global: GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace(&global)?;
    let config = redact(load_config(&global, &workspace)?);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        let toml = toml::to_string_pretty(&config).context("Failed to serialize config")?;
        print!("{}", toml);
    }
    Ok(())
}

fn execute_init(global: GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace(&global)?;
    let loader = ConfigLoader::new();
    let existed = loader.local_config_path(&workspace).exists();

    let path = loader
        .init_local(&workspace)
        .context("Failed to initialize configuration")?;

    if existed {
        println!("Config already exists: {}", path.display());
    } else {
        println!("Created {}", path.display());
    }
    Ok(())
}

fn execute_path(args: PathArgs, global: GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace(&global)?;
    let loader = ConfigLoader::new();

    let global_path = loader.global_config_path();
    let local = global
        .config
        .clone()
        .unwrap_or_else(|| loader.local_config_path(&workspace));

    let paths = ConfigPaths {
        global_exists: global_path.as_ref().is_some_and(|p| p.exists()),
        global: global_path,
        local_exists: local.exists(),
        local,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
        return Ok(());
    }

    let marker = |exists: bool| if exists { "" } else { " (not found)" };
    match &paths.global {
        Some(path) => println!("Global: {}{}", path.display(), marker(paths.global_exists)),
        None => println!("Global: (no home directory)"),
    }
    println!("Local:  {}{}", paths.local.display(), marker(paths.local_exists));
    Ok(())
}
