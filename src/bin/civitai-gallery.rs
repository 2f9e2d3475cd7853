//! CivitAI Gallery Bridge Binary
//!
//! Loads configuration, applies CLI overrides, initialises logging and serves
//! the HTTP routes until Ctrl-C.

use anyhow::Context;
use civitai_gallery::config::{ConfigLoader, ServiceConfig};
use civitai_gallery::logging::init_logging;
use civitai_gallery::nodes;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CivitAI gallery bridge for node-graph hosts
#[derive(Parser)]
#[command(name = "civitai-gallery")]
#[command(about = "Gallery browsing, prompt stores and an authenticated image proxy")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Socket address to listen on
    #[arg(long, global = true)]
    bind: Option<String>,

    /// Credential file holding CIVITAI_API_KEY=<token>
    #[arg(long, global = true)]
    api_key_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long, global = true)]
    log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP routes (default)
    Serve,
    /// Print the node types this bridge registers
    Nodes,
}

impl Cli {
    fn apply_overrides(&self, config: &mut ServiceConfig) {
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(path) = &self.api_key_file {
            config.credentials.api_key_file = path.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.logging.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.logging.file = Some(file.clone());
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
    .context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Nodes => {
            for node in nodes::catalog() {
                println!(
                    "{:<28} {:<36} {}",
                    node.type_name, node.display_name, node.category
                );
            }
            Ok(())
        }
        Commands::Serve => {
            init_logging(Some(&config.logging)).context("Failed to initialise logging")?;
            civitai_gallery::serve(&config)
                .await
                .context("Gallery bridge failed")
        }
    }
}
