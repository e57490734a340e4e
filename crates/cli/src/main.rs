//! vaultsearch CLI
//!
//! Main entry point for the vaultsearch command-line tool.
//! Keeps a local semantic index of a note vault and queries it.

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    IndexFileCommand, QueryCommand, RebuildCommand, RemoveFileCommand, StatsCommand, SyncCommand,
};
use std::path::PathBuf;
use vaultsearch_core::{
    config::AppConfig,
    logging::{self, LogFormat},
    AppResult,
};

/// vaultsearch - local incremental semantic search over a note vault
#[derive(Parser, Debug)]
#[command(name = "vaultsearch")]
#[command(about = "Local incremental semantic search over a note vault", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the vault directory (default: current directory)
    #[arg(long, global = true, env = "VAULTSEARCH_VAULT")]
    vault: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "VAULTSEARCH_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for index data (default: <vault>/.vaultsearch)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Log line format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bring the index up to date with the vault
    Sync(SyncCommand),

    /// Re-embed every document from scratch
    Rebuild(RebuildCommand),

    /// Search the index
    Query(QueryCommand),

    /// Re-index one document
    IndexFile(IndexFileCommand),

    /// Drop one document from the index
    RemoveFile(RemoveFileCommand),

    /// Show index statistics
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from environment and config file
    let config = AppConfig::load()?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.vault,
        cli.config,
        cli.data_dir,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging_with_format(config.log_level.as_deref(), config.no_color, cli.log_format)?;

    tracing::info!("vaultsearch starting");
    tracing::debug!("Vault: {:?}", config.vault);
    tracing::debug!("Data directory: {:?}", config.data_dir());

    let command_name = match &cli.command {
        Commands::Sync(_) => "sync",
        Commands::Rebuild(_) => "rebuild",
        Commands::Query(_) => "query",
        Commands::IndexFile(_) => "index-file",
        Commands::RemoveFile(_) => "remove-file",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Sync(cmd) => cmd.execute(&config).await,
        Commands::Rebuild(cmd) => cmd.execute(&config).await,
        Commands::Query(cmd) => cmd.execute(&config).await,
        Commands::IndexFile(cmd) => cmd.execute(&config).await,
        Commands::RemoveFile(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
