//! Single-document command handlers.

use clap::Args;
use vaultsearch_core::{config::AppConfig, AppResult};
use vaultsearch_index::OpenOptions;

/// Re-index one document
#[derive(Args, Debug)]
pub struct IndexFileCommand {
    /// Document path relative to the vault root
    pub path: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexFileCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing index-file command for {}", self.path);

        let options = OpenOptions::from_config(config)?;
        let mut index = super::open_index(options, true).await?;
        let summary = index.index_file(&self.path).await?;

        if self.json {
            return super::print_json(&summary);
        }

        println!(
            "{}: {} added, {} updated, {} deleted",
            self.path, summary.added, summary.updated, summary.deleted
        );
        Ok(())
    }
}

/// Drop one document from the index
#[derive(Args, Debug)]
pub struct RemoveFileCommand {
    /// Document path relative to the vault root
    pub path: String,
}

impl RemoveFileCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing remove-file command for {}", self.path);

        let options = OpenOptions::from_config(config)?;
        let mut index = super::open_index(options, true).await?;
        let removed = index.remove_file(&self.path)?;

        println!("{}: removed {} chunks", self.path, removed);
        Ok(())
    }
}
