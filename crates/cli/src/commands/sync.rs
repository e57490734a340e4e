//! Sync command handler.

use clap::Args;
use vaultsearch_core::{config::AppConfig, AppResult};
use vaultsearch_index::OpenOptions;

/// Bring the index up to date with the vault
#[derive(Args, Debug)]
pub struct SyncCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SyncCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing sync command");

        let options = OpenOptions::from_config(config)?;
        let mut index = super::open_index(options, self.json).await?;
        let summary = index.diff_and_sync().await?;

        if self.json {
            return super::print_json(&summary);
        }

        println!(
            "Synced: {} added, {} updated, {} deleted in {}ms",
            summary.added, summary.updated, summary.deleted, summary.duration_ms
        );
        for error in &summary.errors {
            println!("  skipped {}", error);
        }
        if index.stats().requires_rebuild {
            println!("The index should be rebuilt: run `vaultsearch rebuild`");
        }
        Ok(())
    }
}
