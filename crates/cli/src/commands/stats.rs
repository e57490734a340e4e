//! Stats command handler.

use clap::Args;
use vaultsearch_core::{config::AppConfig, AppResult};
use vaultsearch_index::OpenOptions;

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let options = OpenOptions::from_config(config)?;
        let data_dir = options.data_dir.clone();
        let index = super::open_index(options, true).await?;
        let stats = index.stats();

        if self.json {
            return super::print_json(&stats);
        }

        println!("Index:     {}", data_dir.display());
        println!("Documents: {}", stats.documents);
        println!("Chunks:    {}", stats.chunks);
        println!("Dimension: {}", stats.dimension);
        println!("Model:     {}/{}", stats.provider, stats.model);
        if stats.requires_rebuild {
            println!("Status:    rebuild required");
        } else {
            println!("Status:    ok");
        }
        Ok(())
    }
}
