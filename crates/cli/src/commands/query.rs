//! Query command handler.

use clap::Args;
use vaultsearch_core::{config::AppConfig, AppResult};
use vaultsearch_index::OpenOptions;

/// Search the index
#[derive(Args, Debug)]
pub struct QueryCommand {
    /// Query text
    pub text: String,

    /// Number of results to return (default from config)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl QueryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing query command");

        let options = OpenOptions::from_config(config)?;
        let top_k = self.top_k.unwrap_or(options.settings.top_k);
        let index = super::open_index(options, true).await?;

        let hits = index.query(&self.text, top_k).await?;

        if self.json {
            return super::print_json(&hits);
        }

        if hits.is_empty() {
            println!("No results");
            return Ok(());
        }

        for (rank, hit) in hits.iter().enumerate() {
            println!("{}. {} (score {:.3})", rank + 1, hit.id, hit.score);
            let preview: String = hit.content.chars().take(200).collect();
            for line in preview.lines().take(4) {
                println!("   {}", line);
            }
        }
        Ok(())
    }
}
