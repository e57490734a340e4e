//! Rebuild command handler.

use clap::Args;
use std::time::{Duration, Instant};
use vaultsearch_core::{config::AppConfig, AppError, AppResult};
use vaultsearch_index::OpenOptions;

/// Two Ctrl-C presses closer together than this stop the rebuild.
const STOP_WINDOW: Duration = Duration::from_secs(2);

/// Re-embed every document from scratch
#[derive(Args, Debug)]
pub struct RebuildCommand {
    /// Chunks embedded per rebuild batch (overrides the config file)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// What a Ctrl-C press does to a running rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalAction {
    Pause,
    Resume,
    Stop,
}

fn signal_action(paused: bool, since_last: Option<Duration>) -> SignalAction {
    match since_last {
        Some(elapsed) if elapsed < STOP_WINDOW => SignalAction::Stop,
        _ if paused => SignalAction::Resume,
        _ => SignalAction::Pause,
    }
}

impl RebuildCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing rebuild command");

        let mut options = OpenOptions::from_config(config)?;
        if let Some(batch_size) = self.batch_size {
            options.settings.rebuild_batch_size = batch_size.max(1);
        }

        let mut index = super::open_index(options, self.json).await?;

        // Ctrl-C pauses between batches and resumes; a quick double Ctrl-C stops.
        let pause = index.pause_handle();
        let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel::<()>();
        let watcher = tokio::spawn(async move {
            let mut last: Option<Instant> = None;
            while tokio::signal::ctrl_c().await.is_ok() {
                let now = Instant::now();
                match signal_action(pause.is_paused(), last.map(|t| now - t)) {
                    SignalAction::Stop => {
                        let _ = stop_tx.send(());
                        return;
                    }
                    SignalAction::Resume => {
                        eprintln!("Resuming rebuild");
                        pause.resume();
                    }
                    SignalAction::Pause => {
                        eprintln!(
                            "Pausing rebuild after the current batch (Ctrl-C to resume, twice quickly to stop)"
                        );
                        pause.pause();
                    }
                }
                last = Some(now);
            }
        });

        let result = tokio::select! {
            result = index.rebuild_index() => result,
            Ok(()) = &mut stop_rx => Err(AppError::Other(
                "Rebuild stopped; the previous index is restored on the next run".to_string(),
            )),
        };
        watcher.abort();
        let summary = result?;

        if self.json {
            return super::print_json(&summary);
        }

        println!(
            "Rebuilt {} chunks from {} files in {}ms",
            summary.chunks, summary.files, summary.duration_ms
        );
        for error in &summary.errors {
            println!("  skipped {}", error);
        }
        Ok(())
    }
}
