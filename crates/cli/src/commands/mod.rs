//! Command handlers for the vaultsearch CLI.
//!
//! Each subcommand opens the index for the configured vault, runs one engine
//! operation and prints the result to stdout. Progress and notices go to
//! stderr.

pub mod file;
pub mod query;
pub mod rebuild;
pub mod stats;
pub mod sync;

pub use file::{IndexFileCommand, RemoveFileCommand};
pub use query::QueryCommand;
pub use rebuild::RebuildCommand;
pub use stats::StatsCommand;
pub use sync::SyncCommand;

use std::sync::Arc;
use vaultsearch_core::AppResult;
use vaultsearch_index::{Notice, NoticeSink, OpenOptions, ProgressEvent, ProgressReporter, VaultIndex};

/// Open the index, printing progress lines unless `quiet` is set.
pub(crate) async fn open_index(options: OpenOptions, quiet: bool) -> AppResult<VaultIndex> {
    let progress = if quiet {
        ProgressReporter::noop()
    } else {
        ProgressReporter::new(Arc::new(|event: ProgressEvent| {
            eprintln!("{}", event.format_simple());
        }))
    };

    let notices = NoticeSink::new(Arc::new(|notice: &Notice| {
        eprintln!("{}", notice.message());
    }));

    vaultsearch_index::open(options, progress, notices).await
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
