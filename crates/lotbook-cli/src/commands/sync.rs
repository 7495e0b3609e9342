use std::path::PathBuf;

use lotbook_core::sync::DrainOutcome;
use lotbook_core::{SyncEngine, SyncEvents, SyncPolicy};

use crate::commands::common::{open_store, remote_from_env};
use crate::error::CliError;

pub async fn run_sync(db_path: Option<PathBuf>) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let remote = remote_from_env()?;

    let events = SyncEvents::new().on_conflict_detected(|notice| {
        println!("CONFLICT {}: {}", notice.lot_number, notice.message);
    });
    let engine = SyncEngine::new(store, remote, SyncPolicy::default(), events);

    match engine.drain().await? {
        DrainOutcome::Completed(report) => {
            println!(
                "Sync completed: {} delivered, {} failed, {} conflicts, {} dropped",
                report.synced, report.failed, report.conflicts, report.dropped
            );
        }
        DrainOutcome::Offline => println!("Offline; nothing attempted"),
        DrainOutcome::AlreadyRunning => println!("A sync is already running"),
    }
    Ok(())
}
