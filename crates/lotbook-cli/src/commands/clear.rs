use std::path::PathBuf;

use crate::commands::common::open_store;
use crate::error::CliError;

pub async fn run_clear(confirmed: bool, db_path: Option<PathBuf>) -> Result<(), CliError> {
    if !confirmed {
        return Err(CliError::ClearNotConfirmed);
    }

    let store = open_store(db_path).await?;
    let stats = store.stats().await?;
    store.clear_offline_data().await?;
    println!(
        "Cleared offline data ({} pending mutations discarded)",
        stats.pending
    );
    Ok(())
}
