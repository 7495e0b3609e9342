use std::path::PathBuf;

use lotbook_core::models::ConflictResolution;

use crate::commands::common::open_store;
use crate::error::CliError;

pub async fn run_resolve(
    lot_id: &str,
    resolution: ConflictResolution,
    db_path: Option<PathBuf>,
) -> Result<(), CliError> {
    let store = open_store(db_path).await?;

    let lot = store
        .resolve_lot_conflict(lot_id, resolution)
        .await
        .map_err(|error| match error {
            lotbook_core::Error::NotFound(_) | lotbook_core::Error::InvalidInput(_) => {
                CliError::NoOpenConflict(lot_id.to_string())
            }
            other => CliError::Core(other),
        })?;

    match resolution {
        ConflictResolution::Local => println!(
            "Kept local version of {}; queued as force overwrite. Run `lotbook sync` to deliver.",
            lot.lot_id
        ),
        ConflictResolution::Server => {
            println!("Adopted server version of {}.", lot.lot_id);
        }
        ConflictResolution::Merged => {
            println!("Recorded merged resolution for {}.", lot.lot_id);
        }
    }
    Ok(())
}
