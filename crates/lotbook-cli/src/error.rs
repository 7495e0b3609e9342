use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] lotbook_core::Error),
    #[error(transparent)]
    Remote(#[from] lotbook_core::remote::DispatchError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Could not determine a data directory; pass --db-path")]
    NoDataDir,
    #[error("No open conflict found for lot: {0}")]
    NoOpenConflict(String),
    #[error(
        "Remote API is not configured. Set LOTBOOK_API_URL and LOTBOOK_API_TOKEN in the environment."
    )]
    RemoteNotConfigured,
    #[error("Refusing to clear offline data without --yes")]
    ClearNotConfirmed,
}
