//! Shared helpers for CLI commands.

use std::env;
use std::path::PathBuf;

use lotbook_core::remote::HttpRemoteApi;
use lotbook_core::{RemoteConfig, StoreService};

use crate::error::CliError;

/// Resolve the database path: explicit flag, else the platform data dir.
pub fn resolve_db_path(db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = db_path {
        return Ok(path);
    }
    dirs::data_dir()
        .map(|dir| dir.join("lotbook").join("lotbook.db"))
        .ok_or(CliError::NoDataDir)
}

/// Open the offline store, creating it on first use.
pub async fn open_store(db_path: Option<PathBuf>) -> Result<StoreService, CliError> {
    let path = resolve_db_path(db_path)?;
    Ok(StoreService::open_path(path).await?)
}

/// Build the remote API client from environment configuration.
pub fn remote_from_env() -> Result<HttpRemoteApi, CliError> {
    let base_url = env::var("LOTBOOK_API_URL").ok();
    let auth_token = env::var("LOTBOOK_API_TOKEN").ok();
    let (Some(base_url), Some(auth_token)) = (base_url, auth_token) else {
        return Err(CliError::RemoteNotConfigured);
    };

    let config = RemoteConfig::new(base_url, auth_token)?;
    Ok(HttpRemoteApi::new(config)?)
}
