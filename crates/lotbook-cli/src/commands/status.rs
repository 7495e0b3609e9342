use std::path::PathBuf;

use serde::Serialize;

use crate::commands::common::open_store;
use crate::error::CliError;

#[derive(Serialize)]
struct StatusReport {
    pending: u64,
    conflicts: u64,
    by_type: Vec<TypeCount>,
}

#[derive(Serialize)]
struct TypeCount {
    item_type: String,
    count: u64,
}

pub async fn run_status(as_json: bool, db_path: Option<PathBuf>) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let stats = store.stats().await?;
    let by_type = store.queue_counts_by_type().await?;

    if as_json {
        let report = StatusReport {
            pending: stats.pending,
            conflicts: stats.conflicts,
            by_type: by_type
                .into_iter()
                .map(|(item_type, count)| TypeCount { item_type, count })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Pending mutations: {}", stats.pending);
    for (item_type, count) in by_type {
        println!("  {item_type}: {count}");
    }
    println!("Open conflicts: {}", stats.conflicts);
    Ok(())
}
