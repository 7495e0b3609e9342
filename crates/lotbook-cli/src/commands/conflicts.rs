use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use lotbook_core::models::CachedLot;
use serde::Serialize;

use crate::commands::common::open_store;
use crate::error::CliError;

#[derive(Serialize)]
struct ConflictItem {
    lot_id: String,
    lot_number: Option<String>,
    conflict_fields: Vec<String>,
    detected_at: String,
    server_updated_at: String,
}

fn conflict_item(lot: &CachedLot) -> Option<ConflictItem> {
    let conflict = lot.conflict.as_ref()?;
    Some(ConflictItem {
        lot_id: lot.lot_id.clone(),
        lot_number: lot.fields.lot_number.clone(),
        conflict_fields: conflict
            .local_version
            .diff(&conflict.server_version)
            .iter()
            .map(ToString::to_string)
            .collect(),
        detected_at: format_millis(conflict.detected_at),
        server_updated_at: conflict.server_updated_at.clone(),
    })
}

fn format_millis(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map_or_else(|| millis.to_string(), |ts| ts.to_rfc3339())
}

pub async fn run_conflicts(as_json: bool, db_path: Option<PathBuf>) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let lots = store.open_conflicts().await?;

    if as_json {
        let items: Vec<ConflictItem> = lots.iter().filter_map(conflict_item).collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if lots.is_empty() {
        println!("No open conflicts.");
        return Ok(());
    }

    for lot in &lots {
        let Some(item) = conflict_item(lot) else {
            continue;
        };
        println!(
            "{} ({}) fields: {} detected: {}",
            item.lot_id,
            item.lot_number.as_deref().unwrap_or("-"),
            item.conflict_fields.join(", "),
            item.detected_at
        );
    }
    println!();
    println!("Resolve with: lotbook resolve <lot-id> --keep <local|server|merged>");
    Ok(())
}
