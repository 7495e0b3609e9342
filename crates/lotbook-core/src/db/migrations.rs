//! Database migrations
//!
//! Migrations are strictly additive: each step only creates collections and
//! indexes, never rewrites existing rows, so older data survives upgrades.

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 4;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }
    if version < 3 {
        migrate_v3(conn).await?;
    }
    if version < 4 {
        migrate_v4(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    // Check if schema_version table exists
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Apply one migration step's statements inside a transaction.
async fn apply(conn: &Connection, statements: &[&str], version: i32) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {version}");
    Ok(())
}

/// Migration to version 1: mutation queue and checklist caching
async fn migrate_v1(conn: &Connection) -> Result<()> {
    let statements = [
        // Schema version tracking
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        // Durable at-least-once delivery log
        "CREATE TABLE IF NOT EXISTS mutation_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            item_type TEXT NOT NULL,
            action TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT
        )",
        "CREATE INDEX IF NOT EXISTS idx_queue_type ON mutation_queue(item_type)",
        "CREATE INDEX IF NOT EXISTS idx_queue_action ON mutation_queue(action)",
        "CREATE INDEX IF NOT EXISTS idx_queue_created ON mutation_queue(created_at)",
        // Checklist snapshots
        "CREATE TABLE IF NOT EXISTS checklists (
            lot_id TEXT NOT NULL,
            template_id TEXT NOT NULL,
            template_name TEXT NOT NULL,
            items TEXT NOT NULL,
            cached_at INTEGER NOT NULL,
            PRIMARY KEY (lot_id, template_id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_checklists_lot ON checklists(lot_id)",
        // Item completions recorded in the field
        "CREATE TABLE IF NOT EXISTS checklist_completions (
            lot_id TEXT NOT NULL,
            checklist_item_id TEXT NOT NULL,
            status TEXT NOT NULL,
            notes TEXT,
            completed_by TEXT,
            completed_at TEXT NOT NULL,
            sync_status TEXT NOT NULL,
            local_updated_at INTEGER NOT NULL,
            PRIMARY KEY (lot_id, checklist_item_id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_completions_lot ON checklist_completions(lot_id)",
        "CREATE INDEX IF NOT EXISTS idx_completions_status ON checklist_completions(sync_status)",
        // Record migration version
        "INSERT INTO schema_version (version) VALUES (1)",
    ];

    apply(conn, &statements, 1).await
}

/// Migration to version 2: diaries and dockets
async fn migrate_v2(conn: &Connection) -> Result<()> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS diaries (
            project_id TEXT NOT NULL,
            diary_date TEXT NOT NULL,
            fields TEXT NOT NULL,
            submitted INTEGER NOT NULL DEFAULT 0,
            sync_status TEXT NOT NULL,
            local_updated_at INTEGER NOT NULL,
            PRIMARY KEY (project_id, diary_date)
        )",
        "CREATE INDEX IF NOT EXISTS idx_diaries_project ON diaries(project_id)",
        "CREATE INDEX IF NOT EXISTS idx_diaries_status ON diaries(sync_status)",
        "CREATE TABLE IF NOT EXISTS dockets (
            docket_id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            fields TEXT NOT NULL,
            status TEXT NOT NULL,
            sync_status TEXT NOT NULL,
            local_updated_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_dockets_project ON dockets(project_id)",
        "CREATE INDEX IF NOT EXISTS idx_dockets_status ON dockets(sync_status)",
        "INSERT INTO schema_version (version) VALUES (2)",
    ];

    apply(conn, &statements, 2).await
}

/// Migration to version 3: photos with inline originals
async fn migrate_v3(conn: &Connection) -> Result<()> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS photos (
            photo_id TEXT PRIMARY KEY,
            lot_id TEXT NOT NULL,
            file_name TEXT NOT NULL,
            content_type TEXT NOT NULL,
            data BLOB NOT NULL,
            original_size INTEGER NOT NULL,
            compressed_size INTEGER NOT NULL,
            caption TEXT,
            sync_status TEXT NOT NULL,
            local_updated_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_photos_lot ON photos(lot_id)",
        "CREATE INDEX IF NOT EXISTS idx_photos_status ON photos(sync_status)",
        "CREATE INDEX IF NOT EXISTS idx_photos_created ON photos(created_at DESC)",
        "INSERT INTO schema_version (version) VALUES (3)",
    ];

    apply(conn, &statements, 3).await
}

/// Migration to version 4: lots with conflict baselines
async fn migrate_v4(conn: &Connection) -> Result<()> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS lots (
            lot_id TEXT PRIMARY KEY,
            fields TEXT NOT NULL,
            server_updated_at TEXT,
            sync_status TEXT NOT NULL,
            local_updated_at INTEGER NOT NULL,
            conflict TEXT
        )",
        "CREATE INDEX IF NOT EXISTS idx_lots_status ON lots(sync_status)",
        "INSERT INTO schema_version (version) VALUES (4)",
    ];

    apply(conn, &statements, 4).await
}
