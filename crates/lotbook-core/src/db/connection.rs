//! Database connection management

use crate::error::Result;
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::path::Path;

use super::migrations;

/// Database wrapper for libSQL connections
pub struct Database {
    _db: LibSqlDatabase,
    conn: Connection,
}

impl Database {
    /// Open a local database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically. Idempotent; safe to call from multiple
    /// call sites against the same path.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        let conn = db.connect()?;

        let database = Self { _db: db, conn };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        let conn = db.connect()?;

        let database = Self { _db: db, conn };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Configure `SQLite` for optimal performance
    async fn configure(&self) -> Result<()> {
        // WAL for concurrent readers while the engine writes
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok(); // No WAL for in-memory databases
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
        self.conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
        Ok(())
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn).await
    }

    /// Destructively empty every collection except the schema metadata.
    ///
    /// This is the explicit "clear offline data" operation; the sync engine
    /// itself never deletes snapshots.
    pub async fn clear_offline_data(&self) -> Result<()> {
        let tables = [
            "mutation_queue",
            "checklists",
            "checklist_completions",
            "diaries",
            "dockets",
            "photos",
            "lots",
        ];
        for table in tables {
            self.conn
                .execute(&format!("DELETE FROM {table}"), ())
                .await?;
        }
        tracing::info!("Cleared all offline data");
        Ok(())
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_in_memory() {
        let db = Database::open_in_memory().await.unwrap();
        let mut rows = db.connection().query("SELECT 1", ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let value: i32 = row.get(0).unwrap();
        assert_eq!(value, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_is_idempotent() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("lotbook.db");

        let first = Database::open(&db_path).await.unwrap();
        drop(first);
        let second = Database::open(&db_path).await.unwrap();
        let mut rows = second
            .connection()
            .query("SELECT COUNT(*) FROM mutation_queue", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let count: i64 = row.get(0).unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_clear_offline_data_empties_tables() {
        let db = Database::open_in_memory().await.unwrap();
        db.connection()
            .execute(
                "INSERT INTO mutation_queue (item_type, action, payload, created_at, attempts)
                 VALUES ('lot-edit', 'update', '{}', 0, 0)",
                (),
            )
            .await
            .unwrap();

        db.clear_offline_data().await.unwrap();

        let mut rows = db
            .connection()
            .query("SELECT COUNT(*) FROM mutation_queue", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let count: i64 = row.get(0).unwrap();
        assert_eq!(count, 0);

        // Schema metadata survives the wipe
        let mut rows = db
            .connection()
            .query("SELECT COUNT(*) FROM schema_version", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let versions: i64 = row.get(0).unwrap();
        assert!(versions > 0);
    }
}
