//! Mutation queue repository implementation

use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{QueueAction, QueueItem, QueuePayload};
use crate::util::unix_timestamp_millis;

/// Trait for mutation queue operations (async)
#[allow(async_fn_in_trait)]
pub trait QueueRepository {
    /// Append a mutation to the queue; returns the assigned sequence id
    async fn enqueue(&self, payload: &QueuePayload) -> Result<i64>;

    /// All queued items in FIFO order
    async fn pending(&self) -> Result<Vec<QueueItem>>;

    /// Remove an item after acknowledgment, staleness, or give-up
    async fn delete(&self, id: i64) -> Result<()>;

    /// Record a failed dispatch: bump attempts, store the error
    async fn record_failure(&self, id: i64, error: &str) -> Result<()>;

    /// Queue depth
    async fn count(&self) -> Result<u64>;

    /// Queue depth broken down by item type
    async fn counts_by_type(&self) -> Result<Vec<(String, u64)>>;
}

/// libSQL implementation of `QueueRepository`
pub struct LibSqlQueueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlQueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_item(row: &libsql::Row) -> Result<QueueItem> {
        let action: String = row.get(2)?;
        Ok(QueueItem {
            id: row.get(0)?,
            item_type: row.get(1)?,
            action: action.parse()?,
            payload: row.get(3)?,
            created_at: row.get(4)?,
            attempts: row.get(5)?,
            last_error: row.get(6)?,
        })
    }
}

impl QueueRepository for LibSqlQueueRepository<'_> {
    async fn enqueue(&self, payload: &QueuePayload) -> Result<i64> {
        let json = serde_json::to_string(payload)?;
        self.conn
            .execute(
                "INSERT INTO mutation_queue (item_type, action, payload, created_at, attempts)
                 VALUES (?, ?, ?, ?, 0)",
                params![
                    payload.type_name(),
                    payload.action().as_str(),
                    json,
                    unix_timestamp_millis()
                ],
            )
            .await?;
        Ok(self.conn.last_insert_rowid())
    }

    async fn pending(&self) -> Result<Vec<QueueItem>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, item_type, action, payload, created_at, attempts, last_error
                 FROM mutation_queue
                 ORDER BY id ASC",
                (),
            )
            .await?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(Self::parse_item(&row)?);
        }
        Ok(items)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM mutation_queue WHERE id = ?", params![id])
            .await?;
        Ok(())
    }

    async fn record_failure(&self, id: i64, error: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE mutation_queue SET attempts = attempts + 1, last_error = ? WHERE id = ?",
                params![error, id],
            )
            .await?;
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM mutation_queue", ())
            .await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn counts_by_type(&self) -> Result<Vec<(String, u64)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT item_type, COUNT(*) FROM mutation_queue GROUP BY item_type ORDER BY item_type",
                (),
            )
            .await?;

        let mut counts = Vec::new();
        while let Some(row) = rows.next().await? {
            let item_type: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            counts.push((item_type, u64::try_from(count).unwrap_or_default()));
        }
        Ok(counts)
    }
}
