//! Docket repository implementation

use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{CachedDocket, DocketStatus, SyncStatus};

/// Trait for docket storage operations (async)
#[allow(async_fn_in_trait)]
pub trait DocketRepository {
    /// Upsert a docket keyed by its locally minted id
    async fn upsert(&self, docket: &CachedDocket) -> Result<()>;

    /// Fetch a docket
    async fn docket(&self, docket_id: &str) -> Result<Option<CachedDocket>>;

    /// Flip sync status; returns false when the row is absent
    async fn set_sync_status(&self, docket_id: &str, status: SyncStatus) -> Result<bool>;
}

/// libSQL implementation of `DocketRepository`
pub struct LibSqlDocketRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlDocketRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_docket(row: &libsql::Row) -> Result<CachedDocket> {
        let fields: String = row.get(2)?;
        let status: String = row.get(3)?;
        let sync_status: String = row.get(4)?;
        Ok(CachedDocket {
            docket_id: row.get(0)?,
            project_id: row.get(1)?,
            fields: serde_json::from_str(&fields)?,
            status: match status.as_str() {
                "draft" => DocketStatus::Draft,
                "pending_approval" => DocketStatus::PendingApproval,
                other => {
                    return Err(crate::Error::InvalidInput(format!(
                        "unknown docket status: {other}"
                    )))
                }
            },
            sync_status: sync_status.parse()?,
            local_updated_at: row.get(5)?,
        })
    }
}

impl DocketRepository for LibSqlDocketRepository<'_> {
    async fn upsert(&self, docket: &CachedDocket) -> Result<()> {
        let fields = serde_json::to_string(&docket.fields)?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO dockets
                 (docket_id, project_id, fields, status, sync_status, local_updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    docket.docket_id.as_str(),
                    docket.project_id.as_str(),
                    fields,
                    docket.status.as_str(),
                    docket.sync_status.as_str(),
                    docket.local_updated_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn docket(&self, docket_id: &str) -> Result<Option<CachedDocket>> {
        let mut rows = self
            .conn
            .query(
                "SELECT docket_id, project_id, fields, status, sync_status, local_updated_at
                 FROM dockets WHERE docket_id = ?",
                params![docket_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_docket(&row)?)),
            None => Ok(None),
        }
    }

    async fn set_sync_status(&self, docket_id: &str, status: SyncStatus) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE dockets SET sync_status = ? WHERE docket_id = ?",
                params![status.as_str(), docket_id],
            )
            .await?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::DocketFields;
    use pretty_assertions::assert_eq;

    fn docket() -> CachedDocket {
        CachedDocket {
            docket_id: "D1".into(),
            project_id: "P1".into(),
            fields: DocketFields {
                docket_number: "DKT-0042".into(),
                supplier: Some("Boral".into()),
                quantity: Some(32.5),
                unit: Some("t".into()),
                ..DocketFields::default()
            },
            status: DocketStatus::Draft,
            sync_status: SyncStatus::Pending,
            local_updated_at: 1_700_000_000_000,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upsert_and_fetch_roundtrip() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlDocketRepository::new(db.connection());

        repo.upsert(&docket()).await.unwrap();
        let cached = repo.docket("D1").await.unwrap().unwrap();
        assert_eq!(cached.fields.docket_number, "DKT-0042");
        assert_eq!(cached.status, DocketStatus::Draft);

        // Submit flips workflow status through a fresh upsert
        let mut submitted = docket();
        submitted.status = DocketStatus::PendingApproval;
        repo.upsert(&submitted).await.unwrap();
        let cached = repo.docket("D1").await.unwrap().unwrap();
        assert_eq!(cached.status, DocketStatus::PendingApproval);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn set_status_reports_missing_row() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlDocketRepository::new(db.connection());

        assert!(!repo.set_sync_status("D1", SyncStatus::Synced).await.unwrap());
        repo.upsert(&docket()).await.unwrap();
        assert!(repo.set_sync_status("D1", SyncStatus::Synced).await.unwrap());
    }
}
