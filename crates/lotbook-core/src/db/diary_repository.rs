//! Diary repository implementation

use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{CachedDiary, SyncStatus};

/// Trait for diary storage operations (async)
#[allow(async_fn_in_trait)]
pub trait DiaryRepository {
    /// Upsert a diary entry keyed by `project_id` + `diary_date`
    async fn upsert(&self, diary: &CachedDiary) -> Result<()>;

    /// Fetch a diary entry
    async fn diary(&self, project_id: &str, diary_date: &str) -> Result<Option<CachedDiary>>;

    /// Flip sync status; returns false when the row is absent
    async fn set_sync_status(
        &self,
        project_id: &str,
        diary_date: &str,
        status: SyncStatus,
    ) -> Result<bool>;
}

/// libSQL implementation of `DiaryRepository`
pub struct LibSqlDiaryRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlDiaryRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_diary(row: &libsql::Row) -> Result<CachedDiary> {
        let fields: String = row.get(1)?;
        let submitted: i32 = row.get(2)?;
        let sync_status: String = row.get(3)?;
        Ok(CachedDiary {
            project_id: row.get(0)?,
            fields: serde_json::from_str(&fields)?,
            submitted: submitted != 0,
            sync_status: sync_status.parse()?,
            local_updated_at: row.get(4)?,
        })
    }
}

impl DiaryRepository for LibSqlDiaryRepository<'_> {
    async fn upsert(&self, diary: &CachedDiary) -> Result<()> {
        let fields = serde_json::to_string(&diary.fields)?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO diaries
                 (project_id, diary_date, fields, submitted, sync_status, local_updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    diary.project_id.as_str(),
                    diary.fields.diary_date.as_str(),
                    fields,
                    i32::from(diary.submitted),
                    diary.sync_status.as_str(),
                    diary.local_updated_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn diary(&self, project_id: &str, diary_date: &str) -> Result<Option<CachedDiary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT project_id, fields, submitted, sync_status, local_updated_at
                 FROM diaries WHERE project_id = ? AND diary_date = ?",
                params![project_id, diary_date],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_diary(&row)?)),
            None => Ok(None),
        }
    }

    async fn set_sync_status(
        &self,
        project_id: &str,
        diary_date: &str,
        status: SyncStatus,
    ) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE diaries SET sync_status = ? WHERE project_id = ? AND diary_date = ?",
                params![status.as_str(), project_id, diary_date],
            )
            .await?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::DiaryFields;
    use pretty_assertions::assert_eq;

    fn diary() -> CachedDiary {
        CachedDiary {
            project_id: "P1".into(),
            fields: DiaryFields {
                diary_date: "2024-03-01".into(),
                weather: Some("Overcast".into()),
                activities: Some("Subgrade trim, proof roll".into()),
                ..DiaryFields::default()
            },
            submitted: false,
            sync_status: SyncStatus::Pending,
            local_updated_at: 1_700_000_000_000,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upsert_is_idempotent_per_day() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlDiaryRepository::new(db.connection());

        repo.upsert(&diary()).await.unwrap();
        repo.upsert(&diary()).await.unwrap();

        let mut rows = db
            .connection()
            .query("SELECT COUNT(*) FROM diaries", ())
            .await
            .unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, 1);

        let cached = repo.diary("P1", "2024-03-01").await.unwrap().unwrap();
        assert_eq!(cached.fields.weather.as_deref(), Some("Overcast"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn set_status_reports_missing_row() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlDiaryRepository::new(db.connection());

        assert!(!repo
            .set_sync_status("P1", "2024-03-01", SyncStatus::Synced)
            .await
            .unwrap());

        repo.upsert(&diary()).await.unwrap();
        assert!(repo
            .set_sync_status("P1", "2024-03-01", SyncStatus::Synced)
            .await
            .unwrap());
    }
}
