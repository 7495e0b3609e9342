//! Checklist and completion repository implementation

use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{CachedChecklist, CachedCompletion, SyncStatus};

/// Trait for checklist storage operations (async)
#[allow(async_fn_in_trait)]
pub trait ChecklistRepository {
    /// Upsert a checklist snapshot, overwriting wholesale (never merged)
    async fn cache_checklist(&self, checklist: &CachedChecklist) -> Result<()>;

    /// First cached checklist for a lot, by the lot index
    async fn cached_checklist(&self, lot_id: &str) -> Result<Option<CachedChecklist>>;

    /// Upsert a completion snapshot keyed by `lot_id` + `checklist_item_id`
    async fn upsert_completion(&self, completion: &CachedCompletion) -> Result<()>;

    /// Fetch a completion row
    async fn completion(
        &self,
        lot_id: &str,
        checklist_item_id: &str,
    ) -> Result<Option<CachedCompletion>>;

    /// Flip a completion's sync status; returns false when the row is
    /// absent (it may have been cleared)
    async fn set_completion_status(
        &self,
        lot_id: &str,
        checklist_item_id: &str,
        status: SyncStatus,
    ) -> Result<bool>;

    /// Patch the matching item inside any cached checklist for the lot
    async fn patch_cached_item(&self, completion: &CachedCompletion) -> Result<()>;
}

/// libSQL implementation of `ChecklistRepository`
pub struct LibSqlChecklistRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlChecklistRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_checklist(row: &libsql::Row) -> Result<CachedChecklist> {
        let items: String = row.get(3)?;
        Ok(CachedChecklist {
            lot_id: row.get(0)?,
            template_id: row.get(1)?,
            template_name: row.get(2)?,
            items: serde_json::from_str(&items)?,
            cached_at: row.get(4)?,
        })
    }

    fn parse_completion(row: &libsql::Row) -> Result<CachedCompletion> {
        let sync_status: String = row.get(6)?;
        Ok(CachedCompletion {
            lot_id: row.get(0)?,
            checklist_item_id: row.get(1)?,
            status: row.get(2)?,
            notes: row.get(3)?,
            completed_by: row.get(4)?,
            completed_at: row.get(5)?,
            sync_status: sync_status.parse()?,
            local_updated_at: row.get(7)?,
        })
    }
}

impl ChecklistRepository for LibSqlChecklistRepository<'_> {
    async fn cache_checklist(&self, checklist: &CachedChecklist) -> Result<()> {
        let items = serde_json::to_string(&checklist.items)?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO checklists (lot_id, template_id, template_name, items, cached_at)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    checklist.lot_id.as_str(),
                    checklist.template_id.as_str(),
                    checklist.template_name.as_str(),
                    items,
                    checklist.cached_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn cached_checklist(&self, lot_id: &str) -> Result<Option<CachedChecklist>> {
        let mut rows = self
            .conn
            .query(
                "SELECT lot_id, template_id, template_name, items, cached_at
                 FROM checklists WHERE lot_id = ? LIMIT 1",
                params![lot_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_checklist(&row)?)),
            None => Ok(None),
        }
    }

    async fn upsert_completion(&self, completion: &CachedCompletion) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO checklist_completions
                 (lot_id, checklist_item_id, status, notes, completed_by, completed_at, sync_status, local_updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    completion.lot_id.as_str(),
                    completion.checklist_item_id.as_str(),
                    completion.status.as_str(),
                    completion.notes.clone(),
                    completion.completed_by.clone(),
                    completion.completed_at.as_str(),
                    completion.sync_status.as_str(),
                    completion.local_updated_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn completion(
        &self,
        lot_id: &str,
        checklist_item_id: &str,
    ) -> Result<Option<CachedCompletion>> {
        let mut rows = self
            .conn
            .query(
                "SELECT lot_id, checklist_item_id, status, notes, completed_by, completed_at, sync_status, local_updated_at
                 FROM checklist_completions WHERE lot_id = ? AND checklist_item_id = ?",
                params![lot_id, checklist_item_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_completion(&row)?)),
            None => Ok(None),
        }
    }

    async fn set_completion_status(
        &self,
        lot_id: &str,
        checklist_item_id: &str,
        status: SyncStatus,
    ) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE checklist_completions SET sync_status = ?
                 WHERE lot_id = ? AND checklist_item_id = ?",
                params![status.as_str(), lot_id, checklist_item_id],
            )
            .await?;
        Ok(rows > 0)
    }

    async fn patch_cached_item(&self, completion: &CachedCompletion) -> Result<()> {
        let mut rows = self
            .conn
            .query(
                "SELECT lot_id, template_id, template_name, items, cached_at
                 FROM checklists WHERE lot_id = ?",
                params![completion.lot_id.as_str()],
            )
            .await?;

        let mut checklists = Vec::new();
        while let Some(row) = rows.next().await? {
            checklists.push(Self::parse_checklist(&row)?);
        }

        for mut checklist in checklists {
            let Some(item) = checklist
                .items
                .iter_mut()
                .find(|item| item.item_id == completion.checklist_item_id)
            else {
                continue;
            };

            item.status = Some(completion.status.clone());
            item.notes = completion.notes.clone();
            item.completed_at = Some(completion.completed_at.clone());
            item.completed_by = completion.completed_by.clone();

            let items = serde_json::to_string(&checklist.items)?;
            self.conn
                .execute(
                    "UPDATE checklists SET items = ? WHERE lot_id = ? AND template_id = ?",
                    params![
                        items,
                        checklist.lot_id.as_str(),
                        checklist.template_id.as_str()
                    ],
                )
                .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::ChecklistItem;
    use pretty_assertions::assert_eq;

    fn checklist() -> CachedChecklist {
        CachedChecklist {
            lot_id: "L1".into(),
            template_id: "T1".into(),
            template_name: "Earthworks ITP".into(),
            items: vec![
                ChecklistItem {
                    item_id: "C1".into(),
                    description: "Survey conformance".into(),
                    status: None,
                    notes: None,
                    completed_at: None,
                    completed_by: None,
                },
                ChecklistItem {
                    item_id: "C2".into(),
                    description: "Compaction test".into(),
                    status: None,
                    notes: None,
                    completed_at: None,
                    completed_by: None,
                },
            ],
            cached_at: 1_700_000_000_000,
        }
    }

    fn completion() -> CachedCompletion {
        CachedCompletion {
            lot_id: "L1".into(),
            checklist_item_id: "C1".into(),
            status: "completed".into(),
            notes: Some("Within tolerance".into()),
            completed_by: Some("inspector@site".into()),
            completed_at: "2024-03-01T10:00:00Z".into(),
            sync_status: SyncStatus::Pending,
            local_updated_at: 1_700_000_100_000,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cache_overwrites_wholesale() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlChecklistRepository::new(db.connection());

        repo.cache_checklist(&checklist()).await.unwrap();

        let mut replacement = checklist();
        replacement.items.truncate(1);
        repo.cache_checklist(&replacement).await.unwrap();

        let cached = repo.cached_checklist("L1").await.unwrap().unwrap();
        assert_eq!(cached.items.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn completion_upsert_is_idempotent() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlChecklistRepository::new(db.connection());

        repo.upsert_completion(&completion()).await.unwrap();
        repo.upsert_completion(&completion()).await.unwrap();

        let mut rows = db
            .connection()
            .query("SELECT COUNT(*) FROM checklist_completions", ())
            .await
            .unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn set_status_reports_missing_row() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlChecklistRepository::new(db.connection());

        let updated = repo
            .set_completion_status("L1", "C1", SyncStatus::Synced)
            .await
            .unwrap();
        assert!(!updated);

        repo.upsert_completion(&completion()).await.unwrap();
        let updated = repo
            .set_completion_status("L1", "C1", SyncStatus::Synced)
            .await
            .unwrap();
        assert!(updated);

        let row = repo.completion("L1", "C1").await.unwrap().unwrap();
        assert_eq!(row.sync_status, SyncStatus::Synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn patch_updates_matching_cached_item_in_place() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlChecklistRepository::new(db.connection());

        repo.cache_checklist(&checklist()).await.unwrap();
        repo.patch_cached_item(&completion()).await.unwrap();

        let cached = repo.cached_checklist("L1").await.unwrap().unwrap();
        assert_eq!(cached.items[0].status.as_deref(), Some("completed"));
        assert_eq!(cached.items[0].notes.as_deref(), Some("Within tolerance"));
        // Untouched sibling item
        assert_eq!(cached.items[1].status, None);
    }
}
