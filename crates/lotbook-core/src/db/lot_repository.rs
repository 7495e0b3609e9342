//! Lot repository: cached snapshots, edit baselines, and conflict bookkeeping

use libsql::{params, Connection};

use crate::error::{Error, Result};
use crate::models::{
    is_server_newer, CachedLot, ConflictCheck, ConflictResolution, LotConflict, LotFields,
    RemoteLot, SyncStatus,
};
use crate::util::unix_timestamp_millis;

/// Trait for lot storage operations (async)
#[allow(async_fn_in_trait)]
pub trait LotRepository {
    /// Cache a fresh server copy: fields, baseline, `synced`, no conflict
    async fn cache_lot(&self, lot_id: &str, fields: &LotFields, server_updated_at: &str)
        -> Result<()>;

    /// Fetch a cached lot
    async fn lot(&self, lot_id: &str) -> Result<Option<CachedLot>>;

    /// Record a local edit: overwrite fields, flip to `pending`.
    /// Fails with `NotFound` when the lot was never cached, since an edit
    /// without a baseline cannot be conflict-checked later.
    async fn record_edit(&self, lot_id: &str, fields: &LotFields) -> Result<()>;

    /// Compare the cached edit against the live server representation
    async fn detect_sync_conflict(&self, lot_id: &str, server: &RemoteLot)
        -> Result<ConflictCheck>;

    /// Store both versions on the snapshot while the conflict is open
    async fn record_conflict(&self, lot_id: &str, server: &RemoteLot) -> Result<()>;

    /// Flip sync status only; returns false when the row is absent
    async fn set_sync_status(&self, lot_id: &str, status: SyncStatus) -> Result<bool>;

    /// Acknowledge a delivered edit: adopt the returned server timestamp as
    /// the new baseline and clear any stale conflict
    async fn mark_synced(&self, lot_id: &str, new_server_updated_at: &str) -> Result<bool>;

    /// Lots with an open (unresolved) conflict
    async fn open_conflicts(&self) -> Result<Vec<CachedLot>>;

    /// Record the human decision on an open conflict; returns the updated
    /// snapshot. `Server` adopts the stored server version into the cache.
    async fn resolve_conflict(
        &self,
        lot_id: &str,
        resolution: ConflictResolution,
    ) -> Result<CachedLot>;
}

/// libSQL implementation of `LotRepository`
pub struct LibSqlLotRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlLotRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_lot(row: &libsql::Row) -> Result<CachedLot> {
        let fields: String = row.get(1)?;
        let sync_status: String = row.get(3)?;
        let conflict: Option<String> = row.get(5)?;
        Ok(CachedLot {
            lot_id: row.get(0)?,
            fields: serde_json::from_str(&fields)?,
            server_updated_at: row.get(2)?,
            sync_status: sync_status.parse()?,
            local_updated_at: row.get(4)?,
            conflict: conflict
                .map(|json| serde_json::from_str(&json))
                .transpose()?,
        })
    }

    async fn write_conflict(&self, lot_id: &str, conflict: &LotConflict) -> Result<()> {
        let json = serde_json::to_string(conflict)?;
        self.conn
            .execute(
                "UPDATE lots SET conflict = ? WHERE lot_id = ?",
                params![json, lot_id],
            )
            .await?;
        Ok(())
    }
}

impl LotRepository for LibSqlLotRepository<'_> {
    async fn cache_lot(
        &self,
        lot_id: &str,
        fields: &LotFields,
        server_updated_at: &str,
    ) -> Result<()> {
        let fields = serde_json::to_string(fields)?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO lots
                 (lot_id, fields, server_updated_at, sync_status, local_updated_at, conflict)
                 VALUES (?, ?, ?, ?, ?, NULL)",
                params![
                    lot_id,
                    fields,
                    server_updated_at,
                    SyncStatus::Synced.as_str(),
                    unix_timestamp_millis()
                ],
            )
            .await?;
        Ok(())
    }

    async fn lot(&self, lot_id: &str) -> Result<Option<CachedLot>> {
        let mut rows = self
            .conn
            .query(
                "SELECT lot_id, fields, server_updated_at, sync_status, local_updated_at, conflict
                 FROM lots WHERE lot_id = ?",
                params![lot_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_lot(&row)?)),
            None => Ok(None),
        }
    }

    async fn record_edit(&self, lot_id: &str, fields: &LotFields) -> Result<()> {
        let fields = serde_json::to_string(fields)?;
        let rows = self
            .conn
            .execute(
                "UPDATE lots SET fields = ?, sync_status = ?, local_updated_at = ?
                 WHERE lot_id = ?",
                params![
                    fields,
                    SyncStatus::Pending.as_str(),
                    unix_timestamp_millis(),
                    lot_id
                ],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("lot {lot_id} is not cached")));
        }
        Ok(())
    }

    async fn detect_sync_conflict(
        &self,
        lot_id: &str,
        server: &RemoteLot,
    ) -> Result<ConflictCheck> {
        let Some(lot) = self.lot(lot_id).await? else {
            return Ok(ConflictCheck {
                has_conflict: false,
                conflict_fields: Vec::new(),
            });
        };

        let conflict_fields = lot.fields.diff(&server.fields);
        let has_conflict = !conflict_fields.is_empty()
            && is_server_newer(lot.server_updated_at.as_deref(), &server.updated_at);

        Ok(ConflictCheck {
            has_conflict,
            conflict_fields,
        })
    }

    async fn record_conflict(&self, lot_id: &str, server: &RemoteLot) -> Result<()> {
        let Some(lot) = self.lot(lot_id).await? else {
            return Err(Error::NotFound(format!("lot {lot_id} is not cached")));
        };

        let conflict = LotConflict {
            server_version: server.fields.clone(),
            local_version: lot.fields,
            server_updated_at: server.updated_at.clone(),
            detected_at: unix_timestamp_millis(),
            resolved: false,
            resolution: None,
        };
        self.write_conflict(lot_id, &conflict).await
    }

    async fn set_sync_status(&self, lot_id: &str, status: SyncStatus) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE lots SET sync_status = ? WHERE lot_id = ?",
                params![status.as_str(), lot_id],
            )
            .await?;
        Ok(rows > 0)
    }

    async fn mark_synced(&self, lot_id: &str, new_server_updated_at: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE lots SET sync_status = ?, server_updated_at = ?, conflict = NULL
                 WHERE lot_id = ?",
                params![SyncStatus::Synced.as_str(), new_server_updated_at, lot_id],
            )
            .await?;
        Ok(rows > 0)
    }

    async fn open_conflicts(&self) -> Result<Vec<CachedLot>> {
        let mut rows = self
            .conn
            .query(
                "SELECT lot_id, fields, server_updated_at, sync_status, local_updated_at, conflict
                 FROM lots WHERE conflict IS NOT NULL ORDER BY lot_id",
                (),
            )
            .await?;

        let mut lots = Vec::new();
        while let Some(row) = rows.next().await? {
            let lot = Self::parse_lot(&row)?;
            if lot.conflict.as_ref().is_some_and(|c| !c.resolved) {
                lots.push(lot);
            }
        }
        Ok(lots)
    }

    async fn resolve_conflict(
        &self,
        lot_id: &str,
        resolution: ConflictResolution,
    ) -> Result<CachedLot> {
        let Some(mut lot) = self.lot(lot_id).await? else {
            return Err(Error::NotFound(format!("lot {lot_id} is not cached")));
        };
        let Some(mut conflict) = lot.conflict.take() else {
            return Err(Error::InvalidInput(format!(
                "lot {lot_id} has no open conflict"
            )));
        };
        if conflict.resolved {
            return Err(Error::InvalidInput(format!(
                "conflict on lot {lot_id} is already resolved"
            )));
        }

        conflict.resolved = true;
        conflict.resolution = Some(resolution);

        if resolution == ConflictResolution::Server {
            // Adopt the server version wholesale; nothing left to deliver.
            let fields = serde_json::to_string(&conflict.server_version)?;
            self.conn
                .execute(
                    "UPDATE lots SET fields = ?, server_updated_at = ?, sync_status = ?, local_updated_at = ?
                     WHERE lot_id = ?",
                    params![
                        fields,
                        conflict.server_updated_at.as_str(),
                        SyncStatus::Synced.as_str(),
                        unix_timestamp_millis(),
                        lot_id
                    ],
                )
                .await?;
        }

        self.write_conflict(lot_id, &conflict).await?;

        self.lot(lot_id)
            .await?
            .ok_or_else(|| Error::NotFound(lot_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    fn fields(description: &str) -> LotFields {
        LotFields {
            lot_number: Some("LOT-009".into()),
            description: Some(description.into()),
            ..LotFields::default()
        }
    }

    fn remote(description: &str, updated_at: &str) -> RemoteLot {
        RemoteLot {
            lot_id: "L9".into(),
            fields: fields(description),
            updated_at: updated_at.into(),
        }
    }

    async fn setup_cached(db: &Database) -> LibSqlLotRepository<'_> {
        let repo = LibSqlLotRepository::new(db.connection());
        repo.cache_lot("L9", &fields("Kerb"), "2024-01-01T00:00:00Z")
            .await
            .unwrap();
        repo
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cache_and_fetch_roundtrip() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = setup_cached(&db).await;

        let lot = repo.lot("L9").await.unwrap().unwrap();
        assert_eq!(lot.sync_status, SyncStatus::Synced);
        assert_eq!(
            lot.server_updated_at.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
        assert!(lot.conflict.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn record_edit_requires_cached_baseline() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlLotRepository::new(db.connection());

        let result = repo.record_edit("L404", &fields("Kerb")).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn record_edit_flips_to_pending_and_keeps_baseline() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = setup_cached(&db).await;

        repo.record_edit("L9", &fields("Kerb rework")).await.unwrap();

        let lot = repo.lot("L9").await.unwrap().unwrap();
        assert_eq!(lot.sync_status, SyncStatus::Pending);
        assert_eq!(lot.fields.description.as_deref(), Some("Kerb rework"));
        assert_eq!(
            lot.server_updated_at.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn conflict_requires_newer_server_and_differing_fields() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = setup_cached(&db).await;
        repo.record_edit("L9", &fields("Kerb rework")).await.unwrap();

        // Newer server, different field: conflict
        let check = repo
            .detect_sync_conflict("L9", &remote("Kerb widened", "2024-01-02T00:00:00Z"))
            .await
            .unwrap();
        assert!(check.has_conflict);
        assert_eq!(check.conflict_fields, vec!["description"]);

        // Newer server, identical fields: no conflict
        let check = repo
            .detect_sync_conflict("L9", &remote("Kerb rework", "2024-01-02T00:00:00Z"))
            .await
            .unwrap();
        assert!(!check.has_conflict);

        // Older server, different field: no conflict
        let check = repo
            .detect_sync_conflict("L9", &remote("Kerb widened", "2023-12-01T00:00:00Z"))
            .await
            .unwrap();
        assert!(!check.has_conflict);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn record_conflict_keeps_both_versions_open() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = setup_cached(&db).await;
        repo.record_edit("L9", &fields("Kerb rework")).await.unwrap();

        repo.record_conflict("L9", &remote("Kerb widened", "2024-01-02T00:00:00Z"))
            .await
            .unwrap();

        let lot = repo.lot("L9").await.unwrap().unwrap();
        let conflict = lot.conflict.unwrap();
        assert!(!conflict.resolved);
        assert_eq!(
            conflict.server_version.description.as_deref(),
            Some("Kerb widened")
        );
        assert_eq!(
            conflict.local_version.description.as_deref(),
            Some("Kerb rework")
        );
        assert_eq!(repo.open_conflicts().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mark_synced_establishes_new_baseline_and_clears_conflict() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = setup_cached(&db).await;
        repo.record_edit("L9", &fields("Kerb rework")).await.unwrap();
        repo.record_conflict("L9", &remote("Kerb widened", "2024-01-02T00:00:00Z"))
            .await
            .unwrap();

        let updated = repo.mark_synced("L9", "2024-01-03T00:00:00Z").await.unwrap();
        assert!(updated);

        let lot = repo.lot("L9").await.unwrap().unwrap();
        assert_eq!(lot.sync_status, SyncStatus::Synced);
        assert_eq!(
            lot.server_updated_at.as_deref(),
            Some("2024-01-03T00:00:00Z")
        );
        assert!(lot.conflict.is_none());

        // Absent row is a no-op, not an error
        assert!(!repo.mark_synced("L404", "2024-01-03T00:00:00Z").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn resolve_server_adopts_server_version() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = setup_cached(&db).await;
        repo.record_edit("L9", &fields("Kerb rework")).await.unwrap();
        repo.record_conflict("L9", &remote("Kerb widened", "2024-01-02T00:00:00Z"))
            .await
            .unwrap();

        let lot = repo
            .resolve_conflict("L9", ConflictResolution::Server)
            .await
            .unwrap();

        assert_eq!(lot.fields.description.as_deref(), Some("Kerb widened"));
        assert_eq!(lot.sync_status, SyncStatus::Synced);
        assert_eq!(
            lot.server_updated_at.as_deref(),
            Some("2024-01-02T00:00:00Z")
        );
        assert!(repo.open_conflicts().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn resolve_local_keeps_local_fields() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = setup_cached(&db).await;
        repo.record_edit("L9", &fields("Kerb rework")).await.unwrap();
        repo.record_conflict("L9", &remote("Kerb widened", "2024-01-02T00:00:00Z"))
            .await
            .unwrap();

        let lot = repo
            .resolve_conflict("L9", ConflictResolution::Local)
            .await
            .unwrap();

        assert_eq!(lot.fields.description.as_deref(), Some("Kerb rework"));
        assert!(repo.open_conflicts().await.unwrap().is_empty());

        let result = repo.resolve_conflict("L9", ConflictResolution::Local).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
