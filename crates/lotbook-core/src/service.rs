//! Shared store service wrapper used across clients.
//!
//! Pairs every offline edit with its mutation-queue append inside one
//! transaction, so a crash can never leave a snapshot without its queued
//! delivery (or vice versa).

use std::path::PathBuf;
use std::sync::Arc;

use libsql::Connection;
use tokio::sync::{Mutex, MutexGuard};

use crate::db::{
    ChecklistRepository, Database, DiaryRepository, DocketRepository, LibSqlChecklistRepository,
    LibSqlDiaryRepository, LibSqlDocketRepository, LibSqlLotRepository, LibSqlPhotoRepository,
    LibSqlQueueRepository, LotRepository, PhotoRepository, QueueRepository,
};
use crate::models::{
    CachedChecklist, CachedCompletion, CachedDiary, CachedDocket, CachedLot, CachedPhoto,
    ChecklistItem, CompletionPayload, ConflictCheck, ConflictResolution, DiaryFields,
    DiaryPayload, DocketFields, DocketPayload, DocketStatus, LotEditPayload, LotFields,
    OfflineStats, PhotoUploadPayload, QueueItem, QueuePayload, RemoteLot, SyncStatus,
};
use crate::util::{rfc3339_now, unix_timestamp_millis};
use crate::{Error, Result};

/// Thread-safe service for store and repository operations.
#[derive(Clone)]
pub struct StoreService {
    db: Arc<Mutex<Database>>,
}

impl StoreService {
    /// Open a store at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Lock and access the underlying database.
    pub async fn database(&self) -> MutexGuard<'_, Database> {
        self.db.lock().await
    }

    async fn finish<T>(conn: &Connection, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                conn.execute("COMMIT", ()).await?;
                Ok(value)
            }
            Err(error) => {
                conn.execute("ROLLBACK", ()).await.ok();
                Err(error)
            }
        }
    }

    // ------------------------------------------------------------------
    // Checklists
    // ------------------------------------------------------------------

    /// Upsert a checklist snapshot, overwriting wholesale.
    pub async fn cache_checklist(
        &self,
        lot_id: &str,
        template_id: &str,
        template_name: &str,
        items: Vec<ChecklistItem>,
    ) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlChecklistRepository::new(db.connection());
        repo.cache_checklist(&CachedChecklist {
            lot_id: lot_id.to_string(),
            template_id: template_id.to_string(),
            template_name: template_name.to_string(),
            items,
            cached_at: unix_timestamp_millis(),
        })
        .await
    }

    /// First cached checklist for a lot.
    pub async fn cached_checklist(&self, lot_id: &str) -> Result<Option<CachedChecklist>> {
        let db = self.db.lock().await;
        let repo = LibSqlChecklistRepository::new(db.connection());
        repo.cached_checklist(lot_id).await
    }

    /// Record a field completion: snapshot upsert, queue append, and cached
    /// checklist patch as one logical unit. Replay-safe: re-running the same
    /// completion overwrites the same row.
    pub async fn record_completion(
        &self,
        lot_id: &str,
        checklist_item_id: &str,
        status: &str,
        notes: Option<String>,
        completed_by: Option<String>,
    ) -> Result<CachedCompletion> {
        let completion = CachedCompletion {
            lot_id: lot_id.to_string(),
            checklist_item_id: checklist_item_id.to_string(),
            status: status.to_string(),
            notes,
            completed_by,
            completed_at: rfc3339_now(),
            sync_status: SyncStatus::Pending,
            local_updated_at: unix_timestamp_millis(),
        };

        let db = self.db.lock().await;
        let conn = db.connection();
        conn.execute("BEGIN TRANSACTION", ()).await?;
        let result = async {
            let checklists = LibSqlChecklistRepository::new(conn);
            let queue = LibSqlQueueRepository::new(conn);

            checklists.upsert_completion(&completion).await?;
            queue
                .enqueue(&QueuePayload::ChecklistCompletion(CompletionPayload {
                    lot_id: completion.lot_id.clone(),
                    checklist_item_id: completion.checklist_item_id.clone(),
                    status: completion.status.clone(),
                    notes: completion.notes.clone(),
                    completed_at: completion.completed_at.clone(),
                    completed_by: completion.completed_by.clone(),
                }))
                .await?;
            checklists.patch_cached_item(&completion).await?;
            Ok(completion.clone())
        }
        .await;
        Self::finish(conn, result).await
    }

    /// Fetch a completion row.
    pub async fn completion(
        &self,
        lot_id: &str,
        checklist_item_id: &str,
    ) -> Result<Option<CachedCompletion>> {
        let db = self.db.lock().await;
        let repo = LibSqlChecklistRepository::new(db.connection());
        repo.completion(lot_id, checklist_item_id).await
    }

    /// Mark a completion delivered. No-op if the row was cleared.
    pub async fn mark_completion_synced(
        &self,
        lot_id: &str,
        checklist_item_id: &str,
    ) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlChecklistRepository::new(db.connection());
        repo.set_completion_status(lot_id, checklist_item_id, SyncStatus::Synced)
            .await?;
        Ok(())
    }

    /// Mark a completion's last delivery attempt failed.
    pub async fn mark_completion_error(
        &self,
        lot_id: &str,
        checklist_item_id: &str,
    ) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlChecklistRepository::new(db.connection());
        repo.set_completion_status(lot_id, checklist_item_id, SyncStatus::Error)
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Diaries
    // ------------------------------------------------------------------

    async fn write_diary(
        &self,
        project_id: &str,
        fields: DiaryFields,
        submitted: bool,
    ) -> Result<CachedDiary> {
        let diary = CachedDiary {
            project_id: project_id.to_string(),
            fields,
            submitted,
            sync_status: SyncStatus::Pending,
            local_updated_at: unix_timestamp_millis(),
        };

        let payload = DiaryPayload {
            project_id: diary.project_id.clone(),
            fields: diary.fields.clone(),
        };
        let queued = if submitted {
            QueuePayload::DiarySubmit(payload)
        } else {
            QueuePayload::DiarySave(payload)
        };

        let db = self.db.lock().await;
        let conn = db.connection();
        conn.execute("BEGIN TRANSACTION", ()).await?;
        let result = async {
            LibSqlDiaryRepository::new(conn).upsert(&diary).await?;
            LibSqlQueueRepository::new(conn).enqueue(&queued).await?;
            Ok(diary.clone())
        }
        .await;
        Self::finish(conn, result).await
    }

    /// Save a diary draft offline and queue its delivery.
    pub async fn save_diary(&self, project_id: &str, fields: DiaryFields) -> Result<CachedDiary> {
        self.write_diary(project_id, fields, false).await
    }

    /// Submit a diary offline and queue the submission.
    pub async fn submit_diary(&self, project_id: &str, fields: DiaryFields) -> Result<CachedDiary> {
        self.write_diary(project_id, fields, true).await
    }

    /// Fetch a diary entry.
    pub async fn diary(&self, project_id: &str, diary_date: &str) -> Result<Option<CachedDiary>> {
        let db = self.db.lock().await;
        let repo = LibSqlDiaryRepository::new(db.connection());
        repo.diary(project_id, diary_date).await
    }

    /// Mark a diary delivered. No-op if the row was cleared.
    pub async fn mark_diary_synced(&self, project_id: &str, diary_date: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlDiaryRepository::new(db.connection());
        repo.set_sync_status(project_id, diary_date, SyncStatus::Synced)
            .await?;
        Ok(())
    }

    /// Mark a diary's last delivery attempt failed.
    pub async fn mark_diary_error(&self, project_id: &str, diary_date: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlDiaryRepository::new(db.connection());
        repo.set_sync_status(project_id, diary_date, SyncStatus::Error)
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Dockets
    // ------------------------------------------------------------------

    /// Create a draft docket offline and queue its creation.
    pub async fn create_docket(
        &self,
        project_id: &str,
        fields: DocketFields,
    ) -> Result<CachedDocket> {
        let docket = CachedDocket {
            docket_id: uuid::Uuid::now_v7().to_string(),
            project_id: project_id.to_string(),
            fields,
            status: DocketStatus::Draft,
            sync_status: SyncStatus::Pending,
            local_updated_at: unix_timestamp_millis(),
        };

        let db = self.db.lock().await;
        let conn = db.connection();
        conn.execute("BEGIN TRANSACTION", ()).await?;
        let result = async {
            LibSqlDocketRepository::new(conn).upsert(&docket).await?;
            LibSqlQueueRepository::new(conn)
                .enqueue(&QueuePayload::DocketCreate(Self::docket_payload(&docket)))
                .await?;
            Ok(docket.clone())
        }
        .await;
        Self::finish(conn, result).await
    }

    /// Submit an existing docket for approval and queue the submission.
    pub async fn submit_docket(&self, docket_id: &str) -> Result<CachedDocket> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let repo = LibSqlDocketRepository::new(conn);
        let Some(mut docket) = repo.docket(docket_id).await? else {
            return Err(Error::NotFound(format!("docket {docket_id}")));
        };
        docket.status = DocketStatus::PendingApproval;
        docket.sync_status = SyncStatus::Pending;
        docket.local_updated_at = unix_timestamp_millis();

        conn.execute("BEGIN TRANSACTION", ()).await?;
        let result = async {
            LibSqlDocketRepository::new(conn).upsert(&docket).await?;
            LibSqlQueueRepository::new(conn)
                .enqueue(&QueuePayload::DocketSubmit(Self::docket_payload(&docket)))
                .await?;
            Ok(docket.clone())
        }
        .await;
        Self::finish(conn, result).await
    }

    fn docket_payload(docket: &CachedDocket) -> DocketPayload {
        DocketPayload {
            docket_id: docket.docket_id.clone(),
            project_id: docket.project_id.clone(),
            status: docket.status,
            fields: docket.fields.clone(),
        }
    }

    /// Fetch a docket.
    pub async fn docket(&self, docket_id: &str) -> Result<Option<CachedDocket>> {
        let db = self.db.lock().await;
        let repo = LibSqlDocketRepository::new(db.connection());
        repo.docket(docket_id).await
    }

    /// Mark a docket delivered. No-op if the row was cleared.
    pub async fn mark_docket_synced(&self, docket_id: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlDocketRepository::new(db.connection());
        repo.set_sync_status(docket_id, SyncStatus::Synced).await?;
        Ok(())
    }

    /// Mark a docket's last delivery attempt failed.
    pub async fn mark_docket_error(&self, docket_id: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlDocketRepository::new(db.connection());
        repo.set_sync_status(docket_id, SyncStatus::Error).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Photos
    // ------------------------------------------------------------------

    /// Store a photo offline (bytes inline) and queue its upload.
    ///
    /// `original_size` is the pre-compression size reported by the caller;
    /// compression itself happens upstream.
    pub async fn store_photo(
        &self,
        lot_id: &str,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
        original_size: i64,
        caption: Option<String>,
    ) -> Result<CachedPhoto> {
        let now = unix_timestamp_millis();
        let photo = CachedPhoto {
            photo_id: uuid::Uuid::now_v7().to_string(),
            lot_id: lot_id.to_string(),
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            compressed_size: i64::try_from(data.len()).unwrap_or(i64::MAX),
            data,
            original_size,
            caption,
            sync_status: SyncStatus::Pending,
            local_updated_at: now,
            created_at: now,
        };

        let db = self.db.lock().await;
        let conn = db.connection();
        conn.execute("BEGIN TRANSACTION", ()).await?;
        let result = async {
            LibSqlPhotoRepository::new(conn).store(&photo).await?;
            LibSqlQueueRepository::new(conn)
                .enqueue(&QueuePayload::PhotoUpload(PhotoUploadPayload {
                    photo_id: photo.photo_id.clone(),
                    lot_id: photo.lot_id.clone(),
                }))
                .await?;
            Ok(photo.clone())
        }
        .await;
        Self::finish(conn, result).await
    }

    /// Fetch a photo including its bytes.
    pub async fn photo(&self, photo_id: &str) -> Result<Option<CachedPhoto>> {
        let db = self.db.lock().await;
        let repo = LibSqlPhotoRepository::new(db.connection());
        repo.photo(photo_id).await
    }

    /// Discard a photo before upload. The queued item becomes a stale
    /// reference and is dropped by the next drain.
    pub async fn delete_photo(&self, photo_id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlPhotoRepository::new(db.connection());
        repo.delete(photo_id).await
    }

    /// Mark a photo delivered. No-op if the row was cleared.
    pub async fn mark_photo_synced(&self, photo_id: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlPhotoRepository::new(db.connection());
        repo.set_sync_status(photo_id, SyncStatus::Synced).await?;
        Ok(())
    }

    /// Mark a photo's last delivery attempt failed.
    pub async fn mark_photo_error(&self, photo_id: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlPhotoRepository::new(db.connection());
        repo.set_sync_status(photo_id, SyncStatus::Error).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lots
    // ------------------------------------------------------------------

    /// Cache a fresh server copy of a lot, capturing the baseline.
    pub async fn cache_lot(
        &self,
        lot_id: &str,
        fields: &LotFields,
        server_updated_at: &str,
    ) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlLotRepository::new(db.connection());
        repo.cache_lot(lot_id, fields, server_updated_at).await
    }

    /// Fetch a cached lot.
    pub async fn lot(&self, lot_id: &str) -> Result<Option<CachedLot>> {
        let db = self.db.lock().await;
        let repo = LibSqlLotRepository::new(db.connection());
        repo.lot(lot_id).await
    }

    /// Record a local lot edit and queue its conflict-checked delivery.
    pub async fn record_lot_edit(
        &self,
        lot_id: &str,
        fields: &LotFields,
        force_overwrite: bool,
    ) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        conn.execute("BEGIN TRANSACTION", ()).await?;
        let result = async {
            LibSqlLotRepository::new(conn)
                .record_edit(lot_id, fields)
                .await?;
            LibSqlQueueRepository::new(conn)
                .enqueue(&QueuePayload::LotEdit(LotEditPayload {
                    lot_id: lot_id.to_string(),
                    force_overwrite,
                    fields: fields.clone(),
                }))
                .await?;
            Ok(())
        }
        .await;
        Self::finish(conn, result).await
    }

    /// Compare a cached lot edit against the live server representation.
    pub async fn detect_lot_sync_conflict(
        &self,
        lot_id: &str,
        server: &RemoteLot,
    ) -> Result<ConflictCheck> {
        let db = self.db.lock().await;
        let repo = LibSqlLotRepository::new(db.connection());
        repo.detect_sync_conflict(lot_id, server).await
    }

    /// Open a conflict on the lot snapshot, keeping both versions.
    pub async fn record_lot_conflict(&self, lot_id: &str, server: &RemoteLot) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlLotRepository::new(db.connection());
        repo.record_conflict(lot_id, server).await
    }

    /// Acknowledge a delivered lot edit with the new server baseline.
    pub async fn mark_lot_synced(&self, lot_id: &str, new_server_updated_at: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlLotRepository::new(db.connection());
        repo.mark_synced(lot_id, new_server_updated_at).await?;
        Ok(())
    }

    /// Mark a lot's last delivery attempt failed.
    pub async fn mark_lot_sync_error(&self, lot_id: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlLotRepository::new(db.connection());
        repo.set_sync_status(lot_id, SyncStatus::Error).await?;
        Ok(())
    }

    /// Lots with an open conflict awaiting a human decision.
    pub async fn open_conflicts(&self) -> Result<Vec<CachedLot>> {
        let db = self.db.lock().await;
        let repo = LibSqlLotRepository::new(db.connection());
        repo.open_conflicts().await
    }

    /// Record the human decision on an open conflict.
    ///
    /// Keeping the local version re-queues it as a force-overwrite edit so
    /// the next drain PATCHes without another conflict check.
    pub async fn resolve_lot_conflict(
        &self,
        lot_id: &str,
        resolution: ConflictResolution,
    ) -> Result<CachedLot> {
        let db = self.db.lock().await;
        let conn = db.connection();
        conn.execute("BEGIN TRANSACTION", ()).await?;
        let result = async {
            let lot = LibSqlLotRepository::new(conn)
                .resolve_conflict(lot_id, resolution)
                .await?;

            if resolution == ConflictResolution::Local {
                LibSqlLotRepository::new(conn)
                    .set_sync_status(lot_id, SyncStatus::Pending)
                    .await?;
                LibSqlQueueRepository::new(conn)
                    .enqueue(&QueuePayload::LotEdit(LotEditPayload {
                        lot_id: lot_id.to_string(),
                        force_overwrite: true,
                        fields: lot.fields.clone(),
                    }))
                    .await?;
            }
            Ok(lot)
        }
        .await;
        Self::finish(conn, result).await
    }

    // ------------------------------------------------------------------
    // Queue and stats
    // ------------------------------------------------------------------

    /// Snapshot of all queued items in FIFO order.
    pub async fn pending_queue(&self) -> Result<Vec<QueueItem>> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.pending().await
    }

    /// Remove a queue item.
    pub async fn delete_queue_item(&self, id: i64) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.delete(id).await
    }

    /// Record a failed dispatch for a queue item.
    pub async fn record_queue_failure(&self, id: i64, error: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.record_failure(id, error).await
    }

    /// Queue depth broken down by item type.
    pub async fn queue_counts_by_type(&self) -> Result<Vec<(String, u64)>> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.counts_by_type().await
    }

    /// Pending and conflict counts for display.
    pub async fn stats(&self) -> Result<OfflineStats> {
        let db = self.db.lock().await;
        let pending = LibSqlQueueRepository::new(db.connection()).count().await?;
        let conflicts = LibSqlLotRepository::new(db.connection())
            .open_conflicts()
            .await?
            .len() as u64;
        Ok(OfflineStats { pending, conflicts })
    }

    /// Destructively wipe every offline collection.
    pub async fn clear_offline_data(&self) -> Result<()> {
        let db = self.db.lock().await;
        db.clear_offline_data().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn items() -> Vec<ChecklistItem> {
        vec![ChecklistItem {
            item_id: "C1".into(),
            description: "Survey conformance".into(),
            status: None,
            notes: None,
            completed_at: None,
            completed_by: None,
        }]
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn record_completion_pairs_snapshot_and_queue_item() {
        let service = StoreService::open_in_memory().await.unwrap();
        service
            .cache_checklist("L1", "T1", "Earthworks ITP", items())
            .await
            .unwrap();

        service
            .record_completion("L1", "C1", "completed", Some("ok".into()), None)
            .await
            .unwrap();

        let completion = service.completion("L1", "C1").await.unwrap().unwrap();
        assert_eq!(completion.sync_status, SyncStatus::Pending);

        let queue = service.pending_queue().await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].item_type, "checklist-completion");

        // Cached checklist item patched in place
        let checklist = service.cached_checklist("L1").await.unwrap().unwrap();
        assert_eq!(checklist.items[0].status.as_deref(), Some("completed"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replaying_a_completion_keeps_one_row() {
        let service = StoreService::open_in_memory().await.unwrap();

        service
            .record_completion("L1", "C1", "completed", None, None)
            .await
            .unwrap();
        service
            .record_completion("L1", "C1", "completed", None, None)
            .await
            .unwrap();

        let db = service.database().await;
        let mut rows = db
            .connection()
            .query("SELECT COUNT(*) FROM checklist_completions", ())
            .await
            .unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mark_synced_is_a_noop_for_absent_rows() {
        let service = StoreService::open_in_memory().await.unwrap();
        service.mark_completion_synced("L1", "C1").await.unwrap();
        service.mark_diary_synced("P1", "2024-03-01").await.unwrap();
        service.mark_photo_synced("PH1").await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn submit_docket_requires_existing_row() {
        let service = StoreService::open_in_memory().await.unwrap();
        let result = service.submit_docket("nope").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn clear_offline_data_empties_every_collection() {
        let service = StoreService::open_in_memory().await.unwrap();
        service
            .cache_checklist("L1", "T1", "ITP", items())
            .await
            .unwrap();
        service
            .cache_checklist("L2", "T1", "ITP", items())
            .await
            .unwrap();
        service
            .cache_checklist("L3", "T1", "ITP", items())
            .await
            .unwrap();
        service
            .record_completion("L1", "C1", "completed", None, None)
            .await
            .unwrap();
        service
            .store_photo("L1", "a.jpg", "image/jpeg", vec![1, 2, 3], 3, None)
            .await
            .unwrap();

        let stats = service.stats().await.unwrap();
        assert_eq!(stats.pending, 2);

        service.clear_offline_data().await.unwrap();

        let stats = service.stats().await.unwrap();
        assert_eq!(stats, OfflineStats::default());
        assert!(service.cached_checklist("L1").await.unwrap().is_none());
        assert!(service.completion("L1", "C1").await.unwrap().is_none());
    }
}
