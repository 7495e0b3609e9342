//! Sync engine: drains the mutation queue against the remote API.
//!
//! One drain processes the queue snapshot taken at start, strictly FIFO,
//! fully resolving each item before moving to the next. A re-entrant drain
//! is a no-op (single-flight), so the same queued item can never be
//! delivered twice concurrently.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

use crate::config::SyncPolicy;
use crate::models::{
    CompletionPayload, DiaryPayload, DocketPayload, LotEditPayload, OfflineStats,
    PhotoUploadPayload, QueueItem, QueuePayload,
};
use crate::remote::RemoteApi;
use crate::service::StoreService;
use crate::Result;

/// Notification payload for a detected lot conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictNotice {
    pub lot_id: String,
    pub lot_number: String,
    pub message: String,
}

type SyncCompleteFn = Box<dyn Fn(usize) + Send + Sync>;
type ConflictDetectedFn = Box<dyn Fn(ConflictNotice) + Send + Sync>;

/// Callback pair injected at engine construction. No ambient globals: the
/// UI layer decides what a notification looks like.
#[derive(Default)]
pub struct SyncEvents {
    on_sync_complete: Option<SyncCompleteFn>,
    on_conflict_detected: Option<ConflictDetectedFn>,
}

impl SyncEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called after a drain that delivered at least one item.
    #[must_use]
    pub fn on_sync_complete(mut self, callback: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_sync_complete = Some(Box::new(callback));
        self
    }

    /// Called once per detected lot conflict, with a human-readable message.
    #[must_use]
    pub fn on_conflict_detected(
        mut self,
        callback: impl Fn(ConflictNotice) + Send + Sync + 'static,
    ) -> Self {
        self.on_conflict_detected = Some(Box::new(callback));
        self
    }

    fn emit_sync_complete(&self, count: usize) {
        if let Some(callback) = &self.on_sync_complete {
            callback(count);
        }
    }

    fn emit_conflict(&self, notice: ConflictNotice) {
        if let Some(callback) = &self.on_conflict_detected {
            callback(notice);
        }
    }
}

/// Result of one drain invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// A full pass over the queue snapshot ran.
    Completed(DrainReport),
    /// Connectivity is down; nothing was attempted.
    Offline,
    /// Another drain is in flight; nothing was attempted.
    AlreadyRunning,
}

/// Per-run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Items delivered and removed.
    pub synced: usize,
    /// Items that failed dispatch and stay queued.
    pub failed: usize,
    /// Lot conflicts detected (items removed without dispatch).
    pub conflicts: usize,
    /// Items dropped: stale references, drifted payloads, attempt ceiling.
    pub dropped: usize,
}

/// Drains the mutation queue when connectivity allows.
pub struct SyncEngine<R> {
    store: StoreService,
    remote: R,
    policy: SyncPolicy,
    events: SyncEvents,
    online: AtomicBool,
    syncing: AtomicBool,
    stats_tx: watch::Sender<OfflineStats>,
}

impl<R: RemoteApi> SyncEngine<R> {
    pub fn new(store: StoreService, remote: R, policy: SyncPolicy, events: SyncEvents) -> Self {
        let (stats_tx, _) = watch::channel(OfflineStats::default());
        Self {
            store,
            remote,
            policy,
            events,
            online: AtomicBool::new(true),
            syncing: AtomicBool::new(false),
            stats_tx,
        }
    }

    /// Update the connectivity belief. The trigger layer calls this on
    /// every transition; a drain while offline is a clean no-op.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Subscribe to pending/conflict counts published after each drain and
    /// on every stats refresh.
    pub fn subscribe_stats(&self) -> watch::Receiver<OfflineStats> {
        self.stats_tx.subscribe()
    }

    /// Recompute and publish the displayed counts without draining.
    pub async fn refresh_stats(&self) -> Result<OfflineStats> {
        let stats = self.store.stats().await?;
        self.stats_tx.send_replace(stats);
        Ok(stats)
    }

    /// Run one full pass over the current queue snapshot.
    ///
    /// Items enqueued mid-run are picked up on the next invocation.
    pub async fn drain(&self) -> Result<DrainOutcome> {
        if !self.is_online() {
            return Ok(DrainOutcome::Offline);
        }
        if self.syncing.swap(true, Ordering::SeqCst) {
            return Ok(DrainOutcome::AlreadyRunning);
        }

        let result = self.drain_queue().await;
        self.syncing.store(false, Ordering::SeqCst);
        let report = result?;

        self.refresh_stats().await?;
        if report.synced > 0 {
            self.events.emit_sync_complete(report.synced);
        }

        Ok(DrainOutcome::Completed(report))
    }

    async fn drain_queue(&self) -> Result<DrainReport> {
        let items = self.store.pending_queue().await?;
        let mut report = DrainReport::default();

        for item in items {
            if item.attempts >= i64::from(self.policy.max_attempts) {
                tracing::warn!(
                    "giving up on queue item {} ({}) after {} attempts",
                    item.id,
                    item.item_type,
                    item.attempts
                );
                self.store.delete_queue_item(item.id).await?;
                report.dropped += 1;
                continue;
            }

            let payload = match item.decode() {
                Ok(payload) => payload,
                Err(error) => {
                    // Schema drift; retrying forever helps nobody
                    tracing::warn!(
                        "dropping undecodable queue item {} ({}): {error}",
                        item.id,
                        item.item_type
                    );
                    self.store.delete_queue_item(item.id).await?;
                    report.dropped += 1;
                    continue;
                }
            };

            self.process_item(&item, payload, &mut report).await?;
        }

        Ok(report)
    }

    /// Fully resolve one item: deliver, re-queue with an error, or drop.
    /// Dispatch failures are recorded per item and never abort the run.
    async fn process_item(
        &self,
        item: &QueueItem,
        payload: QueuePayload,
        report: &mut DrainReport,
    ) -> Result<()> {
        match payload {
            QueuePayload::ChecklistCompletion(payload) => {
                self.process_completion(item, &payload, report).await
            }
            QueuePayload::PhotoUpload(payload) => self.process_photo(item, &payload, report).await,
            QueuePayload::DiarySave(payload) => {
                self.process_diary(item, &payload, false, report).await
            }
            QueuePayload::DiarySubmit(payload) => {
                self.process_diary(item, &payload, true, report).await
            }
            QueuePayload::DocketCreate(payload) => {
                self.process_docket(item, &payload, false, report).await
            }
            QueuePayload::DocketSubmit(payload) => {
                self.process_docket(item, &payload, true, report).await
            }
            QueuePayload::LotEdit(payload) => self.process_lot_edit(item, payload, report).await,
        }
    }

    async fn drop_stale(&self, item: &QueueItem, report: &mut DrainReport) -> Result<()> {
        tracing::debug!(
            "queue item {} ({}) references an entity no longer cached; dropping",
            item.id,
            item.item_type
        );
        self.store.delete_queue_item(item.id).await?;
        report.dropped += 1;
        Ok(())
    }

    async fn process_completion(
        &self,
        item: &QueueItem,
        payload: &CompletionPayload,
        report: &mut DrainReport,
    ) -> Result<()> {
        if self
            .store
            .completion(&payload.lot_id, &payload.checklist_item_id)
            .await?
            .is_none()
        {
            return self.drop_stale(item, report).await;
        }

        match self.remote.create_completion(payload).await {
            Ok(()) => {
                self.store.delete_queue_item(item.id).await?;
                self.store
                    .mark_completion_synced(&payload.lot_id, &payload.checklist_item_id)
                    .await?;
                report.synced += 1;
            }
            Err(error) => {
                self.store
                    .record_queue_failure(item.id, &error.to_string())
                    .await?;
                self.store
                    .mark_completion_error(&payload.lot_id, &payload.checklist_item_id)
                    .await?;
                report.failed += 1;
            }
        }
        Ok(())
    }

    async fn process_photo(
        &self,
        item: &QueueItem,
        payload: &PhotoUploadPayload,
        report: &mut DrainReport,
    ) -> Result<()> {
        let Some(photo) = self.store.photo(&payload.photo_id).await? else {
            return self.drop_stale(item, report).await;
        };
        let photo_id = photo.photo_id.clone();

        match self.remote.upload_photo(&photo.into()).await {
            Ok(()) => {
                self.store.delete_queue_item(item.id).await?;
                self.store.mark_photo_synced(&photo_id).await?;
                report.synced += 1;
            }
            Err(error) => {
                self.store
                    .record_queue_failure(item.id, &error.to_string())
                    .await?;
                self.store.mark_photo_error(&photo_id).await?;
                report.failed += 1;
            }
        }
        Ok(())
    }

    async fn process_diary(
        &self,
        item: &QueueItem,
        payload: &DiaryPayload,
        submit: bool,
        report: &mut DrainReport,
    ) -> Result<()> {
        if self
            .store
            .diary(&payload.project_id, &payload.fields.diary_date)
            .await?
            .is_none()
        {
            return self.drop_stale(item, report).await;
        }

        let dispatched = if submit {
            self.remote
                .submit_diary(&payload.project_id, &payload.fields)
                .await
        } else {
            self.remote
                .save_diary(&payload.project_id, &payload.fields)
                .await
        };

        match dispatched {
            Ok(()) => {
                self.store.delete_queue_item(item.id).await?;
                self.store
                    .mark_diary_synced(&payload.project_id, &payload.fields.diary_date)
                    .await?;
                report.synced += 1;
            }
            Err(error) => {
                self.store
                    .record_queue_failure(item.id, &error.to_string())
                    .await?;
                self.store
                    .mark_diary_error(&payload.project_id, &payload.fields.diary_date)
                    .await?;
                report.failed += 1;
            }
        }
        Ok(())
    }

    async fn process_docket(
        &self,
        item: &QueueItem,
        payload: &DocketPayload,
        submit: bool,
        report: &mut DrainReport,
    ) -> Result<()> {
        if self.store.docket(&payload.docket_id).await?.is_none() {
            return self.drop_stale(item, report).await;
        }

        let dispatched = if submit {
            self.remote.submit_docket(payload).await
        } else {
            self.remote.create_docket(payload).await
        };

        match dispatched {
            Ok(()) => {
                self.store.delete_queue_item(item.id).await?;
                self.store.mark_docket_synced(&payload.docket_id).await?;
                report.synced += 1;
            }
            Err(error) => {
                self.store
                    .record_queue_failure(item.id, &error.to_string())
                    .await?;
                self.store.mark_docket_error(&payload.docket_id).await?;
                report.failed += 1;
            }
        }
        Ok(())
    }

    /// Lot edits are conflict-checked against the live server state before
    /// dispatch, unless the edit carries the force-overwrite flag. The
    /// queued payload's view of the server is stale by definition, so the
    /// check always re-fetches.
    async fn process_lot_edit(
        &self,
        item: &QueueItem,
        payload: LotEditPayload,
        report: &mut DrainReport,
    ) -> Result<()> {
        let Some(lot) = self.store.lot(&payload.lot_id).await? else {
            return self.drop_stale(item, report).await;
        };

        if !payload.force_overwrite {
            let server = match self.remote.fetch_lot(&payload.lot_id).await {
                Ok(server) => server,
                Err(error) => {
                    self.store
                        .record_queue_failure(item.id, &error.to_string())
                        .await?;
                    self.store.mark_lot_sync_error(&payload.lot_id).await?;
                    report.failed += 1;
                    return Ok(());
                }
            };

            let check = self
                .store
                .detect_lot_sync_conflict(&payload.lot_id, &server)
                .await?;
            if check.has_conflict {
                self.store
                    .record_lot_conflict(&payload.lot_id, &server)
                    .await?;
                // A conflicting write must not be retried blindly
                self.store.delete_queue_item(item.id).await?;
                report.conflicts += 1;

                let lot_number = lot
                    .fields
                    .lot_number
                    .clone()
                    .unwrap_or_else(|| payload.lot_id.clone());
                self.events.emit_conflict(ConflictNotice {
                    lot_id: payload.lot_id.clone(),
                    lot_number: lot_number.clone(),
                    message: format!(
                        "Lot {lot_number} was changed on the server ({}); review before syncing",
                        check.conflict_fields.join(", ")
                    ),
                });
                return Ok(());
            }
        }

        match self.remote.patch_lot(&payload.lot_id, &payload.fields).await {
            Ok(updated) => {
                self.store.delete_queue_item(item.id).await?;
                self.store
                    .mark_lot_synced(&payload.lot_id, &updated.updated_at)
                    .await?;
                report.synced += 1;
            }
            Err(error) => {
                self.store
                    .record_queue_failure(item.id, &error.to_string())
                    .await?;
                self.store.mark_lot_sync_error(&payload.lot_id).await?;
                report.failed += 1;
            }
        }
        Ok(())
    }
}
