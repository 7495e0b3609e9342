//! Scripted remote used by the engine and scheduler tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lotbook_core::models::{
    CompletionPayload, DiaryFields, DocketPayload, LotFields, PhotoUpload, RemoteLot,
};
use lotbook_core::remote::{DispatchError, DispatchResult, RemoteApi};
use tokio::sync::Notify;

/// In-memory stand-in for the remote API: records every dispatch in call
/// order, can be told to fail, and serves scripted lot state for the
/// conflict pre-check.
#[derive(Clone, Default)]
pub struct ScriptedRemote {
    calls: Arc<Mutex<Vec<String>>>,
    fail_all: Arc<AtomicBool>,
    server_lots: Arc<Mutex<HashMap<String, RemoteLot>>>,
    patch_updated_at: Arc<Mutex<String>>,
    gate: Arc<Mutex<Option<Arc<Notify>>>>,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        let remote = Self::default();
        *remote.patch_updated_at.lock().unwrap() = "2024-02-01T00:00:00Z".to_string();
        remote
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    pub fn put_server_lot(&self, lot: RemoteLot) {
        self.server_lots
            .lock()
            .unwrap()
            .insert(lot.lot_id.clone(), lot);
    }

    pub fn set_patch_updated_at(&self, updated_at: &str) {
        *self.patch_updated_at.lock().unwrap() = updated_at.to_string();
    }

    /// Make the next dispatches wait until the returned handle is notified.
    pub fn install_gate(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    async fn dispatch(&self, label: String) -> DispatchResult<()> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        // Record attempts whether or not they succeed
        self.calls.lock().unwrap().push(label.clone());
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(DispatchError::Api(format!("scripted failure for {label}")));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteApi for ScriptedRemote {
    async fn create_completion(&self, payload: &CompletionPayload) -> DispatchResult<()> {
        self.dispatch(format!(
            "completion {}/{}",
            payload.lot_id, payload.checklist_item_id
        ))
        .await
    }

    async fn save_diary(&self, project_id: &str, fields: &DiaryFields) -> DispatchResult<()> {
        self.dispatch(format!("diary-save {project_id} {}", fields.diary_date))
            .await
    }

    async fn submit_diary(&self, project_id: &str, fields: &DiaryFields) -> DispatchResult<()> {
        self.dispatch(format!("diary-submit {project_id} {}", fields.diary_date))
            .await
    }

    async fn create_docket(&self, payload: &DocketPayload) -> DispatchResult<()> {
        self.dispatch(format!("docket-create {}", payload.docket_id))
            .await
    }

    async fn submit_docket(&self, payload: &DocketPayload) -> DispatchResult<()> {
        self.dispatch(format!("docket-submit {}", payload.docket_id))
            .await
    }

    async fn upload_photo(&self, upload: &PhotoUpload) -> DispatchResult<()> {
        self.dispatch(format!("photo-upload {}", upload.photo_id))
            .await
    }

    async fn fetch_lot(&self, lot_id: &str) -> DispatchResult<RemoteLot> {
        self.dispatch(format!("fetch-lot {lot_id}")).await?;
        self.server_lots
            .lock()
            .unwrap()
            .get(lot_id)
            .cloned()
            .ok_or_else(|| DispatchError::Api(format!("lot {lot_id} not found (404)")))
    }

    async fn patch_lot(&self, lot_id: &str, fields: &LotFields) -> DispatchResult<RemoteLot> {
        self.dispatch(format!("patch-lot {lot_id}")).await?;
        let updated = RemoteLot {
            lot_id: lot_id.to_string(),
            fields: fields.clone(),
            updated_at: self.patch_updated_at.lock().unwrap().clone(),
        };
        self.server_lots
            .lock()
            .unwrap()
            .insert(lot_id.to_string(), updated.clone());
        Ok(updated)
    }
}
