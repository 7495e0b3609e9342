//! Mutation queue models.
//!
//! Payloads are a serde-tagged sum type keyed by the item type, so the
//! engine's dispatch match is exhaustive and compiler-checked. Rows whose
//! payload no longer decodes (schema drift) are dropped by the engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{DiaryFields, DocketFields, DocketStatus, LotFields};

/// Body for `POST /api/itp-completions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionPayload {
    pub lot_id: String,
    pub checklist_item_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// RFC 3339.
    pub completed_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<String>,
}

/// Diary save/submit payload; the fields double as the request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryPayload {
    pub project_id: String,
    #[serde(flatten)]
    pub fields: DiaryFields,
}

/// Docket create/submit payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocketPayload {
    pub docket_id: String,
    pub project_id: String,
    pub status: DocketStatus,
    #[serde(flatten)]
    pub fields: DocketFields,
}

/// Photo upload reference. The binary stays in the photos collection; the
/// queue only carries the key, so a deleted photo is a stale reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoUploadPayload {
    pub photo_id: String,
    pub lot_id: String,
}

/// Lot edit payload for conflict-checked PATCH delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotEditPayload {
    pub lot_id: String,
    /// Skip conflict detection and always PATCH.
    #[serde(default)]
    pub force_overwrite: bool,
    pub fields: LotFields,
}

/// One durable, to-be-delivered mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum QueuePayload {
    ChecklistCompletion(CompletionPayload),
    PhotoUpload(PhotoUploadPayload),
    DiarySave(DiaryPayload),
    DiarySubmit(DiaryPayload),
    DocketCreate(DocketPayload),
    DocketSubmit(DocketPayload),
    LotEdit(LotEditPayload),
}

impl QueuePayload {
    /// Stable type tag, also used as the indexed `item_type` column.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::ChecklistCompletion(_) => "checklist-completion",
            Self::PhotoUpload(_) => "photo-upload",
            Self::DiarySave(_) => "diary-save",
            Self::DiarySubmit(_) => "diary-submit",
            Self::DocketCreate(_) => "docket-create",
            Self::DocketSubmit(_) => "docket-submit",
            Self::LotEdit(_) => "lot-edit",
        }
    }

    /// Action recorded alongside the item.
    pub const fn action(&self) -> QueueAction {
        match self {
            Self::ChecklistCompletion(_) | Self::PhotoUpload(_) | Self::DocketCreate(_) => {
                QueueAction::Create
            }
            Self::DiarySave(_)
            | Self::DiarySubmit(_)
            | Self::DocketSubmit(_)
            | Self::LotEdit(_) => QueueAction::Update,
        }
    }
}

/// Whether the queued mutation creates or updates its entity server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueAction {
    Create,
    Update,
}

impl QueueAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for QueueAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueAction {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown queue action: {other}"
            ))),
        }
    }
}

/// A stored queue row. The payload stays as raw JSON until the engine
/// decodes it, so drifted rows can be detected and dropped instead of
/// poisoning the drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    /// Auto-assigned sequence id; FIFO order.
    pub id: i64,
    pub item_type: String,
    pub action: QueueAction,
    pub payload: String,
    /// Unix ms at enqueue time.
    pub created_at: i64,
    pub attempts: i64,
    pub last_error: Option<String>,
}

impl QueueItem {
    /// Decode the stored payload into the typed sum.
    pub fn decode(&self) -> crate::Result<QueuePayload> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}
