//! Site diary models.

use serde::{Deserialize, Serialize};

use super::SyncStatus;

/// Editable fields of a daily site diary. Serialized shape matches the
/// remote API body for `PUT /api/diary/{projectId}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryFields {
    /// ISO date (`YYYY-MM-DD`) the entry covers.
    pub diary_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workforce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activities: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delays: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visitors: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Cached diary entry, keyed by `project_id` + `diary_date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedDiary {
    pub project_id: String,
    pub fields: DiaryFields,
    /// True once the entry was submitted (not just saved as draft).
    pub submitted: bool,
    pub sync_status: SyncStatus,
    /// Unix ms of the last local mutation.
    pub local_updated_at: i64,
}
