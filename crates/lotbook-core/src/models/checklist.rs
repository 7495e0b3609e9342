//! Checklist snapshot and completion models.

use serde::{Deserialize, Serialize};

use super::SyncStatus;

/// One line item of an inspection checklist template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub item_id: String,
    pub description: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// RFC 3339, set when the item is completed in the field.
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub completed_by: Option<String>,
}

/// Cached copy of a checklist for a lot, keyed by `lot_id` + `template_id`.
///
/// Overwritten wholesale on re-cache, never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedChecklist {
    pub lot_id: String,
    pub template_id: String,
    pub template_name: String,
    pub items: Vec<ChecklistItem>,
    /// Unix ms when this snapshot was cached.
    pub cached_at: i64,
}

/// A locally recorded checklist item completion, keyed by
/// `lot_id` + `checklist_item_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCompletion {
    pub lot_id: String,
    pub checklist_item_id: String,
    pub status: String,
    pub notes: Option<String>,
    pub completed_by: Option<String>,
    /// RFC 3339, server-facing.
    pub completed_at: String,
    pub sync_status: SyncStatus,
    /// Unix ms of the last local mutation.
    pub local_updated_at: i64,
}
