//! Delivery docket models.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::SyncStatus;

/// Editable fields of a delivery docket. Serialized shape matches the
/// remote API docket bodies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocketFields {
    pub docket_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// ISO date of delivery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Workflow status carried in docket request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocketStatus {
    Draft,
    PendingApproval,
}

impl DocketStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingApproval => "pending_approval",
        }
    }
}

impl fmt::Display for DocketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cached docket, keyed by a locally minted `docket_id` (UUID v7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedDocket {
    pub docket_id: String,
    pub project_id: String,
    pub fields: DocketFields,
    pub status: DocketStatus,
    pub sync_status: SyncStatus,
    /// Unix ms of the last local mutation.
    pub local_updated_at: i64,
}
