//! Lot models and optimistic-concurrency conflict detection.

use serde::{Deserialize, Serialize};

use super::SyncStatus;

/// Mutable fields of a lot, the unit of conflict detection.
///
/// Serialized shape matches the remote API. Legacy payloads carry a single
/// `chainage`/`offset` value; those deserialize into `chainage_start` /
/// `offset_left` and are never stored or compared separately — the start/end
/// pair is the one canonical representation, PATCH bodies included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lot_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "chainage", skip_serializing_if = "Option::is_none")]
    pub chainage_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chainage_end: Option<f64>,
    #[serde(default, alias = "offset", skip_serializing_if = "Option::is_none")]
    pub offset_left: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_right: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl LotFields {
    /// Names of fields whose values differ between `self` and `other`.
    ///
    /// Numeric fields compare by value; text fields by identity.
    pub fn diff(&self, other: &Self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.lot_number != other.lot_number {
            fields.push("lot_number");
        }
        if self.description != other.description {
            fields.push("description");
        }
        if self.chainage_start != other.chainage_start {
            fields.push("chainage_start");
        }
        if self.chainage_end != other.chainage_end {
            fields.push("chainage_end");
        }
        if self.offset_left != other.offset_left {
            fields.push("offset_left");
        }
        if self.offset_right != other.offset_right {
            fields.push("offset_right");
        }
        if self.layer != other.layer {
            fields.push("layer");
        }
        if self.area_zone != other.area_zone {
            fields.push("area_zone");
        }
        if self.activity_type != other.activity_type {
            fields.push("activity_type");
        }
        if self.status != other.status {
            fields.push("status");
        }
        if self.budget != other.budget {
            fields.push("budget");
        }
        if self.notes != other.notes {
            fields.push("notes");
        }
        fields
    }
}

/// Server representation of a lot, as returned by GET/PATCH `/api/lots/{id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteLot {
    pub lot_id: String,
    #[serde(flatten)]
    pub fields: LotFields,
    /// RFC 3339 server-side timestamp.
    pub updated_at: String,
}

/// Outcome of comparing a cached lot edit against the live server state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictCheck {
    pub has_conflict: bool,
    pub conflict_fields: Vec<&'static str>,
}

/// How a human resolved a detected conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    Local,
    Server,
    Merged,
}

/// Both sides of a detected divergence, stored on the lot snapshot while
/// the conflict is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotConflict {
    pub server_version: LotFields,
    pub local_version: LotFields,
    /// RFC 3339 server timestamp seen at detection time.
    pub server_updated_at: String,
    /// Unix ms at detection time.
    pub detected_at: i64,
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ConflictResolution>,
}

/// Cached lot snapshot with the optimistic-concurrency baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedLot {
    pub lot_id: String,
    pub fields: LotFields,
    /// RFC 3339 server timestamp captured at cache time; the baseline
    /// against which server movement is detected.
    pub server_updated_at: Option<String>,
    pub sync_status: SyncStatus,
    /// Unix ms of the last local mutation.
    pub local_updated_at: i64,
    pub conflict: Option<LotConflict>,
}

/// True when the server timestamp is strictly newer than the cached
/// baseline. A missing or unparseable side never claims newness.
pub fn is_server_newer(baseline: Option<&str>, server_updated_at: &str) -> bool {
    let Some(baseline) = baseline else {
        return false;
    };
    let Ok(baseline) = chrono::DateTime::parse_from_rfc3339(baseline) else {
        tracing::warn!("unparseable baseline timestamp: {baseline}");
        return false;
    };
    let Ok(server) = chrono::DateTime::parse_from_rfc3339(server_updated_at) else {
        tracing::warn!("unparseable server timestamp: {server_updated_at}");
        return false;
    };
    server > baseline
}
