//! Sync lifecycle state shared by every cached snapshot.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of the last local write to a cached entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Last local write has been acknowledged by the server.
    Synced,
    /// Last local write is queued and awaiting delivery.
    Pending,
    /// Last delivery attempt failed; the item remains queued.
    Error,
}

impl SyncStatus {
    /// Stable string form used in database columns.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "synced" => Ok(Self::Synced),
            "pending" => Ok(Self::Pending),
            "error" => Ok(Self::Error),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown sync status: {other}"
            ))),
        }
    }
}

/// Counts displayed to the user while the engine works in the background.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineStats {
    /// Queue items awaiting delivery.
    pub pending: u64,
    /// Open (unresolved) lot conflicts.
    pub conflicts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrips_through_column_form() {
        for status in [SyncStatus::Synced, SyncStatus::Pending, SyncStatus::Error] {
            let parsed: SyncStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn status_rejects_unknown_value() {
        assert!("done".parse::<SyncStatus>().is_err());
    }
}
