//! Site photo models.
//!
//! The original bytes are stored inline in the local store; compression
//! happens before the bytes reach us, we only record both sizes.

use serde::{Deserialize, Serialize};

use super::SyncStatus;

/// Cached photo, keyed by a locally minted `photo_id` (UUID v7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPhoto {
    pub photo_id: String,
    pub lot_id: String,
    pub file_name: String,
    pub content_type: String,
    /// Original binary, inline.
    #[serde(skip)]
    pub data: Vec<u8>,
    pub original_size: i64,
    pub compressed_size: i64,
    pub caption: Option<String>,
    pub sync_status: SyncStatus,
    /// Unix ms of the last local mutation.
    pub local_updated_at: i64,
    /// Unix ms when the photo was captured locally.
    pub created_at: i64,
}

/// Assembled multipart upload for `POST /api/documents/upload`.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub photo_id: String,
    pub lot_id: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub caption: Option<String>,
}

impl From<CachedPhoto> for PhotoUpload {
    fn from(photo: CachedPhoto) -> Self {
        Self {
            photo_id: photo.photo_id,
            lot_id: photo.lot_id,
            file_name: photo.file_name,
            content_type: photo.content_type,
            data: photo.data,
            caption: photo.caption,
        }
    }
}
