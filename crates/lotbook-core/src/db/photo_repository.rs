//! Photo repository implementation
//!
//! Stores the original binary inline so a queued upload survives restarts
//! without touching the filesystem.

use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{CachedPhoto, SyncStatus};

/// Trait for photo storage operations (async)
#[allow(async_fn_in_trait)]
pub trait PhotoRepository {
    /// Insert or replace a photo row, bytes included
    async fn store(&self, photo: &CachedPhoto) -> Result<()>;

    /// Fetch a photo including its bytes
    async fn photo(&self, photo_id: &str) -> Result<Option<CachedPhoto>>;

    /// Flip sync status; returns false when the row is absent
    async fn set_sync_status(&self, photo_id: &str, status: SyncStatus) -> Result<bool>;

    /// Remove a photo that was discarded before upload; returns false when
    /// the row is absent
    async fn delete(&self, photo_id: &str) -> Result<bool>;
}

/// libSQL implementation of `PhotoRepository`
pub struct LibSqlPhotoRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlPhotoRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_photo(row: &libsql::Row) -> Result<CachedPhoto> {
        let sync_status: String = row.get(8)?;
        Ok(CachedPhoto {
            photo_id: row.get(0)?,
            lot_id: row.get(1)?,
            file_name: row.get(2)?,
            content_type: row.get(3)?,
            data: row.get(4)?,
            original_size: row.get(5)?,
            compressed_size: row.get(6)?,
            caption: row.get(7)?,
            sync_status: sync_status.parse()?,
            local_updated_at: row.get(9)?,
            created_at: row.get(10)?,
        })
    }
}

impl PhotoRepository for LibSqlPhotoRepository<'_> {
    async fn store(&self, photo: &CachedPhoto) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO photos
                 (photo_id, lot_id, file_name, content_type, data, original_size,
                  compressed_size, caption, sync_status, local_updated_at, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    photo.photo_id.as_str(),
                    photo.lot_id.as_str(),
                    photo.file_name.as_str(),
                    photo.content_type.as_str(),
                    photo.data.clone(),
                    photo.original_size,
                    photo.compressed_size,
                    photo.caption.clone(),
                    photo.sync_status.as_str(),
                    photo.local_updated_at,
                    photo.created_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn photo(&self, photo_id: &str) -> Result<Option<CachedPhoto>> {
        let mut rows = self
            .conn
            .query(
                "SELECT photo_id, lot_id, file_name, content_type, data, original_size,
                        compressed_size, caption, sync_status, local_updated_at, created_at
                 FROM photos WHERE photo_id = ?",
                params![photo_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_photo(&row)?)),
            None => Ok(None),
        }
    }

    async fn set_sync_status(&self, photo_id: &str, status: SyncStatus) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE photos SET sync_status = ? WHERE photo_id = ?",
                params![status.as_str(), photo_id],
            )
            .await?;
        Ok(rows > 0)
    }

    async fn delete(&self, photo_id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM photos WHERE photo_id = ?", params![photo_id])
            .await?;
        Ok(rows > 0)
    }
}
