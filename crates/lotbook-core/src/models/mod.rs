//! Data models for Lotbook

mod checklist;
mod diary;
mod docket;
mod lot;
mod photo;
mod queue;
mod sync_status;

pub use checklist::{CachedChecklist, CachedCompletion, ChecklistItem};
pub use diary::{CachedDiary, DiaryFields};
pub use docket::{CachedDocket, DocketFields, DocketStatus};
pub use lot::{is_server_newer, CachedLot, ConflictCheck, ConflictResolution, LotConflict, LotFields, RemoteLot};
pub use photo::{CachedPhoto, PhotoUpload};
pub use queue::{
    CompletionPayload, DiaryPayload, DocketPayload, LotEditPayload, PhotoUploadPayload,
    QueueAction, QueueItem, QueuePayload,
};
pub use sync_status::{OfflineStats, SyncStatus};
