//! Sync engine and trigger layer.

mod engine;
mod scheduler;

pub use engine::{ConflictNotice, DrainOutcome, DrainReport, SyncEngine, SyncEvents};
pub use scheduler::SyncScheduler;
