//! lotbook-core - Core library for Lotbook
//!
//! Offline-first data layer for construction-site quality management:
//! a durable local store for field edits, a mutation queue with
//! at-least-once delivery, and a sync engine with optimistic-concurrency
//! conflict detection for lot edits.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod service;
pub mod sync;
pub mod util;

pub use config::{RemoteConfig, SyncPolicy};
pub use error::{Error, Result};
pub use service::StoreService;
pub use sync::{SyncEngine, SyncEvents, SyncScheduler};
