//! Error types for the offline data layer.

use std::path::PathBuf;

use crate::models::EntityKind;

/// Failures of the local persistent store. These are fatal to the call that
/// hit them and are never retried internally.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Failed to create database directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Invalid JSON in local store: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record in {0} has no string `_id` key")]
    MissingKey(EntityKind),

    #[error("Corrupt queue entry {id}: {reason}")]
    CorruptQueueEntry { id: i64, reason: String },
}

/// Errors surfaced by the request gateway.
///
/// Network failures never appear here: they are converted into cached or
/// queued results.
#[derive(Debug, thiserror::Error)]
pub enum OfflineError {
    #[error("Endpoint not supported for offline use: {0}")]
    UnsupportedEndpoint(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
