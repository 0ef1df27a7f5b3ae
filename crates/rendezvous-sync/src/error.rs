//! Error types for the sync service.

use thiserror::Error;

/// Errors that can occur talking to the sync backend.
#[derive(Debug, Error)]
pub enum SyncServiceError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The backend is unavailable or has been shut down.
    #[error("sync backend unavailable: {0}")]
    Unavailable(String),

    /// Stored data could not be interpreted.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A blocking backend task failed to complete.
    #[error("backend task failed: {0}")]
    Task(String),

    /// The subscription was closed before a value arrived.
    #[error("subscription to {0:?} closed")]
    SubscriptionClosed(String),
}

impl From<tokio::task::JoinError> for SyncServiceError {
    fn from(e: tokio::task::JoinError) -> Self {
        SyncServiceError::Task(e.to_string())
    }
}

/// Result type for sync service operations.
pub type Result<T> = std::result::Result<T, SyncServiceError>;
