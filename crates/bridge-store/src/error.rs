//! Repository errors

use bridge_model::{LeadId, LeadStatus, ModelError};
use rusqlite::ErrorCode;

/// Result alias for repository operations
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Durable store failures
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Pool exhausted, database locked or file unreachable
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// SQLite error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// No lead with this id
    #[error("lead not found: {0}")]
    NotFound(LeadId),

    /// Status changed underneath a compare-and-set update
    #[error("status conflict on {id}: expected {expected}, found {actual}")]
    StatusConflict {
        id: LeadId,
        expected: LeadStatus,
        actual: LeadStatus,
    },

    /// Domain rule rejected the change (invalid transition)
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Stored row could not be decoded
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Schema migration failed
    #[error("migration failed: {0}")]
    Migration(String),

    /// Blocking task panicked or was cancelled
    #[error("blocking task failed: {0}")]
    Join(String),
}

impl RepositoryError {
    /// Another attempt could succeed without caller changes
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            RepositoryError::Unavailable(_)
            | RepositoryError::Join(_)
            | RepositoryError::StatusConflict { .. } => true,
            RepositoryError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::CannotOpen
                    | ErrorCode::SystemIoFailure
            ),
            _ => false,
        }
    }
}

impl From<r2d2::Error> for RepositoryError {
    fn from(err: r2d2::Error) -> Self {
        RepositoryError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Corrupt(err.to_string())
    }
}

impl From<tokio::task::JoinError> for RepositoryError {
    fn from(err: tokio::task::JoinError) -> Self {
        RepositoryError::Join(err.to_string())
    }
}
