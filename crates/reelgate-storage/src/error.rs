//! Storage error types.

use reelgate_core::learning::LearningError;
use reelgate_core::review::ReviewQueueError;
use thiserror::Error;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from rusqlite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (e.g., creating directories).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(String),

    /// The feedback or review state does not allow the operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Recording feedback through the learning loop failed.
    #[error("Learning error: {0}")]
    Learning(#[from] LearningError),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

impl From<StorageError> for LearningError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Learning(inner) => inner,
            StorageError::InvalidState(message) => LearningError::InvalidFeedback(message),
            other => LearningError::Backend(other.to_string()),
        }
    }
}

impl From<StorageError> for ReviewQueueError {
    fn from(err: StorageError) -> Self {
        ReviewQueueError::Unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learning_error_round_trips_unchanged() {
        let err = StorageError::from(LearningError::InvalidFeedback("bad".to_string()));
        assert!(matches!(
            LearningError::from(err),
            LearningError::InvalidFeedback(m) if m == "bad"
        ));
    }

    #[test]
    fn database_errors_become_backend_errors() {
        let err = StorageError::NotFound("review 4".to_string());
        assert!(matches!(LearningError::from(err), LearningError::Backend(_)));
    }
}
