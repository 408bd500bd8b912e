//! Error types for the Notegrove core library.

use thiserror::Error;

/// All errors that can occur within the Notegrove core library.
#[derive(Debug, Error)]
pub enum NoteGroveError {
    /// A SQLite operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A referenced note, parent, child, or user does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The owner already has a note with this title.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The caller could not be resolved to a known user.
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Persisting editor content failed.
    #[error("Save failed: {0}")]
    SaveFailure(String),

    /// Input was rejected before reaching the store.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A move would create a cycle or is otherwise invalid.
    #[error("Invalid move: {0}")]
    InvalidMove(String),

    /// A delete was refused by the chosen strategy.
    #[error("Invalid delete: {0}")]
    InvalidDelete(String),

    /// The opened file is not a valid Notegrove database.
    #[error("Invalid store: {0}")]
    InvalidStore(String),

    /// An I/O operation on the filesystem failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be (de)serialized as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias that pins the error type to [`NoteGroveError`].
pub type Result<T> = std::result::Result<T, NoteGroveError>;

impl NoteGroveError {
    /// Returns a short, human-readable message suitable for display to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Database(e) => format!("Failed to save: {e}"),
            Self::NotFound(_) => "Note no longer exists".to_string(),
            Self::Conflict(_) => "A note with this title already exists".to_string(),
            Self::Unauthenticated => "Please sign in to continue".to_string(),
            Self::SaveFailure(_) => "Save failed".to_string(),
            Self::Validation(msg) => msg.clone(),
            Self::InvalidMove(msg) => msg.clone(),
            Self::InvalidDelete(msg) => msg.clone(),
            Self::InvalidStore(_) => "Could not open notes database".to_string(),
            Self::Io(e) => format!("File error: {e}"),
            Self::Json(e) => format!("Data format error: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_user_message_mentions_title() {
        let e = NoteGroveError::Conflict("Todo".to_string());
        assert!(e.user_message().contains("title"));
        assert!(e.to_string().contains("Todo"));
    }

    #[test]
    fn test_validation_message_passes_through() {
        let e = NoteGroveError::Validation("Title is too long".to_string());
        assert_eq!(e.user_message(), "Title is too long");
    }

    #[test]
    fn test_rusqlite_error_converts() {
        let e: NoteGroveError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(e, NoteGroveError::Database(_)));
    }
}
