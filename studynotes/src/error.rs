//! Error types for StudyNotes
//!
//! All errors use thiserror for structured error handling.
//! Value-model mutations (documents, strokes) never produce these; only
//! boundary operations (scheduling, serialization, storage) do.
//! These errors can be serialized to a UI bridge.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Due time is not in the future, or the reminder is already completed
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// The platform notification surface refused or cannot schedule
    #[error("Scheduling unavailable: {0}")]
    SchedulingUnavailable(String),

    /// Launch payload could not be decoded; callers map this to the sentinel
    #[error("Malformed launch payload: {0}")]
    MalformedLaunchPayload(String),

    #[error("Serialization failure: {0}")]
    SerializationFailure(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Note not found: {0}")]
    NoteNotFound(String),

    #[error("Reminder not found: {0}")]
    ReminderNotFound(String),

    #[error("Blob store error: {0}")]
    BlobStore(String),

    #[error("{0}")]
    Generic(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationFailure(err.to_string())
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_display_string() {
        let err = AppError::InvalidSchedule("due time is in the past".to_string());

        let json = serde_json::to_string(&err).unwrap();

        assert_eq!(json, serde_json::to_string(&err.to_string()).unwrap());
    }

    #[test]
    fn test_json_error_is_serialization_failure() {
        let err: AppError = serde_json::from_str::<Vec<u8>>("{").unwrap_err().into();
        assert!(matches!(err, AppError::SerializationFailure(_)));
    }
}
