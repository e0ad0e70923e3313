//! Error types for version-selection operations.

use thiserror::Error;

/// Errors that can occur while reading or persisting version selections.
#[derive(Debug, Error)]
pub enum SelectionError {
    /// No resolvable session for an operation that requires one.
    #[error("authentication required: no active session")]
    AuthenticationRequired,

    /// An insert/update/delete failed after idempotency and race recovery
    /// attempts were exhausted.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A version object is missing required fields.
    #[error("validation error: {0}")]
    Validation(String),

    /// A requested language path, version, or entity resolves to nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Cannot connect to or communicate with the local mirror.
    #[error("connection error: {0}")]
    Connection(String),

    /// Database error from SQLx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for selection operations.
pub type Result<T> = std::result::Result<T, SelectionError>;

impl SelectionError {
    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SelectionError::Persistence(_)
                | SelectionError::Connection(_)
                | SelectionError::Database(_)
        )
    }

    /// A short user-oriented message, suitable for an error banner.
    pub fn user_message(&self) -> String {
        match self {
            SelectionError::AuthenticationRequired => {
                "Sign in to save versions across devices".to_string()
            }
            SelectionError::Validation(msg) => msg.clone(),
            SelectionError::NotFound(what) => format!("Could not find {what}"),
            _ => "Something went wrong, please try again".to_string(),
        }
    }
}

impl From<serde_json::Error> for SelectionError {
    fn from(err: serde_json::Error) -> Self {
        SelectionError::Serialization(err.to_string())
    }
}
