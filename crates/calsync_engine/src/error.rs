//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error from the API client.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The server rejected the request at the application level.
    #[error("server rejected request: {0}")]
    Rejected(String),

    /// Durable local store failure.
    #[error("store error: {0}")]
    Store(String),

    /// A create or update operation has no payload to replay.
    #[error("{0} operation is missing its payload")]
    MissingPayload(&'static str),

    /// A create payload carries no target calendar.
    #[error("create payload is missing a calendar id")]
    MissingCalendarId,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Returns true if retrying this error could succeed.
    ///
    /// Application-level rejections and malformed payloads never become
    /// valid by retrying; those fail fast instead of consuming the retry
    /// budget.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Store(_) => true,
            SyncError::Rejected(_) | SyncError::MissingPayload(_) | SyncError::MissingCalendarId => {
                false
            }
        }
    }
}
