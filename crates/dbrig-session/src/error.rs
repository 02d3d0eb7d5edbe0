//! Error types for session persistence.

/// Errors raised by a [`SessionRepository`](crate::SessionRepository).
///
/// These never escape [`SessionStore`](crate::SessionStore); the store logs
/// them and degrades instead.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A database operation failed (including unique constraint violations).
    #[error("session database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No pooled connection was available.
    #[error("session pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// The payload could not be serialized or deserialized.
    #[error("session serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An update matched no row; the record was deleted underneath us.
    #[error("session '{0}' no longer exists")]
    StaleRecord(String),
}
