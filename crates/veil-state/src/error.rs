//! Error types for session store operations.

/// Error type for session store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The value could not be snapshotted into an owned JSON form.
    /// Raised synchronously at write time; the store is left untouched.
    #[error("value cannot be stored: {0}")]
    Construction(#[from] serde_json::Error),

    /// No live cell for this (session, cell) pair. Also covers cells past
    /// their TTL that have not been physically swept yet.
    #[error("state cell not found: {session_id}/{cell_id}")]
    NotFound {
        session_id: String,
        cell_id: String,
    },
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, Error>;
