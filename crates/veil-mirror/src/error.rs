//! Error types for the client mirror.

/// Error type for mirror operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The outgoing value could not be serialized.
    #[error("value cannot be serialized: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Encryption failed.
    #[error("failed to encrypt value")]
    Encrypt,

    /// The stored envelope could not be decoded.
    ///
    /// Deliberately opaque: a malformed envelope, tampered ciphertext, and a
    /// wrong secret are indistinguishable to the caller.
    #[error("envelope could not be decoded")]
    Decode,
}

/// Result type for mirror operations.
pub type Result<T> = std::result::Result<T, Error>;
