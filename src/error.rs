//! Error types for auth-store.

use thiserror::Error;

/// Main error type for auth-store operations.
#[derive(Error, Debug)]
pub enum AuthStoreError {
    /// Caller passed a token or user the store refuses to hold.
    #[error("invalid session input: {0}")]
    InvalidSessionInput(String),

    /// Persistence backend could not be read.
    #[error("backend read failed: {0}")]
    BackendRead(String),

    /// Persistence backend could not be written or cleared.
    #[error("backend write failed: {0}")]
    BackendWrite(String),

    /// Stored data could not be decoded.
    #[error("stored session could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    /// Storage key contains characters a backend cannot address.
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    /// Login response carried no usable credential.
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persistence writer task is gone.
    #[error("channel closed")]
    ChannelClosed,
}

/// Convenience Result type for auth-store operations.
pub type Result<T> = std::result::Result<T, AuthStoreError>;
