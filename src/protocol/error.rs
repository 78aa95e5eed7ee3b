//! Error types for object store requests

use std::io;
use thiserror::Error;

/// Result type alias for object store requests
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while talking to an object store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Object not found in bucket
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Bucket does not exist
    #[error("Bucket not found: {0}")]
    NoSuchBucket(String),

    /// Access denied error
    #[error("Access denied. Check credentials and bucket policy. ({0})")]
    AccessDenied(String),

    /// Unknown access key id
    #[error("Invalid access key. ({0})")]
    InvalidAccessKey(String),

    /// Any other service error with its provider code
    #[error("S3 error [{code}]: {message}")]
    Service { code: String, message: String },

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Local I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Body ended before the advertised length
    #[error("Transfer truncated: expected {expected} bytes, received {received}")]
    Truncated { expected: u64, received: u64 },

    /// Caller cancelled the transfer
    #[error("Transfer cancelled")]
    Cancelled,

    /// Presigning request could not be built
    #[error("Signing error: {0}")]
    Signing(String),
}

impl StorageError {
    /// Object is absent, as opposed to unreachable
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}
