/*!
 * Error types for cloud storage operations
 */

use crate::protocol::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CloudError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_TRANSFER: i32 = 1;
pub const EXIT_FATAL: i32 = 2;
pub const EXIT_NOT_FOUND: i32 = 3;

/// Errors surfaced to the node that triggered the operation
#[derive(Error, Debug)]
pub enum CloudError {
    /// Missing or invalid credentials, bucket, endpoint or paths
    #[error("{0}")]
    Configuration(String),

    /// Provider identifier not present in the registry
    #[error("Unknown storage provider '{0}'. Use one of the built-in providers or 'Custom' with an endpoint URL")]
    UnknownProvider(String),

    /// Remote object absent
    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Transfer-level failure while downloading
    #[error("Download of '{key}' failed: {source}")]
    Download {
        key: String,
        #[source]
        source: StorageError,
    },

    /// Transfer-level failure while uploading
    #[error("{source}")]
    Upload {
        key: String,
        #[source]
        source: StorageError,
    },

    /// Retrieved bytes are not valid media
    #[error("Failed to decode '{key}': {message}")]
    Decode { key: String, message: String },

    /// Listing or signing request failed
    #[error("{operation} failed: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: StorageError,
    },
}

impl CloudError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        CloudError::Configuration(message.into())
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CloudError::Configuration(_) | CloudError::UnknownProvider(_) => EXIT_FATAL,
            CloudError::NotFound { .. } => EXIT_NOT_FOUND,
            CloudError::Decode { .. } => EXIT_FATAL,
            CloudError::Download { .. } | CloudError::Upload { .. } | CloudError::Storage { .. } => {
                EXIT_TRANSFER
            }
        }
    }

    /// Configuration problems are reported verbatim and never worth re-running unchanged
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CloudError::Configuration(_) | CloudError::UnknownProvider(_)
        )
    }
}
