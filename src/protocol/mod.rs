/*!
 * Object store abstraction layer
 *
 * Supports:
 * - S3-compatible providers (AWS S3, Backblaze B2, Cloudflare R2, MinIO, ...)
 *   through the official AWS SDK
 * - An in-memory store for tests and dry runs
 *
 * Every operation is a single request against one bucket. Retry policy is
 * left to callers.
 */

mod error;
pub mod memory;
pub mod s3;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use s3::S3Store;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::time::{Duration, SystemTime};

/// Object metadata returned by a HEAD (or alongside a GET body)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHead {
    pub key: String,

    /// Object size in bytes, when the provider reports it
    pub size: Option<u64>,

    /// Opaque change-detection token
    pub etag: Option<String>,

    pub last_modified: Option<SystemTime>,
}

/// Chunked object body
pub type BodyStream = BoxStream<'static, StorageResult<Bytes>>;

/// A GET response: metadata plus the streaming body
pub struct ObjectBody {
    pub head: ObjectHead,
    pub stream: BodyStream,
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBody")
            .field("head", &self.head)
            .finish_non_exhaustive()
    }
}

/// A single entry of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<SystemTime>,
}

/// One page of a listing
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ListedObject>,

    /// Token for the next page when the provider truncated the result
    pub continuation_token: Option<String>,

    pub is_truncated: bool,
}

/// Operations the cloud storage layer needs from an object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket every request targets
    fn bucket(&self) -> &str;

    /// Metadata-only request
    async fn head(&self, key: &str) -> StorageResult<ObjectHead>;

    /// Start a body transfer
    async fn get(&self, key: &str) -> StorageResult<ObjectBody>;

    /// Upload a complete buffer
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()>;

    /// Fetch one page of keys under `prefix`
    async fn list_page(
        &self,
        prefix: &str,
        continuation_token: Option<String>,
        max_keys: i32,
    ) -> StorageResult<ListPage>;

    /// Sign a time-limited GET URL for `key`
    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String>;
}
