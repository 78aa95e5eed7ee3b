//! In-memory object store for testing
//!
//! This provides an implementation of [`ObjectStore`] that keeps objects in
//! memory, counts the requests it serves, and can inject failures so cache
//! and transfer logic can be exercised without a network.
//!
//! # Example
//!
//! ```rust
//! use comfy_cloud_storage::protocol::{MemoryStore, ObjectStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::new("models");
//!     store.insert("sdxl/vae.safetensors", b"weights".to_vec());
//!
//!     let head = store.head("sdxl/vae.safetensors").await.unwrap();
//!     assert_eq!(head.size, Some(7));
//!     assert_eq!(store.get_count(), 0);
//! }
//! ```

use super::{
    ListPage, ListedObject, ObjectBody, ObjectHead, ObjectStore, StorageError, StorageResult,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

/// Stored object data
#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    etag: String,
    content_type: String,
    modified: SystemTime,
}

#[derive(Debug, Default)]
struct Counters {
    heads: AtomicUsize,
    gets: AtomicUsize,
    puts: AtomicUsize,
    lists: AtomicUsize,
    bytes_served: AtomicU64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Faults {
    head: bool,
    put: bool,
    /// Fail the body stream after this many chunks
    body_after_chunks: Option<usize>,
    /// End the body cleanly after this many bytes
    short_body_bytes: Option<usize>,
}

/// In-memory object store
#[derive(Debug, Clone)]
pub struct MemoryStore {
    bucket: String,
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
    counters: Arc<Counters>,
    faults: Arc<RwLock<Faults>>,
    generation: Arc<AtomicU64>,
    chunk_size: usize,
    page_size: usize,
}

impl MemoryStore {
    /// Create a new empty store for `bucket`
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Arc::new(RwLock::new(BTreeMap::new())),
            counters: Arc::new(Counters::default()),
            faults: Arc::new(RwLock::new(Faults::default())),
            generation: Arc::new(AtomicU64::new(0)),
            chunk_size: 64 * 1024,
            page_size: 1000,
        }
    }

    /// Size of each body chunk served by `get`
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Maximum number of keys returned per listing page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Add or replace an object; every write gets a fresh ETag
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.store(key.into(), data.into(), "application/octet-stream");
    }

    fn store(&self, key: String, data: Bytes, content_type: &str) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let object = StoredObject {
            etag: format!("\"{:08x}-{}\"", generation, data.len()),
            data,
            content_type: content_type.to_string(),
            modified: SystemTime::now(),
        };
        self.objects.write().unwrap().insert(key, object);
    }

    /// Remove an object
    pub fn remove(&self, key: &str) {
        self.objects.write().unwrap().remove(key);
    }

    /// Get object data (for testing)
    pub fn data(&self, key: &str) -> Option<Bytes> {
        self.objects.read().unwrap().get(key).map(|o| o.data.clone())
    }

    /// Get the stored content type (for testing)
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .unwrap()
            .get(key)
            .map(|o| o.content_type.clone())
    }

    /// Current ETag of an object
    pub fn etag(&self, key: &str) -> Option<String> {
        self.objects.read().unwrap().get(key).map(|o| o.etag.clone())
    }

    /// Make every HEAD fail with a network error
    pub fn fail_heads(&self, fail: bool) {
        self.faults.write().unwrap().head = fail;
    }

    /// Make every PUT fail with access denied
    pub fn fail_puts(&self, fail: bool) {
        self.faults.write().unwrap().put = fail;
    }

    /// Interrupt body streams after `chunks` chunks; `None` disables
    pub fn fail_body_after(&self, chunks: Option<usize>) {
        self.faults.write().unwrap().body_after_chunks = chunks;
    }

    /// End body streams after `bytes` bytes while still advertising the
    /// full size; `None` disables
    pub fn short_body(&self, bytes: Option<usize>) {
        self.faults.write().unwrap().short_body_bytes = bytes;
    }

    pub fn head_count(&self) -> usize {
        self.counters.heads.load(Ordering::SeqCst)
    }

    /// Number of body transfers started
    pub fn get_count(&self) -> usize {
        self.counters.gets.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.counters.puts.load(Ordering::SeqCst)
    }

    pub fn list_count(&self) -> usize {
        self.counters.lists.load(Ordering::SeqCst)
    }

    /// Total body bytes handed out by `get`
    pub fn bytes_served(&self) -> u64 {
        self.counters.bytes_served.load(Ordering::SeqCst)
    }

    fn lookup(&self, key: &str) -> StorageResult<StoredObject> {
        self.objects
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            })
    }

    fn head_of(key: &str, object: &StoredObject) -> ObjectHead {
        ObjectHead {
            key: key.to_string(),
            size: Some(object.data.len() as u64),
            etag: Some(object.etag.clone()),
            last_modified: Some(object.modified),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectHead> {
        self.counters.heads.fetch_add(1, Ordering::SeqCst);
        if self.faults.read().unwrap().head {
            return Err(StorageError::Network("connection refused".to_string()));
        }
        let object = self.lookup(key)?;
        Ok(Self::head_of(key, &object))
    }

    async fn get(&self, key: &str) -> StorageResult<ObjectBody> {
        let object = self.lookup(key)?;
        self.counters.gets.fetch_add(1, Ordering::SeqCst);

        let faults = *self.faults.read().unwrap();
        let fail_after = faults.body_after_chunks;
        let served = faults
            .short_body_bytes
            .map_or(object.data.len(), |limit| limit.min(object.data.len()));
        let chunks: Vec<Bytes> = (0..served)
            .step_by(self.chunk_size)
            .map(|start| {
                let end = (start + self.chunk_size).min(served);
                object.data.slice(start..end)
            })
            .collect();

        let counters = Arc::clone(&self.counters);
        let stream = futures::stream::iter(chunks.into_iter().enumerate().map(
            move |(index, chunk)| {
                if fail_after.map_or(false, |limit| index >= limit) {
                    return Err(StorageError::Network("connection reset by peer".to_string()));
                }
                counters
                    .bytes_served
                    .fetch_add(chunk.len() as u64, Ordering::SeqCst);
                Ok(chunk)
            },
        ))
        .boxed();

        Ok(ObjectBody {
            head: Self::head_of(key, &object),
            stream,
        })
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        self.counters.puts.fetch_add(1, Ordering::SeqCst);
        if self.faults.read().unwrap().put {
            return Err(StorageError::AccessDenied("write not permitted".to_string()));
        }
        self.store(key.to_string(), data, content_type);
        Ok(())
    }

    async fn list_page(
        &self,
        prefix: &str,
        continuation_token: Option<String>,
        max_keys: i32,
    ) -> StorageResult<ListPage> {
        self.counters.lists.fetch_add(1, Ordering::SeqCst);
        let limit = (max_keys.max(1) as usize).min(self.page_size);
        let objects = self.objects.read().unwrap();

        // Continuation tokens are the last key of the previous page
        let mut matching = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| {
                continuation_token
                    .as_deref()
                    .map_or(true, |after| key.as_str() > after)
            })
            .map(|(key, object)| ListedObject {
                key: key.clone(),
                size: object.data.len() as u64,
                last_modified: Some(object.modified),
            });

        let page: Vec<ListedObject> = matching.by_ref().take(limit).collect();
        let is_truncated = matching.next().is_some();
        let continuation_token = if is_truncated {
            page.last().map(|o| o.key.clone())
        } else {
            None
        };

        Ok(ListPage {
            objects: page,
            continuation_token,
            is_truncated,
        })
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        Ok(format!(
            "memory://{}/{}?expires={}",
            self.bucket,
            key,
            expires_in.as_secs()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_head_and_get() {
        let store = MemoryStore::new("bucket").with_chunk_size(4);
        store.insert("a.bin", b"0123456789".to_vec());

        let head = store.head("a.bin").await.unwrap();
        assert_eq!(head.size, Some(10));
        assert!(head.etag.is_some());

        let body = store.get("a.bin").await.unwrap();
        let chunks: Vec<Bytes> = body.stream.try_collect().await.unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(store.bytes_served(), 10);
        assert_eq!(store.head_count(), 1);
        assert_eq!(store.get_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store = MemoryStore::new("bucket");
        assert!(store.head("nope").await.unwrap_err().is_not_found());
        assert!(store.get("nope").await.unwrap_err().is_not_found());
        assert_eq!(store.get_count(), 0);
    }

    #[tokio::test]
    async fn test_overwrite_changes_etag() {
        let store = MemoryStore::new("bucket");
        store.insert("k", b"v1".to_vec());
        let first = store.etag("k").unwrap();
        store.insert("k", b"v1".to_vec());
        assert_ne!(first, store.etag("k").unwrap());
    }

    #[tokio::test]
    async fn test_body_fault_injection() {
        let store = MemoryStore::new("bucket").with_chunk_size(2);
        store.insert("k", b"abcdef".to_vec());
        store.fail_body_after(Some(1));

        let body = store.get("k").await.unwrap();
        let result: StorageResult<Vec<Bytes>> = body.stream.try_collect().await;
        assert!(matches!(result, Err(StorageError::Network(_))));
    }

    #[tokio::test]
    async fn test_short_body_keeps_advertised_size() {
        let store = MemoryStore::new("bucket").with_chunk_size(4);
        store.insert("k", b"0123456789".to_vec());
        store.short_body(Some(6));

        let body = store.get("k").await.unwrap();
        assert_eq!(body.head.size, Some(10));
        let chunks: Vec<Bytes> = body.stream.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"012345");
    }

    #[tokio::test]
    async fn test_listing_pages() {
        let store = MemoryStore::new("bucket").with_page_size(2);
        for i in 0..5 {
            store.insert(format!("p/{}", i), vec![0u8; i]);
        }
        store.insert("other/x", b"x".to_vec());

        let first = store.list_page("p/", None, 1000).await.unwrap();
        assert_eq!(first.objects.len(), 2);
        assert!(first.is_truncated);

        let second = store
            .list_page("p/", first.continuation_token, 1000)
            .await
            .unwrap();
        assert_eq!(second.objects[0].key, "p/2");
    }
}
