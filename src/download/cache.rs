//! On-disk cache entries and their ETag sidecars

use crate::protocol::ObjectHead;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Suffix of the file recording the remote ETag of a cached model
pub const ETAG_SUFFIX: &str = ".s3etag";

/// Suffix of the in-progress download file
pub const TEMP_SUFFIX: &str = ".download";

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// `<file>.s3etag`
pub fn sidecar_path(path: &Path) -> PathBuf {
    with_suffix(path, ETAG_SUFFIX)
}

/// `<file>.download`
pub fn temp_path(path: &Path) -> PathBuf {
    with_suffix(path, TEMP_SUFFIX)
}

/// A cached model file and the remote ETag it was downloaded at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub etag: Option<String>,
    pub size: u64,
}

impl CacheEntry {
    /// Read the entry for `path`, or `None` if the file does not exist
    pub async fn load(path: &Path) -> Option<CacheEntry> {
        let metadata = fs::metadata(path).await.ok()?;
        if !metadata.is_file() {
            return None;
        }
        Some(CacheEntry {
            path: path.to_path_buf(),
            etag: read_etag(path).await,
            size: metadata.len(),
        })
    }

    /// The cached file still matches the remote object
    ///
    /// Requires a recorded ETag equal to the remote one, and equal sizes
    /// when the remote reports a size.
    pub fn matches(&self, head: &ObjectHead) -> bool {
        let etag_matches = match (&self.etag, &head.etag) {
            (Some(local), Some(remote)) => local == remote,
            _ => false,
        };
        etag_matches && head.size.map_or(true, |size| size == self.size)
    }
}

/// ETag recorded for a cached file
pub async fn read_etag(path: &Path) -> Option<String> {
    let contents = fs::read_to_string(sidecar_path(path)).await.ok()?;
    let etag = contents.trim();
    (!etag.is_empty()).then(|| etag.to_string())
}

/// Record `etag` for a cached file, or remove a stale sidecar when `None`
///
/// The sidecar is written to a temporary name and renamed into place.
pub async fn write_etag(path: &Path, etag: Option<&str>) -> io::Result<()> {
    let sidecar = sidecar_path(path);
    match etag {
        Some(etag) => {
            let temp = with_suffix(&sidecar, ".tmp");
            if let Err(e) = fs::write(&temp, etag).await {
                let _ = fs::remove_file(&temp).await;
                return Err(e);
            }
            fs::rename(&temp, &sidecar).await
        }
        None => match fs::remove_file(&sidecar).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn head(etag: Option<&str>, size: Option<u64>) -> ObjectHead {
        ObjectHead {
            key: "k".to_string(),
            size,
            etag: etag.map(str::to_string),
            last_modified: None,
        }
    }

    #[test]
    fn test_paths() {
        let path = Path::new("/models/vae/sdxl.safetensors");
        assert_eq!(
            sidecar_path(path),
            PathBuf::from("/models/vae/sdxl.safetensors.s3etag")
        );
        assert_eq!(
            temp_path(path),
            PathBuf::from("/models/vae/sdxl.safetensors.download")
        );
    }

    #[tokio::test]
    async fn test_sidecar_roundtrip_and_removal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        fs::write(&path, b"data").await.unwrap();

        write_etag(&path, Some("\"abc\"")).await.unwrap();
        assert_eq!(read_etag(&path).await.as_deref(), Some("\"abc\""));
        assert!(!with_suffix(&sidecar_path(&path), ".tmp").exists());

        write_etag(&path, None).await.unwrap();
        assert_eq!(read_etag(&path).await, None);
        write_etag(&path, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_entry_matching() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        assert!(CacheEntry::load(&path).await.is_none());

        fs::write(&path, b"data").await.unwrap();
        let entry = CacheEntry::load(&path).await.unwrap();
        assert_eq!(entry.size, 4);
        assert!(!entry.matches(&head(Some("\"e\""), Some(4))));

        write_etag(&path, Some("\"e\"")).await.unwrap();
        let entry = CacheEntry::load(&path).await.unwrap();
        assert!(entry.matches(&head(Some("\"e\""), Some(4))));
        assert!(entry.matches(&head(Some("\"e\""), None)));
        assert!(!entry.matches(&head(Some("\"e\""), Some(5))));
        assert!(!entry.matches(&head(Some("\"f\""), Some(4))));
        assert!(!entry.matches(&head(None, Some(4))));
    }
}
