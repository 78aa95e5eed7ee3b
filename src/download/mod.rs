/*!
 * Cached model downloader
 *
 * Fetches remote model files into `<models_root>/<model_type>/<basename>`.
 * A local copy is reused when the ETag recorded next to it still matches the
 * remote object, so repeated runs cost one HEAD request instead of a full
 * transfer.
 *
 * Downloads stream into `<file>.download` and are renamed into place only
 * after the byte count checks out, so an interrupted transfer never leaves a
 * partial model behind and never damages the previous copy.
 *
 * Two processes downloading the same key at once share the temporary file
 * name and may corrupt each other's transfer. There is no cross-process lock.
 */

mod cache;

pub use cache::{read_etag, sidecar_path, temp_path, write_etag, CacheEntry, ETAG_SUFFIX, TEMP_SUFFIX};

use crate::config::CloudConfig;
use crate::error::{CloudError, Result};
use crate::factory::ResolvedConnection;
use crate::progress::{ProgressSink, ProgressThrottle, DEFAULT_PROGRESS_INTERVAL};
use crate::protocol::{ObjectBody, ObjectStore, StorageError, StorageResult};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Model directories known to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    Checkpoints,
    Loras,
    Vae,
    TextEncoders,
    Controlnet,
    DiffusionModels,
    UpscaleModels,
    Embeddings,
    ClipVision,
}

impl ModelType {
    pub const ALL: [ModelType; 9] = [
        ModelType::Checkpoints,
        ModelType::Loras,
        ModelType::Vae,
        ModelType::TextEncoders,
        ModelType::Controlnet,
        ModelType::DiffusionModels,
        ModelType::UpscaleModels,
        ModelType::Embeddings,
        ModelType::ClipVision,
    ];

    /// Directory name under the models root
    pub fn dir_name(&self) -> &'static str {
        match self {
            ModelType::Checkpoints => "checkpoints",
            ModelType::Loras => "loras",
            ModelType::Vae => "vae",
            ModelType::TextEncoders => "text_encoders",
            ModelType::Controlnet => "controlnet",
            ModelType::DiffusionModels => "diffusion_models",
            ModelType::UpscaleModels => "upscale_models",
            ModelType::Embeddings => "embeddings",
            ModelType::ClipVision => "clip_vision",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for ModelType {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        ModelType::ALL
            .into_iter()
            .find(|t| t.dir_name() == s)
            .ok_or_else(|| CloudError::config(format!("Unknown model type '{}'", s)))
    }
}

/// Downloads remote models into the local models tree
#[derive(Debug, Clone)]
pub struct ModelDownloader {
    models_root: PathBuf,
    progress_interval: Duration,
}

impl ModelDownloader {
    pub fn new(models_root: impl Into<PathBuf>) -> Self {
        Self {
            models_root: models_root.into(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn from_config(config: &CloudConfig) -> Self {
        Self::new(&config.models_root).with_progress_interval(config.progress_interval())
    }

    /// Minimum time between two progress updates
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn models_root(&self) -> &Path {
        &self.models_root
    }

    /// Local destination of `remote_key` inside `model_dir`
    ///
    /// `model_dir` must be a single path component and the key must end in a
    /// usable file name.
    pub fn local_path(&self, remote_key: &str, model_dir: &str) -> Result<PathBuf> {
        if !is_single_component(model_dir) {
            return Err(CloudError::config(format!(
                "Invalid model type directory '{}'",
                model_dir
            )));
        }

        let basename = remote_key.rsplit('/').next().unwrap_or_default();
        if !is_single_component(basename) {
            return Err(CloudError::config(format!(
                "Remote key '{}' does not name a file",
                remote_key
            )));
        }

        Ok(self.models_root.join(model_dir).join(basename))
    }

    /// Make `remote_key` available locally and return its path
    ///
    /// Without `force`, an existing file is reused when its recorded ETag
    /// matches the remote object. If the freshness check itself fails the
    /// local file is served anyway. Transfer failures are never retried.
    pub async fn fetch_model(
        &self,
        conn: &ResolvedConnection,
        remote_key: &str,
        model_dir: &str,
        force: bool,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let local_path = self.local_path(remote_key, model_dir)?;
        let full_key = conn.full_key(remote_key);
        let store = conn.store()?;

        if !force {
            if let Some(entry) = CacheEntry::load(&local_path).await {
                match store.head(&full_key).await {
                    Ok(head) if entry.matches(&head) => {
                        debug!("Cache hit for {} ({})", full_key, local_path.display());
                        progress.update(entry.size, entry.size);
                        return Ok(local_path);
                    }
                    Ok(_) => {
                        info!("Remote {} changed, re-downloading", full_key);
                    }
                    Err(e) => {
                        warn!(
                            "Could not check {} for updates ({}), using cached {}",
                            full_key,
                            e,
                            local_path.display()
                        );
                        return Ok(local_path);
                    }
                }
            }
        }

        self.download(store, &full_key, &local_path, progress, cancel)
            .await?;
        Ok(local_path)
    }

    async fn download(
        &self,
        store: &dyn ObjectStore,
        key: &str,
        path: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let body = store.get(key).await.map_err(|source| match source {
            StorageError::NotFound { bucket, key } => CloudError::NotFound { bucket, key },
            source => CloudError::Download {
                key: key.to_string(),
                source,
            },
        })?;

        info!(
            "Downloading s3://{}/{} -> {}",
            store.bucket(),
            key,
            path.display()
        );

        let temp = temp_path(path);
        let etag = body.head.etag.clone();
        let written = match self.write_body(body, &temp, path, progress, cancel).await {
            Ok(written) => written,
            Err(source) => {
                if let Err(e) = fs::remove_file(&temp).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!("Failed to remove {}: {}", temp.display(), e);
                    }
                }
                return Err(CloudError::Download {
                    key: key.to_string(),
                    source,
                });
            }
        };

        if let Err(e) = write_etag(path, etag.as_deref()).await {
            warn!("Failed to record ETag for {}: {}", path.display(), e);
        }

        info!("Downloaded {} ({} bytes)", path.display(), written);
        Ok(())
    }

    /// Stream `body` into `temp`, verify it, then move it onto `path`
    async fn write_body(
        &self,
        body: ObjectBody,
        temp: &Path,
        path: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> StorageResult<u64> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let ObjectBody { head, mut stream } = body;
        let total = head.size.unwrap_or(0);
        let mut throttle = ProgressThrottle::new(progress, total, self.progress_interval);
        let mut file = fs::File::create(temp).await?;
        let mut written: u64 = 0;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(StorageError::Cancelled),
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            throttle.report(written);
        }

        if let Some(expected) = head.size {
            if written != expected {
                return Err(StorageError::Truncated {
                    expected,
                    received: written,
                });
            }
        }

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        // The old ETag must never describe the new bytes
        write_etag(path, None).await?;
        fs::rename(temp, path).await?;
        throttle.finish(written);
        Ok(written)
    }
}

fn is_single_component(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}
