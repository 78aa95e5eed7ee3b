/*!
 * comfy-cloud-storage - S3-compatible cloud storage for node pipelines
 *
 * Provides:
 * - Built-in presets for AWS S3, Backblaze B2, Cloudflare R2, MinIO, Wasabi,
 *   DigitalOcean Spaces, GCS interop and custom endpoints
 * - Three-layer credential profiles (environment, profile file, node overrides)
 * - Lazily constructed storage clients
 * - A model cache that skips unchanged downloads using ETag sidecars and
 *   never leaves partial files behind
 * - Media upload, image load, bucket listing and presigned share URLs
 */

pub mod cli_progress;
pub mod config;
pub mod download;
pub mod error;
pub mod factory;
pub mod logging;
pub mod nodes;
pub mod ops;
pub mod profile;
pub mod progress;
pub mod protocol;
pub mod provider;

// Re-export commonly used types
pub use config::{CloudConfig, LogLevel};
pub use download::{ModelDownloader, ModelType};
pub use error::{CloudError, Result};
pub use factory::{build_client, ResolvedConnection};
pub use nodes::ProfileHandle;
pub use profile::{CredentialProfile, EnvLayer, NamedProfileStore, PartialProfile, ProfileResolver};
pub use progress::{NoProgress, ProgressSink};
pub use protocol::{MemoryStore, ObjectStore, S3Store, StorageError};
pub use provider::ProviderPreset;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
