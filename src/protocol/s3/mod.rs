//! Native S3 protocol implementation
//!
//! Talks to AWS S3 and S3-compatible services (Backblaze B2, Cloudflare R2,
//! MinIO, Wasabi, DigitalOcean Spaces, GCS interop) through the official AWS
//! SDK for Rust. Requests are signed with SigV4; the addressing style comes
//! from the provider preset.
//!
//! # Example
//!
//! ```no_run
//! use comfy_cloud_storage::protocol::s3::{AddressingStyle, S3ClientConfig, S3Store};
//! use comfy_cloud_storage::protocol::ObjectStore;
//! use secrecy::SecretString;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = S3Store::new(&S3ClientConfig {
//!         bucket: "my-bucket".to_string(),
//!         region: "us-east-1".to_string(),
//!         endpoint: Some("http://localhost:9000".to_string()),
//!         access_key: SecretString::from("minioadmin"),
//!         secret_key: SecretString::from("minioadmin"),
//!         addressing: AddressingStyle::Path,
//!     })?;
//!
//!     let head = store.head("models/vae.safetensors").await?;
//!     println!("etag: {:?}", head.etag);
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;

pub use client::S3Store;
pub use config::{AddressingStyle, S3ClientConfig, APP_NAME};
