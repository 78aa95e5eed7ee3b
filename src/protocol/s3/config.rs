//! Configuration types for the S3 client

use secrecy::SecretString;

/// Application name attached to every request's user agent
pub const APP_NAME: &str = "b2ai-comfyui";

/// How request URLs are formed from bucket and endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressingStyle {
    /// `https://<bucket>.<endpoint>/<key>`
    #[default]
    VirtualHost,
    /// `https://<endpoint>/<bucket>/<key>`
    Path,
}

impl AddressingStyle {
    pub fn force_path_style(&self) -> bool {
        matches!(self, AddressingStyle::Path)
    }
}

/// Fully resolved settings for one S3 client
#[derive(Debug)]
pub struct S3ClientConfig {
    pub bucket: String,
    pub region: String,

    /// Custom endpoint; `None` keeps the SDK's native AWS endpoint resolution
    pub endpoint: Option<String>,

    pub access_key: SecretString,
    pub secret_key: SecretString,

    pub addressing: AddressingStyle,
}
