//! Upload rendered media buffers

use crate::error::{CloudError, Result};
use crate::factory::ResolvedConnection;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Placeholder replaced by the batch index in filename templates
pub const BATCH_PLACEHOLDER: &str = "%batch_num%";

/// Media container formats the save operations produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Png,
    Jpg,
    Webp,
    Flac,
    Mp3,
    Wav,
    Mp4,
    Webm,
    Mov,
}

impl MediaFormat {
    pub const ALL: [MediaFormat; 9] = [
        MediaFormat::Png,
        MediaFormat::Jpg,
        MediaFormat::Webp,
        MediaFormat::Flac,
        MediaFormat::Mp3,
        MediaFormat::Wav,
        MediaFormat::Mp4,
        MediaFormat::Webm,
        MediaFormat::Mov,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            MediaFormat::Png => "png",
            MediaFormat::Jpg => "jpg",
            MediaFormat::Webp => "webp",
            MediaFormat::Flac => "flac",
            MediaFormat::Mp3 => "mp3",
            MediaFormat::Wav => "wav",
            MediaFormat::Mp4 => "mp4",
            MediaFormat::Webm => "webm",
            MediaFormat::Mov => "mov",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            MediaFormat::Png => "image/png",
            MediaFormat::Jpg => "image/jpeg",
            MediaFormat::Webp => "image/webp",
            MediaFormat::Flac => "audio/flac",
            MediaFormat::Mp3 => "audio/mpeg",
            MediaFormat::Wav => "audio/wav",
            MediaFormat::Mp4 => "video/mp4",
            MediaFormat::Webm => "video/webm",
            MediaFormat::Mov => "video/quicktime",
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, MediaFormat::Png | MediaFormat::Jpg | MediaFormat::Webp)
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for MediaFormat {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        let lower = if lower == "jpeg" { "jpg" } else { lower.as_str() };
        MediaFormat::ALL
            .into_iter()
            .find(|f| f.extension() == lower)
            .ok_or_else(|| CloudError::config(format!("Unsupported media format '{}'", s)))
    }
}

/// Object key for one item of a batch: `path_prefix + key_prefix + name.ext`
pub fn build_key(
    path_prefix: &str,
    key_prefix: &str,
    filename: &str,
    batch_index: usize,
    format: MediaFormat,
) -> String {
    let name = filename.replace(BATCH_PLACEHOLDER, &batch_index.to_string());
    format!("{}{}{}.{}", path_prefix, key_prefix, name, format.extension())
}

/// Result of one upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReceipt {
    pub key: String,

    /// `s3://<bucket>/<key>`
    pub uri: String,

    pub bytes: u64,
}

/// Upload `data` under `path_prefix + key`
pub async fn save_bytes(
    conn: &ResolvedConnection,
    key: &str,
    data: Bytes,
    content_type: &str,
) -> Result<SaveReceipt> {
    let full_key = conn.full_key(key);
    upload(conn, full_key, data, content_type).await
}

/// Upload one rendered media buffer
pub async fn save_media(
    conn: &ResolvedConnection,
    key_prefix: &str,
    filename: &str,
    format: MediaFormat,
    data: Bytes,
) -> Result<SaveReceipt> {
    let key = build_key(&conn.profile().path_prefix, key_prefix, filename, 0, format);
    upload(conn, key, data, format.content_type()).await
}

/// Upload a batch in order; item `i` substitutes `i` for `%batch_num%`
///
/// Stops at the first failure. Items already uploaded stay in the bucket.
pub async fn save_batch<I>(
    conn: &ResolvedConnection,
    key_prefix: &str,
    filename: &str,
    format: MediaFormat,
    items: I,
) -> Result<Vec<SaveReceipt>>
where
    I: IntoIterator<Item = Bytes>,
{
    let mut receipts = Vec::new();
    for (index, data) in items.into_iter().enumerate() {
        let key = build_key(
            &conn.profile().path_prefix,
            key_prefix,
            filename,
            index,
            format,
        );
        receipts.push(upload(conn, key, data, format.content_type()).await?);
    }
    Ok(receipts)
}

async fn upload(
    conn: &ResolvedConnection,
    key: String,
    data: Bytes,
    content_type: &str,
) -> Result<SaveReceipt> {
    let store = conn.store()?;
    let bytes = data.len() as u64;

    store
        .put(&key, data, content_type)
        .await
        .map_err(|source| CloudError::Upload {
            key: key.clone(),
            source,
        })?;

    info!("Uploaded {} ({} bytes)", key, bytes);
    Ok(SaveReceipt {
        uri: format!("s3://{}/{}", conn.bucket(), key),
        key,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_key() {
        assert_eq!(
            build_key("team/", "comfyui/images/", "img_%batch_num%", 3, MediaFormat::Png),
            "team/comfyui/images/img_3.png"
        );
        assert_eq!(
            build_key("", "", "%batch_num%-%batch_num%", 1, MediaFormat::Mp4),
            "1-1.mp4"
        );
        assert_eq!(
            build_key("", "audio/", "track", 7, MediaFormat::Flac),
            "audio/track.flac"
        );
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("PNG".parse::<MediaFormat>().unwrap(), MediaFormat::Png);
        assert_eq!("jpeg".parse::<MediaFormat>().unwrap(), MediaFormat::Jpg);
        assert!("gif".parse::<MediaFormat>().unwrap_err().is_configuration());
    }

    #[test]
    fn test_content_types() {
        assert_eq!(MediaFormat::Jpg.content_type(), "image/jpeg");
        assert_eq!(MediaFormat::Mp3.content_type(), "audio/mpeg");
        assert_eq!(MediaFormat::Mov.content_type(), "video/quicktime");
        assert!(MediaFormat::Webp.is_image());
        assert!(!MediaFormat::Wav.is_image());
    }
}
