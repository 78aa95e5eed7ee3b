//! Listing keys and minting share URLs

use crate::error::{CloudError, Result};
use crate::factory::ResolvedConnection;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Largest number of keys a single listing returns
pub const MAX_LIST_RESULTS: usize = 1000;

/// Longest share URL lifetime, in hours (7 days)
pub const MAX_SHARE_HOURS: u32 = 168;

/// One listed object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// List up to `max_results` keys under `path_prefix + prefix`
///
/// `max_results` is clamped to `1..=1000`. Pages are followed until enough
/// keys are collected or the listing ends.
pub async fn list_objects(
    conn: &ResolvedConnection,
    prefix: &str,
    max_results: usize,
) -> Result<Vec<ObjectSummary>> {
    let store = conn.store()?;
    let full_prefix = conn.full_key(prefix);
    let limit = max_results.clamp(1, MAX_LIST_RESULTS);

    let mut results = Vec::new();
    let mut token = None;
    loop {
        let remaining = (limit - results.len()) as i32;
        let page = store
            .list_page(&full_prefix, token, remaining)
            .await
            .map_err(|source| CloudError::Storage {
                operation: "List",
                source,
            })?;

        results.extend(page.objects.into_iter().map(|obj| ObjectSummary {
            key: obj.key,
            size: obj.size,
            last_modified: obj.last_modified.map(DateTime::<Utc>::from),
        }));

        if results.len() >= limit || !page.is_truncated {
            break;
        }
        match page.continuation_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    results.truncate(limit);
    debug!("Listed {} objects under '{}'", results.len(), full_prefix);
    Ok(results)
}

/// Render a listing as `<key>  (<size> MB)` lines
pub fn format_listing(objects: &[ObjectSummary]) -> String {
    objects
        .iter()
        .map(|obj| format!("{}  ({:.1} MB)", obj.key, obj.size as f64 / (1024.0 * 1024.0)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Signed GET URL for `path_prefix + key`, valid for `expires_hours`
///
/// Signing happens locally; nothing is sent to the provider.
pub async fn share_url(conn: &ResolvedConnection, key: &str, expires_hours: u32) -> Result<String> {
    if !(1..=MAX_SHARE_HOURS).contains(&expires_hours) {
        return Err(CloudError::config(format!(
            "Share URL expiry must be between 1 and {} hours, got {}",
            MAX_SHARE_HOURS, expires_hours
        )));
    }

    let store = conn.store()?;
    let full_key = conn.full_key(key);
    store
        .presign_get(&full_key, Duration::from_secs(u64::from(expires_hours) * 3600))
        .await
        .map_err(|source| CloudError::Storage {
            operation: "Presign",
            source,
        })
}
