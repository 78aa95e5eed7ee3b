//! Named profiles loaded from the JSON profile file

use super::PartialProfile;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Directory under the home directory holding the profile file
pub const PROFILE_DIR: &str = ".comfyui-cloud-storage";

/// Default profile file name
pub const PROFILE_FILE: &str = "profiles.json";

#[derive(Debug, Default, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    profiles: BTreeMap<String, PartialProfile>,
}

/// Default location of the profile file: `~/.comfyui-cloud-storage/profiles.json`
pub fn default_profiles_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(PROFILE_DIR)
        .join(PROFILE_FILE)
}

/// Read-only mapping of profile name to partial profile
///
/// The file is read at most once per store, on first access. A missing file
/// is an empty store; an unreadable or malformed one is logged and treated
/// as empty.
#[derive(Debug)]
pub struct NamedProfileStore {
    path: PathBuf,
    profiles: OnceCell<BTreeMap<String, PartialProfile>>,
}

impl NamedProfileStore {
    /// Store backed by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            profiles: OnceCell::new(),
        }
    }

    /// Store backed by the default profile file
    pub fn open_default() -> Self {
        Self::new(default_profiles_path())
    }

    /// Store with preloaded profiles; nothing is read from disk
    pub fn from_profiles(profiles: BTreeMap<String, PartialProfile>) -> Self {
        Self {
            path: PathBuf::new(),
            profiles: OnceCell::with_value(profiles),
        }
    }

    /// Store with no profiles
    pub fn empty() -> Self {
        Self::from_profiles(BTreeMap::new())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a profile by name
    pub fn get(&self, name: &str) -> Option<&PartialProfile> {
        self.profiles().get(name)
    }

    /// Profile names, sorted
    pub fn names(&self) -> Vec<String> {
        self.profiles().keys().cloned().collect()
    }

    fn profiles(&self) -> &BTreeMap<String, PartialProfile> {
        self.profiles.get_or_init(|| load_profiles(&self.path))
    }
}

fn load_profiles(path: &Path) -> BTreeMap<String, PartialProfile> {
    if !path.exists() {
        return BTreeMap::new();
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!(
                "Failed to read cloud storage profiles from {}: {}",
                path.display(),
                e
            );
            return BTreeMap::new();
        }
    };

    match serde_json::from_str::<ProfileFile>(&contents) {
        Ok(file) => file.profiles,
        Err(e) => {
            warn!(
                "Failed to parse cloud storage profiles from {}: {}",
                path.display(),
                e
            );
            BTreeMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = NamedProfileStore::new(dir.path().join("profiles.json"));
        assert!(store.names().is_empty());
        assert!(store.get("anything").is_none());
    }

    #[test]
    fn test_malformed_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("profiles.json");
        fs::write(&path, "{ not json").unwrap();

        let store = NamedProfileStore::new(&path);
        assert!(store.names().is_empty());
    }

    #[test]
    fn test_loads_named_profiles() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("profiles.json");
        fs::write(
            &path,
            r#"{
                "profiles": {
                    "r2prof": {"provider": "Cloudflare R2", "account_id": "acct1", "bucket": "models"},
                    "b2": {"provider": "Backblaze B2", "access_key": "k", "secret_key": "s"}
                }
            }"#,
        )
        .unwrap();

        let store = NamedProfileStore::new(&path);
        assert_eq!(store.names(), vec!["b2".to_string(), "r2prof".to_string()]);

        let r2 = store.get("r2prof").unwrap();
        assert_eq!(r2.provider.as_deref(), Some("Cloudflare R2"));
        assert_eq!(r2.account_id.as_deref(), Some("acct1"));
        assert_eq!(r2.region, None);
    }

    #[test]
    fn test_file_read_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("profiles.json");
        fs::write(&path, r#"{"profiles": {"a": {}}}"#).unwrap();

        let store = NamedProfileStore::new(&path);
        assert_eq!(store.names().len(), 1);

        fs::write(&path, r#"{"profiles": {"a": {}, "b": {}}}"#).unwrap();
        assert_eq!(store.names().len(), 1);
    }

    #[test]
    fn test_default_path() {
        let path = default_profiles_path();
        assert!(path.ends_with(".comfyui-cloud-storage/profiles.json"));
    }
}
