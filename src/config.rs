/*!
 * Configuration types for cloud storage
 */

use crate::error::{CloudError, Result};
use crate::profile::default_profiles_path;
use crate::progress::DEFAULT_PROGRESS_INTERVAL;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the models root
pub const MODELS_DIR_ENV: &str = "COMFY_MODELS_DIR";

/// Environment variable overriding the profile file location
pub const PROFILES_PATH_ENV: &str = "COMFY_S3_PROFILES_PATH";

/// Settings shared by every cloud storage operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Root of the local model tree (`<root>/<model_type>/<file>`)
    #[serde(default = "default_models_root")]
    pub models_root: PathBuf,

    /// Named profile file
    #[serde(default = "default_profiles_path")]
    pub profiles_path: PathBuf,

    /// Minimum milliseconds between two progress updates
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stdout)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            models_root: default_models_root(),
            profiles_path: default_profiles_path(),
            progress_interval_ms: default_progress_interval_ms(),
            log_level: LogLevel::Info,
            log_file: None,
            verbose: false,
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_models_root() -> PathBuf {
    PathBuf::from("models")
}

fn default_progress_interval_ms() -> u64 {
    DEFAULT_PROGRESS_INTERVAL.as_millis() as u64
}

impl CloudConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CloudError::config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents).map_err(|e| {
            CloudError::config(format!("Invalid config {}: {}", path.display(), e))
        })
    }

    /// Apply `COMFY_MODELS_DIR` and `COMFY_S3_PROFILES_PATH` from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(MODELS_DIR_ENV).filter(|v| !v.is_empty()) {
            self.models_root = PathBuf::from(dir);
        }
        if let Some(path) = lookup(PROFILES_PATH_ENV).filter(|v| !v.is_empty()) {
            self.profiles_path = PathBuf::from(path);
        }
        self
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = CloudConfig::default();
        assert_eq!(config.models_root, PathBuf::from("models"));
        assert!(config.profiles_path.ends_with("profiles.json"));
        assert_eq!(config.progress_interval(), DEFAULT_PROGRESS_INTERVAL);
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(!config.verbose);
    }

    #[test]
    fn test_partial_toml() {
        let config: CloudConfig = toml::from_str(
            r#"
models_root = "/srv/comfy/models"
log_level = "debug"
"#,
        )
        .unwrap();
        assert_eq!(config.models_root, PathBuf::from("/srv/comfy/models"));
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.progress_interval_ms, 250);
        assert_eq!(config.log_file, None);
    }

    #[test]
    fn test_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cloud.toml");
        std::fs::write(&path, "progress_interval_ms = 1000\nverbose = true\n").unwrap();

        let config = CloudConfig::from_file(&path).unwrap();
        assert_eq!(config.progress_interval(), Duration::from_secs(1));
        assert!(config.verbose);

        std::fs::write(&path, "progress_interval_ms = \"soon\"").unwrap();
        assert!(CloudConfig::from_file(&path).unwrap_err().is_configuration());
        assert!(CloudConfig::from_file(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (MODELS_DIR_ENV, "/data/models"),
            (PROFILES_PATH_ENV, ""),
        ]
        .into_iter()
        .collect();

        let config = CloudConfig::default()
            .with_overrides_from(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.models_root, PathBuf::from("/data/models"));
        assert_eq!(config.profiles_path, default_profiles_path());
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Error.to_tracing_level(), tracing::Level::ERROR);
        assert_eq!(LogLevel::Warn.to_tracing_level(), tracing::Level::WARN);
        assert_eq!(LogLevel::Info.to_tracing_level(), tracing::Level::INFO);
        assert_eq!(LogLevel::Debug.to_tracing_level(), tracing::Level::DEBUG);
        assert_eq!(LogLevel::Trace.to_tracing_level(), tracing::Level::TRACE);
    }
}
