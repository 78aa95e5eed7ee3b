/*!
 * Logging and tracing initialization
 *
 * `RUST_LOG` takes precedence over the configured level.
 */

use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::CloudConfig;
use crate::error::{CloudError, Result};

/// Where log records go
///
/// Stdout is reserved for command results (paths, URIs, listings), so
/// console logging always goes to stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    JsonFile(PathBuf),
}

impl LogTarget {
    pub fn from_config(config: &CloudConfig) -> Self {
        match &config.log_file {
            Some(path) => LogTarget::JsonFile(path.clone()),
            None => LogTarget::Stderr,
        }
    }
}

/// Install the global subscriber for `config`
pub fn init_logging(config: &CloudConfig) -> Result<()> {
    let level = effective_level(config);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("comfy_cloud_storage={}", level)))
        .map_err(|e| CloudError::config(format!("Failed to create log filter: {}", e)))?;

    match LogTarget::from_config(config) {
        LogTarget::Stderr => {
            let console = fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(io::stderr().is_terminal())
                .with_target(false)
                .compact();
            tracing_subscriber::registry().with(filter).with(console).init();
        }
        LogTarget::JsonFile(path) => {
            let file = File::create(&path).map_err(|e| {
                CloudError::config(format!(
                    "Failed to create log file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let json = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE)
                .json();
            tracing_subscriber::registry().with(filter).with(json).init();
        }
    }

    Ok(())
}

/// `verbose` forces debug output regardless of the configured level
fn effective_level(config: &CloudConfig) -> Level {
    if config.verbose {
        Level::DEBUG
    } else {
        config.log_level.to_tracing_level()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use tempfile::TempDir;

    #[test]
    fn test_file_logging_requires_writable_path() {
        let dir = TempDir::new().unwrap();
        let config = CloudConfig {
            log_file: Some(dir.path().join("missing").join("cloud.log")),
            ..Default::default()
        };

        // The parent directory does not exist, so no subscriber is installed
        let err = init_logging(&config).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("log file"));
    }

    #[test]
    fn test_verbose_overrides_log_level() {
        let config = CloudConfig {
            log_level: LogLevel::Error,
            verbose: true,
            ..Default::default()
        };
        assert_eq!(effective_level(&config), Level::DEBUG);

        let config = CloudConfig {
            log_level: LogLevel::Warn,
            ..Default::default()
        };
        assert_eq!(effective_level(&config), Level::WARN);
    }

    #[test]
    fn test_console_logs_stay_off_stdout() {
        assert_eq!(LogTarget::from_config(&CloudConfig::default()), LogTarget::Stderr);

        let config = CloudConfig {
            log_file: Some(PathBuf::from("/var/log/comfy-cloud.json")),
            ..Default::default()
        };
        assert_eq!(
            LogTarget::from_config(&config),
            LogTarget::JsonFile(PathBuf::from("/var/log/comfy-cloud.json"))
        );
    }
}
