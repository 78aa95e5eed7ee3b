/*!
 * comfy-cloud CLI - drive cloud storage operations from a terminal
 *
 * Resolves credentials exactly like the pipeline nodes do (environment,
 * profile file, per-command overrides) so profiles and model caches can be
 * checked by hand.
 */

use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use comfy_cloud_storage::{
    cli_progress::BarProgress,
    config::{CloudConfig, LogLevel},
    download::ModelDownloader,
    error::{CloudError, EXIT_FATAL, EXIT_SUCCESS},
    logging,
    nodes::{self, ProfileHandle},
    ops,
    profile::{environment_layer, NamedProfileStore, ProfileResolver},
    provider, ResolvedConnection,
};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "comfy-cloud")]
#[command(version, about = "S3-compatible cloud storage for node pipelines", long_about = None)]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Named profile from the profile file
    #[arg(short = 'p', long, default_value = "(env vars)", global = true)]
    profile: String,

    /// Override the profile's bucket
    #[arg(short = 'b', long, global = true)]
    bucket: Option<String>,

    /// Override the profile's key prefix
    #[arg(long = "path-prefix", global = true)]
    path_prefix: Option<String>,

    /// Log level; overrides the settings file [default: warn]
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Write JSON logs to this file instead of stdout
    #[arg(long = "log", value_name = "FILE", global = true)]
    log: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List built-in provider presets
    Providers,

    /// List selectable profiles
    Profiles,

    /// Show the resolved profile without secrets
    Resolve,

    /// Download a model into the local cache, skipping unchanged files
    FetchModel {
        /// Model directory, e.g. checkpoints, loras, vae
        model_type: String,

        /// Object key relative to the profile prefix
        key: String,

        /// Download even if the cached copy is current
        #[arg(short, long)]
        force: bool,

        /// Local models root
        #[arg(long, value_name = "DIR")]
        models_dir: Option<PathBuf>,
    },

    /// Upload a local file
    Upload {
        file: PathBuf,

        /// Object key relative to the profile prefix (defaults to the file name)
        #[arg(short, long)]
        key: Option<String>,
    },

    /// List objects under a prefix
    List {
        #[arg(default_value = "")]
        prefix: String,

        /// Maximum number of keys (1-1000)
        #[arg(short, long, default_value = "100")]
        max: usize,
    },

    /// Print a presigned download URL
    Share {
        key: String,

        /// Lifetime in hours (1-168)
        #[arg(long, default_value = "24")]
        hours: u32,
    },

    /// Fetch and decode an image, printing its size and fingerprint
    LoadImage { key: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            e.downcast_ref::<CloudError>()
                .map_or(EXIT_FATAL, CloudError::exit_code)
        }
    };
    std::process::exit(code);
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CloudConfig::from_file(path)?,
        None => CloudConfig {
            log_level: LogLevel::Warn,
            ..CloudConfig::default()
        },
    }
    .with_env_overrides();
    let config = apply_log_flags(config, &cli);

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(handle_command(cli, config))
}

/// Logging flags given on the command line win over the settings file
fn apply_log_flags(mut config: CloudConfig, cli: &Cli) -> CloudConfig {
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    config.log_file = cli.log.clone().or(config.log_file);
    config.verbose |= cli.verbose;
    config
}

async fn handle_command(cli: Cli, config: CloudConfig) -> anyhow::Result<()> {
    let store = NamedProfileStore::new(&config.profiles_path);

    match cli.command {
        Commands::Providers => {
            for preset in provider::presets() {
                let endpoint = preset
                    .endpoint_template
                    .unwrap_or(if preset.is_custom() { "(explicit endpoint)" } else { "(SDK default)" });
                println!(
                    "{:<22} {:<48} region {:<12}{}",
                    preset.name,
                    endpoint,
                    preset.default_region,
                    if preset.requires_account_id { " (account id required)" } else { "" }
                );
            }
            return Ok(());
        }
        Commands::Profiles => {
            println!("Profiles file: {}", store.path().display());
            for name in nodes::profile_choices(&store) {
                println!("  {}", name);
            }
            return Ok(());
        }
        _ => {}
    }

    let handle = ProfileHandle {
        profile: cli.profile.clone(),
        bucket: cli.bucket.clone(),
        path_prefix: cli.path_prefix.clone(),
    };
    let resolver = ProfileResolver::new(environment_layer(), store);
    let conn = handle.connect(&resolver)?;

    match cli.command {
        Commands::Resolve => {
            println!("{}", nodes::describe(conn.profile()));
        }
        Commands::FetchModel {
            model_type,
            key,
            force,
            models_dir,
        } => {
            let mut downloader = ModelDownloader::from_config(&config);
            if let Some(dir) = models_dir {
                downloader = ModelDownloader::new(dir).with_progress_interval(config.progress_interval());
            }
            let path = fetch_with_ctrl_c(&downloader, &conn, &key, &model_type, force).await?;
            println!("{}", path.display());
        }
        Commands::Upload { file, key } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let key = match key {
                Some(key) => key,
                None => file
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .ok_or_else(|| CloudError::config("Upload path has no file name"))?,
            };
            let content_type = mime_guess::from_path(&file).first_or_octet_stream();
            let receipt =
                ops::save_bytes(&conn, &key, Bytes::from(data), content_type.essence_str()).await?;
            println!("{}", receipt.uri);
        }
        Commands::List { prefix, max } => {
            let objects = ops::list_objects(&conn, &prefix, max).await?;
            println!("{}", ops::format_listing(&objects));
        }
        Commands::Share { key, hours } => {
            println!("{}", ops::share_url(&conn, &key, hours).await?);
        }
        Commands::LoadImage { key } => {
            let loaded = ops::load_image(&conn, &key).await?;
            let fingerprint = ops::fingerprint(&conn, &key).await;
            println!(
                "{} {}x{} etag {}",
                ops::object_key(&conn, &key),
                loaded.image.width,
                loaded.image.height,
                if fingerprint.is_empty() { "-" } else { fingerprint.as_str() }
            );
        }
        Commands::Providers | Commands::Profiles => {}
    }

    Ok(())
}

/// Run a model download that Ctrl-C cancels cleanly
async fn fetch_with_ctrl_c(
    downloader: &ModelDownloader,
    conn: &ResolvedConnection,
    key: &str,
    model_type: &str,
    force: bool,
) -> comfy_cloud_storage::Result<PathBuf> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let progress = BarProgress::new(format!("{}/{}", model_type, key));
    let result = downloader
        .fetch_model(conn, key, model_type, force, &progress, &cancel)
        .await;
    match &result {
        Ok(_) => progress.finish("done"),
        Err(_) => progress.abandon(),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_config() -> CloudConfig {
        CloudConfig {
            log_level: LogLevel::Error,
            ..CloudConfig::default()
        }
    }

    #[test]
    fn test_explicit_log_level_beats_settings_file() {
        let cli = Cli::try_parse_from([
            "comfy-cloud",
            "--config",
            "cloud.toml",
            "--log-level",
            "debug",
            "providers",
        ])
        .unwrap();
        assert_eq!(apply_log_flags(file_config(), &cli).log_level, LogLevel::Debug);
    }

    #[test]
    fn test_settings_file_level_kept_without_flag() {
        let cli = Cli::try_parse_from(["comfy-cloud", "--config", "cloud.toml", "providers"]).unwrap();
        let config = apply_log_flags(file_config(), &cli);
        assert_eq!(config.log_level, LogLevel::Error);
        assert!(config.log_file.is_none());
    }
}
