use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::mpsc;

use feedsync::api::ApiClient;
use feedsync::app::{App, AppEvent};
use feedsync::config::Config;
use feedsync::preferences::PreferenceManager;
use feedsync::storage::{Database, DatabaseError};
use feedsync::sync::{PollTick, Scope, SyncEngine, ViewSelection};
use feedsync::ui;

/// Get the config directory path (~/.config/feedsync/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let config_dir = PathBuf::from(home).join(".config").join("feedsync");
    Ok(config_dir)
}

/// Create the config directory if needed and restrict it to the current user.
fn prepare_config_dir(config_dir: &Path) -> Result<()> {
    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir).context("Failed to create config directory")?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }
    Ok(())
}

/// Send tracing output to a log file; the TUI owns the terminal.
fn init_logging(config_dir: &Path) -> Result<()> {
    let log_path = config_dir.join("feedsync.log");
    let file = File::options()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file '{}'", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[derive(Parser, Debug)]
#[command(
    name = "feedsync",
    about = "Terminal client for a feed-aggregation server"
)]
struct Args {
    /// Server base URL (overrides server_url in the config file)
    #[arg(long, value_name = "URL")]
    server: Option<String>,

    /// Config file to use instead of ~/.config/feedsync/config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Forget locally stored preferences
    #[arg(long)]
    reset_prefs: bool,

    /// View to open first, e.g. "/", "/daily", "/category/3" or "/category/3/feed/17/all"
    #[arg(value_name = "PATH")]
    path: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let config_dir = get_config_dir()?;
    prepare_config_dir(&config_dir)?;
    init_logging(&config_dir)?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config '{}'", config_path.display()))?;
    if let Some(server) = args.server {
        config.server_url = server;
    }

    let db_path = config_dir.join("state.db");
    if args.reset_prefs && db_path.exists() {
        std::fs::remove_file(&db_path).context("Failed to delete preference database")?;
        println!("Preferences reset.");
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let (db, prefs) = match Database::open(db_path_str).await {
        Ok(db) => {
            let prefs = PreferenceManager::load(&config, &db)
                .await
                .context("Failed to load preferences")?;
            (Some(db), prefs)
        }
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of feedsync appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Preference database unavailable, using config defaults");
            (None, PreferenceManager::from_config(&config))
        }
    };

    let api = ApiClient::new(&config.server_url, config.request_timeout())
        .with_context(|| format!("Invalid server URL '{}'", config.server_url))?;

    let initial = match args.path.as_deref() {
        Some(path) => ViewSelection::from_path(path)
            .with_context(|| format!("Invalid view path '{}'", path))?,
        None => ViewSelection::new(Scope::Global, prefs.read_filter()),
    };
    tracing::info!(server = %api.base_url(), view = %initial, "Starting feedsync");

    let (tick_tx, tick_rx) = mpsc::channel::<PollTick>(4);
    let engine = SyncEngine::new(config.sync_settings(), initial, tick_tx);
    let mut app = App::new(api, db, prefs, engine);

    let (event_tx, event_rx) = mpsc::channel::<AppEvent>(64);
    ui::run(
        &mut app,
        config.badge_interval(),
        event_tx,
        event_rx,
        tick_rx,
    )
    .await?;

    Ok(())
}
