mod app;

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    path::Path,
    sync::{Arc, Mutex},
};

use terrorscape_core::{
    config::{self, AppConfig},
    session::{Clock, MatchTicker, SessionStore, SystemClock},
    storage::{FileStorage, KeyValueStore},
    Catalog, Preferences,
};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    init_logging(&config.log_dir())?;
    tracing::info!(data_dir = %config.data_dir.display(), "Configuration loaded");

    let storage: Arc<dyn KeyValueStore> = Arc::new(
        FileStorage::new(&config.data_dir).with_quota(config.storage_quota_bytes),
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let store = SessionStore::open(Arc::clone(&storage), Catalog::builtin(), Arc::clone(&clock));
    let preferences = Preferences::new(storage);
    let ticker = MatchTicker::new(config.tick_interval(), clock);

    let mut app = app::ConsoleApp::new(store, preferences, ticker);
    app.run().await
}

fn init_logging(log_dir: &Path) -> Result<()> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    let log_path = log_dir.join("terrorscape.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    let env_filter = EnvFilter::from_default_env();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stdout);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(())
}
