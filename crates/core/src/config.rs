//! Application configuration loaded from defaults, a TOML file and the environment.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Directory name under the platform config/data roots.
pub const APP_DIR: &str = "terrorscape";
/// Prefix for environment overrides, e.g. `TERRORSCAPE_TICK_INTERVAL_MS`.
pub const ENV_PREFIX: &str = "TERRORSCAPE";

const DEFAULT_CONFIG: &str = r#"# Terrorscape companion configuration.

# Directory holding the persisted progress and preference documents.
# data_dir = "/home/me/.local/share/terrorscape"

# Interval of the match timer tick, in milliseconds.
tick_interval_ms = 1000

# Optional cap on the size of a single stored document, in bytes.
# storage_quota_bytes = 5242880
"#;

/// Runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory of the file-backed key-value store.
    pub data_dir: PathBuf,
    /// Match timer tick interval in milliseconds.
    pub tick_interval_ms: u64,
    /// Optional per-document size cap in bytes.
    #[serde(default)]
    pub storage_quota_bytes: Option<usize>,
}

impl AppConfig {
    /// Load from the default config file location.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load from `path` (optional) layered over defaults and environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = ::config::Config::builder()
            .set_default("data_dir", default_data_dir().to_string_lossy().into_owned())?
            .set_default("tick_interval_ms", 1000_i64)?
            .add_source(::config::File::from(path.to_path_buf()).required(false))
            .add_source(::config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;

        let config: AppConfig = settings
            .try_deserialize()
            .context("failed to parse configuration")?;
        Ok(config.normalized())
    }

    /// Tick interval as a duration, never shorter than 10ms.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(10))
    }

    /// Directory for log files.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    fn normalized(mut self) -> Self {
        if self.storage_quota_bytes == Some(0) {
            self.storage_quota_bytes = None;
        }
        self
    }
}

/// Default configuration file path.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.toml")
}

/// Default data directory for persisted documents.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Write the commented default configuration if no file exists yet.
pub fn ensure_default_config() -> Result<()> {
    ensure_config_at(config_path())
}

/// Write the commented default configuration to `path` if it does not exist.
pub fn ensure_config_at(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write default config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_file_is_written_once_and_parses() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("config.toml");
        ensure_config_at(&path)?;
        assert!(path.exists());

        fs::write(&path, "tick_interval_ms = 250\n")?;
        ensure_config_at(&path)?;
        assert_eq!(fs::read_to_string(&path)?, "tick_interval_ms = 250\n");

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.tick_interval(), Duration::from_millis(250));
        assert_eq!(config.storage_quota_bytes, None);
        Ok(())
    }

    #[test]
    fn file_values_override_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "data_dir = \"/tmp/terrorscape-test\"\nstorage_quota_bytes = 0\n",
        )?;

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.data_dir, PathBuf::from("/tmp/terrorscape-test"));
        assert_eq!(config.tick_interval_ms, 1000);
        assert_eq!(config.storage_quota_bytes, None);
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/terrorscape-test/logs"));
        Ok(())
    }

    #[test]
    fn missing_file_uses_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load_from(dir.path().join("absent.toml"))?;
        assert_eq!(config.tick_interval_ms, 1000);
        assert_eq!(config.data_dir, default_data_dir());
        Ok(())
    }
}
