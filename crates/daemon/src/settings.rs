//! Layered daemon settings and hot reload.
//!
//! Precedence (lowest first): built-in defaults, optional TOML file
//! (`REFUND_SYNC_CONFIG` / `--config`), `REFUND_SYNC__*` environment
//! variables with `__` as the nesting separator, e.g.
//! `REFUND_SYNC__REFRESH__RETRY_POLICY__MAX_ATTEMPTS=5`.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use refund_sync_core::config::{PredictionConfig, RefreshConfig};
use refund_sync_core::port::ReloadableConfigSource;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const ENV_PREFIX: &str = "REFUND_SYNC";
const DEFAULT_DB_PATH: &str = "~/.refund-sync/status.db";
const DEFAULT_KEY_PATH: &str = "~/.refund-sync/master.key";
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub refresh: RefreshConfig,
    pub prediction: PredictionConfig,
    pub storage: StorageSettings,
    pub remote: RemoteSettings,
    pub session: SessionSettings,
    /// How often the config file is re-read while watching (0 disables)
    pub reload_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            refresh: RefreshConfig::default(),
            prediction: PredictionConfig::default(),
            storage: StorageSettings::default(),
            remote: RemoteSettings::default(),
            session: SessionSettings::default(),
            reload_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub db_path: String,
    pub key_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            key_path: DEFAULT_KEY_PATH.to_string(),
        }
    }
}

impl StorageSettings {
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.db_path).into_owned())
    }

    pub fn key_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.key_path).into_owned())
    }

    /// sqlx connection url for the status database
    pub fn database_url(&self) -> String {
        if self.db_path.contains(":memory:") {
            return "sqlite::memory:".to_string();
        }
        format!("sqlite://{}", self.db_path().display())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub status_base_url: String,
    pub prediction_base_url: String,
    pub timeout_secs: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            status_base_url: DEFAULT_BASE_URL.to_string(),
            prediction_base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 15,
        }
    }
}

impl RemoteSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub auth_token: String,
    pub device_id: String,
    pub refund_id: Option<String>,
}

impl Settings {
    /// Load defaults, the optional file and the process environment.
    pub fn load(path: Option<&str>) -> Result<Self> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env(path: Option<&str>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            let expanded = shellexpand::tilde(path).into_owned();
            builder = builder.add_source(File::new(&expanded, FileFormat::Toml).required(true));
        }

        let settings: Settings = builder
            .add_source(env)
            .build()
            .and_then(Config::try_deserialize)
            .with_context(|| format!("failed to load settings (file: {:?})", path))?;

        settings
            .refresh
            .validate()
            .context("invalid refresh settings")?;
        settings
            .prediction
            .validate()
            .context("invalid prediction settings")?;
        Ok(settings)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Periodically re-read the settings file into `source`.
///
/// A failed read keeps the last good snapshot.
pub fn spawn_reload(
    path: String,
    source: Arc<ReloadableConfigSource>,
    every: Duration,
) -> JoinHandle<()> {
    info!(path = %path, every_secs = every.as_secs(), "Config reload enabled");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match Settings::load(Some(&path)) {
                Ok(settings) => {
                    source.replace(settings.refresh, settings.prediction);
                    debug!(path = %path, "Config snapshot reloaded");
                }
                Err(e) => {
                    warn!(path = %path, error = %format!("{e:#}"), "Config reload failed, keeping last snapshot");
                }
            }
        }
    })
}
