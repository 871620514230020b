//! Refund Sync - Main Entry Point
//! Composition root: logging, settings, DI wiring and CLI subcommands.

mod output;
mod settings;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use refund_sync_core::application::{SyncDependencies, SyncOrchestrator};
use refund_sync_core::port::{
    Credentials, ReloadableConfigSource, StaticSession, SystemTimeProvider, TracingAnalytics,
};
use refund_sync_infra_crypto::{load_or_generate_key, AesGcmStatusCipher};
use refund_sync_infra_http::{HttpClient, HttpPredictionApi, HttpRefundApi};
use refund_sync_infra_sqlite::{create_pool, run_migrations, SqliteStatusStore};

use settings::Settings;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "refund-sync")]
#[command(about = "Tax refund status sync engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML settings file
    #[arg(long, global = true, env = "REFUND_SYNC_CONFIG")]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the tracked refund's status
    Status {
        /// Bypass the cache and ask the remote service now
        #[arg(long)]
        force: bool,
    },

    /// Show the delivery-date prediction
    Prediction {
        /// Refund ID (default: the session's refund)
        #[arg(long)]
        refund_id: Option<String>,
    },

    /// Report the actual processing time of a refund
    Feedback {
        #[arg(long)]
        refund_id: String,

        #[arg(long)]
        actual_days: u32,
    },

    /// Force the next read of a refund to refresh
    Invalidate {
        /// Refund ID (default: the session's refund)
        #[arg(long)]
        refund_id: Option<String>,
    },

    /// Delete all cached refund data
    Clear,

    /// Keep refreshing in the background until Ctrl+C
    Watch,
}

fn init_logging() {
    let log_format = std::env::var("REFUND_SYNC_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("refund_sync=info"));

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    info!("Refund Sync v{} starting...", VERSION);

    let settings = Settings::load(cli.config.as_deref())?;
    let config_source = Arc::new(ReloadableConfigSource::new(
        settings.refresh.clone(),
        settings.prediction.clone(),
    ));
    let analytics = Arc::new(TracingAnalytics::new());
    let orchestrator =
        build_orchestrator(&settings, config_source.clone(), analytics.clone()).await?;

    match cli.command {
        Commands::Status { force } => {
            let mut updates = orchestrator.read(force);
            let mut failed = false;
            while let Some(update) = updates.next().await {
                match update {
                    Ok(status) => output::print_status(&status),
                    Err(e) => {
                        output::failure(&e.to_string());
                        failed = true;
                    }
                }
            }
            if failed {
                bail!("status read failed");
            }
        }

        Commands::Prediction { refund_id } => {
            let refund_id = resolve_refund_id(refund_id, &settings)?;
            let mut predictions = orchestrator.get_prediction(&refund_id);
            while let Some(prediction) = predictions.next().await {
                let prediction = prediction.context("prediction unavailable")?;
                output::print_prediction(&prediction);
            }
        }

        Commands::Feedback {
            refund_id,
            actual_days,
        } => {
            // the prediction cache is per process: load the estimate to score
            let mut predictions = orchestrator.get_prediction(&refund_id);
            while let Some(prediction) = predictions.next().await {
                if let Ok(prediction) = prediction {
                    output::print_prediction(&prediction);
                }
            }
            orchestrator
                .update_prediction_accuracy(&refund_id, actual_days)
                .await;
            output::success(&format!("Recorded {} actual days for {}", actual_days, refund_id));
        }

        Commands::Invalidate { refund_id } => {
            let refund_id = resolve_refund_id(refund_id, &settings)?;
            orchestrator
                .invalidate_status(&refund_id)
                .await
                .context("invalidate failed")?;
            output::success(&format!("Invalidated cached status of {}", refund_id));
        }

        Commands::Clear => {
            orchestrator.clear_data().await.context("clear failed")?;
            output::success("Cleared all cached refund data");
        }

        Commands::Watch => {
            let reload = match (&cli.config, settings.reload_interval_secs) {
                (Some(path), secs) if secs > 0 => Some(settings::spawn_reload(
                    path.clone(),
                    config_source.clone(),
                    Duration::from_secs(secs),
                )),
                _ => None,
            };

            let mut updates = orchestrator.read(false);
            while let Some(update) = updates.next().await {
                match update {
                    Ok(status) => output::print_status(&status),
                    Err(e) => warn!(error = %e, "Initial read failed"),
                }
            }

            info!("Watching. Press Ctrl+C to stop");
            tokio::signal::ctrl_c().await?;
            info!("Shutdown signal received");

            output::print_stats(&orchestrator.scheduler().stats());
            output::print_analytics(&analytics.snapshot());
            orchestrator.scheduler().cancel_all_refresh();
            if let Some(handle) = reload {
                handle.abort();
            }
        }
    }

    Ok(())
}

fn resolve_refund_id(explicit: Option<String>, settings: &Settings) -> Result<String> {
    explicit
        .or_else(|| settings.session.refund_id.clone())
        .context("no refund id: pass --refund-id or set session.refund_id")
}

async fn build_orchestrator(
    settings: &Settings,
    config_source: Arc<ReloadableConfigSource>,
    analytics: Arc<TracingAnalytics>,
) -> Result<Arc<SyncOrchestrator>> {
    let db_path = settings.storage.db_path();
    let key_path = settings.storage.key_path();
    ensure_parent_dir(&db_path)?;
    ensure_parent_dir(&key_path)?;

    info!(db_path = %db_path.display(), "Initializing database...");
    let pool = create_pool(&settings.storage.database_url())
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    let master_key = load_or_generate_key(&key_path)
        .with_context(|| format!("cannot load master key {}", key_path.display()))?;

    let timeout = settings.remote.timeout();
    let status_http = HttpClient::new(&settings.remote.status_base_url, timeout)?
        .with_analytics(analytics.clone());
    let prediction_http = HttpClient::new(&settings.remote.prediction_base_url, timeout)?
        .with_analytics(analytics.clone());

    let session = StaticSession::new(
        Credentials {
            auth_token: settings.session.auth_token.clone(),
            device_id: settings.session.device_id.clone(),
        },
        settings.session.refund_id.clone(),
    );

    Ok(SyncOrchestrator::new(SyncDependencies {
        refund_api: Arc::new(HttpRefundApi::new(status_http)),
        prediction_api: Arc::new(HttpPredictionApi::new(prediction_http)),
        status_store: Arc::new(SqliteStatusStore::new(pool)),
        cipher: Arc::new(AesGcmStatusCipher::new(&master_key)),
        session: Arc::new(session),
        config: config_source,
        time_provider: Arc::new(SystemTimeProvider),
        analytics,
    }))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create directory {}", parent.display())),
        _ => Ok(()),
    }
}
