//! Shared harness: SQLite store + AES cipher + scripted remote endpoints.
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use refund_sync_core::application::{SyncDependencies, SyncOrchestrator};
use refund_sync_core::config::{PredictionConfig, RefreshConfig, RetryPolicyConfig};
use refund_sync_core::port::analytics::mocks::RecordingAnalytics;
use refund_sync_core::port::prediction_api::mocks::ScriptedPredictionApi;
use refund_sync_core::port::refund_api::mocks::ScriptedRefundApi;
use refund_sync_core::port::time_provider::mocks::FixedTimeProvider;
use refund_sync_core::port::{
    AmountPayload, Credentials, PredictionPayload, ReloadableConfigSource, StaticSession,
    StatusPayload,
};
use refund_sync_infra_crypto::AesGcmStatusCipher;
use refund_sync_infra_sqlite::{create_pool, run_migrations, SqliteStatusStore};
use sqlx::SqlitePool;
use std::sync::Arc;

pub const MEMORY_DB: &str = "sqlite::memory:";
pub const KEY: [u8; 32] = [7u8; 32];

/// Monday 2025-03-03 10:00, in season and in business hours
pub fn season_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap()
}

pub fn status_payload(id: &str, state: &str) -> StatusPayload {
    StatusPayload {
        id: id.to_string(),
        status: state.to_string(),
        amount: Some(AmountPayload::Text("2314.50".to_string())),
        filing_date: "2025-02-10".to_string(),
        last_updated: "2025-03-01T12:00:00Z".to_string(),
        prediction: None,
        issues: None,
    }
}

pub fn prediction_payload(days: i64, confidence: f64) -> PredictionPayload {
    PredictionPayload {
        estimated_days: days,
        confidence,
        estimated_date: None,
        factors: vec![],
    }
}

/// Defaults with millisecond retry delays
pub fn fast_retry_config() -> ReloadableConfigSource {
    let refresh = RefreshConfig {
        retry_policy: RetryPolicyConfig {
            initial_delay_ms: 1,
            max_delay_ms: 5,
            ..RetryPolicyConfig::default()
        },
        ..RefreshConfig::default()
    };
    ReloadableConfigSource::new(refresh, PredictionConfig::default())
}

pub struct Harness {
    pub engine: Arc<SyncOrchestrator>,
    pub refund_api: Arc<ScriptedRefundApi>,
    pub prediction_api: Arc<ScriptedPredictionApi>,
    pub analytics: Arc<RecordingAnalytics>,
    pub pool: SqlitePool,
    pub clock: Arc<FixedTimeProvider>,
}

pub async fn open_pool(database_url: &str) -> SqlitePool {
    let pool = create_pool(database_url).await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

pub fn assemble(
    pool: SqlitePool,
    key: [u8; 32],
    refund_api: Arc<ScriptedRefundApi>,
    prediction_api: Arc<ScriptedPredictionApi>,
    refund_id: Option<&str>,
) -> Harness {
    let clock = Arc::new(FixedTimeProvider::new(season_morning()));
    let session = StaticSession::new(
        Credentials {
            auth_token: "token-abc".to_string(),
            device_id: "device-1".to_string(),
        },
        refund_id.map(str::to_string),
    );

    let analytics = Arc::new(RecordingAnalytics::new());
    let engine = SyncOrchestrator::new(SyncDependencies {
        refund_api: refund_api.clone(),
        prediction_api: prediction_api.clone(),
        status_store: Arc::new(SqliteStatusStore::new(pool.clone())),
        cipher: Arc::new(AesGcmStatusCipher::new(&key)),
        session: Arc::new(session),
        config: Arc::new(fast_retry_config()),
        time_provider: clock.clone(),
        analytics: analytics.clone(),
    });

    Harness {
        engine,
        refund_api,
        prediction_api,
        analytics,
        pool,
        clock,
    }
}

/// In-memory harness where the remote reports `r1` in `state`
pub async fn harness(state: &str) -> Harness {
    let pool = open_pool(MEMORY_DB).await;
    assemble(
        pool,
        KEY,
        Arc::new(ScriptedRefundApi::returning(Ok(status_payload("r1", state)))),
        Arc::new(ScriptedPredictionApi::returning(Ok(prediction_payload(15, 0.85)))),
        Some("r1"),
    )
}

pub async fn raw_payload(pool: &SqlitePool, refund_id: &str) -> Option<Vec<u8>> {
    sqlx::query_scalar::<_, Vec<u8>>("SELECT payload FROM refund_status_cache WHERE refund_id = ?")
        .bind(refund_id)
        .fetch_optional(pool)
        .await
        .unwrap()
}

pub async fn row_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM refund_status_cache")
        .fetch_one(pool)
        .await
        .unwrap()
}
