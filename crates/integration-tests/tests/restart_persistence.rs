//! Encrypted status cache across process restarts.

mod common;

use common::*;
use futures::StreamExt;
use refund_sync_core::port::prediction_api::mocks::ScriptedPredictionApi;
use refund_sync_core::port::refund_api::mocks::ScriptedRefundApi;
use std::path::PathBuf;
use std::sync::Arc;

struct TempDb {
    path: PathBuf,
}

impl TempDb {
    fn new() -> Self {
        let path = std::env::temp_dir().join(format!("refund_sync_{}.db", uuid::Uuid::new_v4()));
        Self { path }
    }

    fn url(&self) -> String {
        format!("sqlite://{}", self.path.display())
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", self.path.display(), suffix));
        }
    }
}

fn scripted() -> (Arc<ScriptedRefundApi>, Arc<ScriptedPredictionApi>) {
    (
        Arc::new(ScriptedRefundApi::returning(Ok(status_payload("r1", "PROCESSING")))),
        Arc::new(ScriptedPredictionApi::returning(Ok(prediction_payload(12, 0.9)))),
    )
}

#[tokio::test]
async fn test_status_survives_restart() {
    let db = TempDb::new();

    let written = {
        let (refund_api, prediction_api) = scripted();
        let h = assemble(open_pool(&db.url()).await, KEY, refund_api, prediction_api, Some("r1"));
        let emitted: Vec<_> = h.engine.read(false).collect().await;
        h.pool.close().await;
        emitted
    };

    let (refund_api, prediction_api) = scripted();
    let h = assemble(open_pool(&db.url()).await, KEY, refund_api, prediction_api, Some("r1"));
    let emitted: Vec<_> = h.engine.read(false).collect().await;

    assert_eq!(emitted, written);
    assert_eq!(h.refund_api.status_calls(), 0);
}

#[tokio::test]
async fn test_foreign_key_reads_as_miss() {
    let db = TempDb::new();
    {
        let (refund_api, prediction_api) = scripted();
        let h = assemble(open_pool(&db.url()).await, KEY, refund_api, prediction_api, Some("r1"));
        h.engine.read(false).collect::<Vec<_>>().await;
        h.pool.close().await;
    }

    let (refund_api, prediction_api) = scripted();
    let h = assemble(
        open_pool(&db.url()).await,
        [9u8; 32],
        refund_api,
        prediction_api,
        Some("r1"),
    );

    assert!(h.engine.status_cache().get("r1").await.is_none());
    let emitted: Vec<_> = h.engine.read(false).collect().await;

    assert!(emitted[0].is_ok());
    assert_eq!(h.refund_api.status_calls(), 1);
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let db = TempDb::new();
    let pool = open_pool(&db.url()).await;
    refund_sync_infra_sqlite::run_migrations(&pool).await.unwrap();

    let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(versions, 1);
}
