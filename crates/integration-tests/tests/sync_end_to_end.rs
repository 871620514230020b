//! Read/refresh protocol over SQLite + AES-GCM with scripted remotes.

mod common;

use common::*;
use futures::StreamExt;
use refund_sync_core::domain::{RefundState, RefundStatus};
use refund_sync_core::port::prediction_api::mocks::ScriptedPredictionApi;
use refund_sync_core::port::refund_api::mocks::ScriptedRefundApi;
use refund_sync_core::{Result, SyncError};
use std::sync::Arc;
use std::time::Duration;

async fn read(h: &Harness, force: bool) -> Vec<Result<RefundStatus>> {
    h.engine.read(force).collect().await
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Cache empty, remote says PROCESSING without prediction
#[tokio::test]
async fn test_cache_miss_fetches_persists_and_predicts() {
    let h = harness("PROCESSING").await;

    let emitted = read(&h, false).await;

    assert_eq!(emitted.len(), 1);
    let status = emitted[0].as_ref().unwrap();
    assert_eq!(status.id, "r1");
    assert_eq!(status.state, RefundState::Processing);
    assert_eq!(status.prediction.as_ref().unwrap().estimated_days, 15);
    assert_eq!(h.prediction_api.prediction_calls(), 1);
    assert_eq!(h.engine.prediction_cache().len(), 1);

    // Persisted encrypted: the row exists but holds no readable status
    let payload = raw_payload(&h.pool, "r1").await.unwrap();
    assert!(!contains(&payload, b"PROCESSING"));
    assert!(!contains(&payload, b"2314.50"));
}

#[tokio::test]
async fn test_fresh_entry_served_without_network() {
    let h = harness("PROCESSING").await;
    let first = read(&h, false).await;

    let second = read(&h, false).await;

    assert_eq!(second, first);
    assert_eq!(h.refund_api.status_calls(), 1);
}

/// Cached two hours ago with a 15 minute TTL
#[tokio::test]
async fn test_stale_entry_served_then_refreshed_in_background() {
    let h = harness("PROCESSING").await;
    read(&h, false).await;
    h.refund_api.set_fallback(Ok(status_payload("r1", "DELAYED")));
    h.clock.advance(chrono::Duration::hours(2));
    let requests_before = h.engine.scheduler().stats().schedule_requests;

    let emitted = read(&h, false).await;

    assert_eq!(emitted.len(), 1);
    let stale = emitted[0].as_ref().unwrap();
    assert!(stale.is_stale);
    assert_eq!(stale.state, RefundState::Processing);
    assert_eq!(
        h.engine.scheduler().stats().schedule_requests,
        requests_before + 1
    );

    let mut refreshed = None;
    for _ in 0..200 {
        if let Some(cached) = h.engine.status_cache().get("r1").await {
            if cached.status.state == RefundState::Delayed {
                refreshed = Some(cached);
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(refreshed.is_some(), "background job never refreshed r1");
    assert_eq!(h.refund_api.status_calls(), 2);

    for _ in 0..200 {
        if !h.analytics.refreshes().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(h.analytics.refreshes(), vec![("r1".to_string(), None)]);
}

#[tokio::test]
async fn test_retryable_failure_attempts_three_times() {
    let h = harness("PROCESSING").await;
    h.refund_api
        .set_fallback(Err(SyncError::Network("connection reset".to_string())));

    let emitted = read(&h, true).await;

    assert_eq!(
        emitted,
        vec![Err(SyncError::Network("connection reset".to_string()))]
    );
    assert_eq!(h.refund_api.status_calls(), 3);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let h = harness("PROCESSING").await;
    h.refund_api.set_fallback(Err(SyncError::Client {
        status: 404,
        message: "unknown refund".to_string(),
    }));

    let emitted = read(&h, true).await;

    assert!(matches!(emitted[0], Err(SyncError::Client { status: 404, .. })));
    assert_eq!(h.refund_api.status_calls(), 1);
}

#[tokio::test]
async fn test_denied_refresh_serves_persisted_value() {
    let h = harness("PROCESSING").await;
    read(&h, false).await;
    for _ in 0..3 {
        assert!(read(&h, true).await[0].is_ok());
    }
    let calls = h.refund_api.status_calls();
    assert_eq!(calls, 4);

    let emitted: Vec<_> = h.engine.refresh("r1").collect().await;

    assert_eq!(emitted.len(), 1);
    let status = emitted[0].as_ref().unwrap();
    assert!(status.is_stale);
    assert_eq!(status.state, RefundState::Processing);
    assert_eq!(h.refund_api.status_calls(), calls);
}

#[tokio::test]
async fn test_denied_refresh_without_persisted_value_is_rate_limited() {
    let h = harness("PROCESSING").await;
    h.refund_api.set_fallback(Err(SyncError::Client {
        status: 401,
        message: "expired token".to_string(),
    }));
    for _ in 0..3 {
        read(&h, true).await;
    }
    assert_eq!(h.refund_api.status_calls(), 3);

    let emitted: Vec<_> = h.engine.refresh("r1").collect().await;

    assert_eq!(emitted, vec![Err(SyncError::RateLimit { retry_after: None })]);
    assert_eq!(h.refund_api.status_calls(), 3);
}

#[tokio::test]
async fn test_tampered_row_is_a_miss() {
    let h = harness("PROCESSING").await;
    read(&h, false).await;
    sqlx::query("UPDATE refund_status_cache SET payload = X'00010203' WHERE refund_id = 'r1'")
        .execute(&h.pool)
        .await
        .unwrap();

    assert!(h.engine.status_cache().get("r1").await.is_none());

    let emitted = read(&h, false).await;

    assert!(!emitted[0].as_ref().unwrap().is_stale);
    assert_eq!(h.refund_api.status_calls(), 2);
    assert!(h.engine.status_cache().get("r1").await.is_some());
}

#[tokio::test]
async fn test_invalidated_entry_triggers_refresh() {
    let h = harness("PROCESSING").await;
    read(&h, false).await;
    h.engine.scheduler().cancel_all_refresh();

    h.engine.invalidate_status("r1").await.unwrap();
    let emitted = read(&h, false).await;

    assert!(emitted[0].as_ref().unwrap().is_stale);
    assert!(h.engine.scheduler().has_job("r1"));
}

#[tokio::test]
async fn test_clear_data_wipes_everything() {
    let h = harness("PROCESSING").await;
    read(&h, false).await;
    assert_eq!(row_count(&h.pool).await, 1);
    assert!(h.engine.scheduler().has_job("r1"));

    h.engine.clear_data().await.unwrap();

    assert_eq!(row_count(&h.pool).await, 0);
    assert!(h.engine.prediction_cache().is_empty());
    assert_eq!(h.engine.scheduler().active_job_count(), 0);
}

#[tokio::test]
async fn test_session_learns_refund_id_from_first_fetch() {
    let pool = open_pool(MEMORY_DB).await;
    let h = assemble(
        pool,
        KEY,
        Arc::new(ScriptedRefundApi::returning(Ok(status_payload("r7", "AVAILABLE")))),
        Arc::new(ScriptedPredictionApi::unreachable()),
        None,
    );

    let first = read(&h, false).await;
    let second = read(&h, false).await;

    assert_eq!(first[0].as_ref().unwrap().id, "r7");
    assert_eq!(second, first);
    assert_eq!(h.refund_api.status_calls(), 1);
    // Terminal states carry no prediction and no background job
    assert!(first[0].as_ref().unwrap().prediction.is_none());
    assert!(!h.engine.scheduler().has_job("r7"));
}

#[tokio::test]
async fn test_repeated_schedule_keeps_one_job() {
    let h = harness("PROCESSING").await;

    h.engine.scheduler().schedule_refresh("r1");
    h.engine.scheduler().schedule_refresh("r1");

    assert_eq!(h.engine.scheduler().active_job_count(), 1);
    assert_eq!(h.engine.scheduler().stats().replaced_jobs, 1);
}
