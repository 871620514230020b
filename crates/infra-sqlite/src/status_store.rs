// SQLite StatusRowStore Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use refund_sync_core::port::{StatusRow, StatusRowStore};
use refund_sync_core::{Result, SyncError};
use sqlx::{Row, SqlitePool};
use tracing::debug;

pub struct SqliteStatusStore {
    pool: SqlitePool,
}

impl SqliteStatusStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatusRowStore for SqliteStatusStore {
    async fn get(&self, refund_id: &str) -> Result<Option<StatusRow>> {
        let row = sqlx::query(
            "SELECT refund_id, payload, cached_at, is_valid FROM refund_status_cache WHERE refund_id = ?",
        )
        .bind(refund_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let cached_at_ms: i64 = row.try_get("cached_at").map_err(map_sqlx_error)?;
        let cached_at = DateTime::<Utc>::from_timestamp_millis(cached_at_ms).ok_or_else(|| {
            SyncError::StorageUnavailable(format!("corrupt cached_at {}", cached_at_ms))
        })?;

        Ok(Some(StatusRow {
            refund_id: row.try_get("refund_id").map_err(map_sqlx_error)?,
            encrypted_status: row.try_get("payload").map_err(map_sqlx_error)?,
            cached_at,
            is_valid: row.try_get("is_valid").map_err(map_sqlx_error)?,
        }))
    }

    async fn upsert(&self, row: &StatusRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO refund_status_cache (refund_id, payload, cached_at, is_valid)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(refund_id) DO UPDATE SET
                payload = excluded.payload,
                cached_at = excluded.cached_at,
                is_valid = excluded.is_valid
            "#,
        )
        .bind(&row.refund_id)
        .bind(&row.encrypted_status)
        .bind(row.cached_at.timestamp_millis())
        .bind(row.is_valid)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(refund_id = %row.refund_id, bytes = row.encrypted_status.len(), "Status row written");
        Ok(())
    }

    async fn invalidate(&self, refund_id: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE refund_status_cache SET is_valid = 0 WHERE refund_id = ?")
            .bind(refund_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM refund_status_cache")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}
