//! Staleness-aware status cache over an encrypted row store
//!
//! Write-through: `put` and `invalidate` return only once the row store has
//! persisted the change. Reads never fail: a missing row, an unreadable row
//! and a store outage all look like a miss to the caller.

use crate::domain::RefundStatus;
use crate::error::{Result, SyncError};
use crate::port::{StatusCipher, StatusRow, StatusRowStore, TimeProvider};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A cached status with its write time and validity flag
#[derive(Debug, Clone, PartialEq)]
pub struct CachedStatus {
    pub status: RefundStatus,
    pub cached_at: DateTime<Utc>,
    pub is_valid: bool,
}

impl CachedStatus {
    /// `now - cached_at > ttl`
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now - self.cached_at > ttl,
            Err(_) => false,
        }
    }

    /// Stale or explicitly invalidated
    pub fn needs_refresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        !self.is_valid || self.is_stale(now, ttl)
    }
}

pub struct StatusCache {
    store: Arc<dyn StatusRowStore>,
    cipher: Arc<dyn StatusCipher>,
    time_provider: Arc<dyn TimeProvider>,
}

impl StatusCache {
    pub fn new(
        store: Arc<dyn StatusRowStore>,
        cipher: Arc<dyn StatusCipher>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            store,
            cipher,
            time_provider,
        }
    }

    pub async fn get(&self, refund_id: &str) -> Option<CachedStatus> {
        let row = match self.store.get(refund_id).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                debug!(refund_id = %refund_id, "Status cache miss");
                return None;
            }
            Err(e) => {
                warn!(refund_id = %refund_id, error = %e, "Status store read failed, treating as miss");
                return None;
            }
        };

        let status = match self.decode(&row) {
            Ok(status) => status,
            Err(e) => {
                warn!(refund_id = %refund_id, error = %e, "Unreadable cache entry, treating as miss");
                return None;
            }
        };

        debug!(
            refund_id = %refund_id,
            cached_at = %row.cached_at,
            is_valid = row.is_valid,
            "Status cache hit"
        );
        Some(CachedStatus {
            status,
            cached_at: row.cached_at,
            is_valid: row.is_valid,
        })
    }

    /// Encrypt and persist, replacing any prior entry for the id.
    pub async fn put(&self, refund_id: &str, status: &RefundStatus) -> Result<()> {
        let plaintext = serde_json::to_vec(status)
            .map_err(|e| SyncError::StorageUnavailable(format!("encode status: {}", e)))?;
        let encrypted_status = self
            .cipher
            .encrypt(&plaintext)
            .map_err(|e| SyncError::StorageUnavailable(format!("encrypt status: {}", e)))?;

        let row = StatusRow {
            refund_id: refund_id.to_string(),
            encrypted_status,
            cached_at: self.time_provider.now(),
            is_valid: true,
        };
        self.store.upsert(&row).await?;

        debug!(refund_id = %refund_id, state = %status.state, "Status cached");
        Ok(())
    }

    /// Mark invalid without deleting; the last known value stays servable.
    pub async fn invalidate(&self, refund_id: &str) -> Result<()> {
        let existed = self.store.invalidate(refund_id).await?;
        debug!(refund_id = %refund_id, existed, "Status invalidated");
        Ok(())
    }

    /// Hard delete of every row. Only ever fails with `StorageUnavailable`.
    pub async fn clear(&self) -> Result<()> {
        let deleted = self.store.delete_all().await.map_err(|e| match e {
            SyncError::StorageUnavailable(_) => e,
            other => SyncError::StorageUnavailable(other.to_string()),
        })?;
        info!(deleted, "Status cache cleared");
        Ok(())
    }

    fn decode(&self, row: &StatusRow) -> Result<RefundStatus> {
        let plaintext = self.cipher.decrypt(&row.encrypted_status)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| SyncError::DecryptionFailed(format!("decode status: {}", e)))
    }
}
