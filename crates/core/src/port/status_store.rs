// Status Row Store Port (Interface)

use crate::domain::RefundId;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One persisted status row. The payload is opaque ciphertext.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRow {
    pub refund_id: RefundId,
    pub encrypted_status: Vec<u8>,
    pub cached_at: DateTime<Utc>,
    pub is_valid: bool,
}

/// Keyed row store for encrypted status blobs.
///
/// Every write is durable before the call returns.
#[async_trait]
pub trait StatusRowStore: Send + Sync {
    async fn get(&self, refund_id: &str) -> Result<Option<StatusRow>>;

    /// Insert or overwrite the row for `row.refund_id`
    async fn upsert(&self, row: &StatusRow) -> Result<()>;

    /// Set `is_valid = false`. Returns whether a row existed.
    async fn invalidate(&self, refund_id: &str) -> Result<bool>;

    /// Hard delete of every row
    async fn delete_all(&self) -> Result<u64>;
}

pub mod mocks {
    use super::*;
    use crate::error::SyncError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory store with a switch that makes every call fail
    #[derive(Default)]
    pub struct InMemoryStatusStore {
        rows: Mutex<HashMap<RefundId, StatusRow>>,
        failing: AtomicBool,
    }

    impl InMemoryStatusStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn len(&self) -> usize {
            self.rows.lock().unwrap().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        /// Direct access for tests that need to age or corrupt a row
        pub fn row(&self, refund_id: &str) -> Option<StatusRow> {
            self.rows.lock().unwrap().get(refund_id).cloned()
        }

        pub fn put_row(&self, row: StatusRow) {
            self.rows
                .lock()
                .unwrap()
                .insert(row.refund_id.clone(), row);
        }

        fn check(&self) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(SyncError::StorageUnavailable(
                    "in-memory store switched off".to_string(),
                ));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl StatusRowStore for InMemoryStatusStore {
        async fn get(&self, refund_id: &str) -> Result<Option<StatusRow>> {
            self.check()?;
            Ok(self.row(refund_id))
        }

        async fn upsert(&self, row: &StatusRow) -> Result<()> {
            self.check()?;
            self.put_row(row.clone());
            Ok(())
        }

        async fn invalidate(&self, refund_id: &str) -> Result<bool> {
            self.check()?;
            let mut rows = self.rows.lock().unwrap();
            match rows.get_mut(refund_id) {
                Some(row) => {
                    row.is_valid = false;
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn delete_all(&self) -> Result<u64> {
            self.check()?;
            let mut rows = self.rows.lock().unwrap();
            let count = rows.len() as u64;
            rows.clear();
            Ok(count)
        }
    }
}
