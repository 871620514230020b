// sqlx::Error -> SyncError mapping

use refund_sync_core::SyncError;

/// Every persistence failure surfaces as `StorageUnavailable`, with the
/// SQLite result code kept in the message.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> SyncError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            // SQLite result codes: https://www.sqlite.org/rescode.html
            Some(code) => match code.as_ref() {
                "5" => SyncError::StorageUnavailable(format!(
                    "Database locked (SQLITE_BUSY): {}",
                    db_err.message()
                )),
                "13" => SyncError::StorageUnavailable(format!(
                    "Database full: {}",
                    db_err.message()
                )),
                "8" => SyncError::StorageUnavailable(format!(
                    "Database is read-only: {}",
                    db_err.message()
                )),
                other => SyncError::StorageUnavailable(format!(
                    "Database error [{}]: {}",
                    other,
                    db_err.message()
                )),
            },
            None => SyncError::StorageUnavailable(format!("Database error: {}", db_err.message())),
        },
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            SyncError::StorageUnavailable(format!("Connection pool unavailable: {}", err))
        }
        sqlx::Error::ColumnNotFound(col) => {
            SyncError::StorageUnavailable(format!("Column not found: {}", col))
        }
        _ => SyncError::StorageUnavailable(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_storage_unavailable() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolClosed),
            SyncError::StorageUnavailable(msg) if msg.contains("pool")
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            SyncError::StorageUnavailable(_)
        ));
    }
}
