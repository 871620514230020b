// Refund Sync Infrastructure - SQLite Adapter
// Implements: StatusRowStore

mod connection;
mod error;
mod migration;
mod status_store;

pub use connection::create_pool;
pub use migration::run_migrations;
pub use status_store::SqliteStatusStore;

// Note: sqlx::Error conversion is handled by a helper function (error.rs)
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for SyncError here)
