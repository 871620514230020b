// Central Error Type for the sync engine

use std::time::Duration;
use thiserror::Error;

/// Closed error taxonomy surfaced by the sync engine.
///
/// Transport exceptions never leave the adapters raw: every failure is one
/// of these kinds so callers can branch on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// No connectivity, timeout or transport failure (retryable)
    #[error("Network error: {0}")]
    Network(String),

    /// Remote asked us to slow down (429), or the local refresh gate denied the call
    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimit { retry_after: Option<Duration> },

    /// 5xx-class remote failure (retryable)
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// 4xx-class remote failure other than rate limiting
    #[error("Client error {status}: {message}")]
    Client { status: u16, message: String },

    #[error("Validation error: {0}")]
    Validation(#[from] crate::domain::DomainError),

    /// Cached payload could not be decrypted or decoded
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Retryable kinds: network/transport failures and 5xx responses.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Network(_) | SyncError::Server { .. } => true,
            SyncError::RateLimit { .. }
            | SyncError::Client { .. }
            | SyncError::Validation(_)
            | SyncError::DecryptionFailed(_)
            | SyncError::StorageUnavailable(_)
            | SyncError::Config(_) => false,
        }
    }

    /// Kinds that a background job may back off from and try again later.
    pub fn is_transient(&self) -> bool {
        self.is_retryable() || matches!(self, SyncError::RateLimit { .. })
    }

    /// Kinds for which a refresh falls back to the last persisted value.
    pub fn allows_cached_fallback(&self) -> bool {
        matches!(self, SyncError::Network(_) | SyncError::RateLimit { .. })
    }
}

/// Result type alias using SyncError
pub type Result<T> = std::result::Result<T, SyncError>;
