// Analytics Port - outbound call and background refresh tracking

use crate::error::SyncError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Calls taking longer than this are reported as slow
pub const SLOW_CALL_THRESHOLD: Duration = Duration::from_secs(3);

/// One outbound HTTP exchange
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCallMetrics {
    /// Also sent to the server as the `Request-ID` header
    pub request_id: Uuid,
    pub method: String,
    pub url: String,
    /// `None` when no response arrived
    pub status_code: Option<u16>,
    pub duration: Duration,
    pub error_message: Option<String>,
}

impl ApiCallMetrics {
    pub fn is_error(&self) -> bool {
        self.error_message.is_some()
    }

    pub fn is_slow(&self) -> bool {
        self.duration > SLOW_CALL_THRESHOLD
    }
}

/// Receives usage events from the HTTP adapters and the refresh scheduler
pub trait AnalyticsTracker: Send + Sync {
    fn track_api_call(&self, metrics: &ApiCallMetrics);

    /// A background refresh job completed a fetch
    fn track_refresh_success(&self, refund_id: &str);

    /// A background refresh job failed its fetch
    fn track_refresh_error(&self, refund_id: &str, error: &SyncError);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalyticsSnapshot {
    pub api_calls: u64,
    pub api_errors: u64,
    pub slow_calls: u64,
    pub refresh_successes: u64,
    pub refresh_errors: u64,
}

/// Structured log events plus running totals (production)
#[derive(Debug, Default)]
pub struct TracingAnalytics {
    api_calls: AtomicU64,
    api_errors: AtomicU64,
    slow_calls: AtomicU64,
    refresh_successes: AtomicU64,
    refresh_errors: AtomicU64,
}

impl TracingAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> AnalyticsSnapshot {
        AnalyticsSnapshot {
            api_calls: self.api_calls.load(Ordering::Relaxed),
            api_errors: self.api_errors.load(Ordering::Relaxed),
            slow_calls: self.slow_calls.load(Ordering::Relaxed),
            refresh_successes: self.refresh_successes.load(Ordering::Relaxed),
            refresh_errors: self.refresh_errors.load(Ordering::Relaxed),
        }
    }
}

impl AnalyticsTracker for TracingAnalytics {
    fn track_api_call(&self, metrics: &ApiCallMetrics) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
        if metrics.is_error() {
            self.api_errors.fetch_add(1, Ordering::Relaxed);
        }
        if metrics.is_slow() {
            self.slow_calls.fetch_add(1, Ordering::Relaxed);
            warn!(
                request_id = %metrics.request_id,
                url = %metrics.url,
                duration_ms = metrics.duration.as_millis() as u64,
                "Slow API call"
            );
        }
        debug!(
            request_id = %metrics.request_id,
            method = %metrics.method,
            url = %metrics.url,
            status = ?metrics.status_code,
            duration_ms = metrics.duration.as_millis() as u64,
            error = ?metrics.error_message,
            "API call"
        );
    }

    fn track_refresh_success(&self, refund_id: &str) {
        self.refresh_successes.fetch_add(1, Ordering::Relaxed);
        debug!(refund_id = %refund_id, "Refresh succeeded");
    }

    fn track_refresh_error(&self, refund_id: &str, error: &SyncError) {
        self.refresh_errors.fetch_add(1, Ordering::Relaxed);
        debug!(refund_id = %refund_id, error = %error, "Refresh failed");
    }
}

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every event for inspection
    #[derive(Default)]
    pub struct RecordingAnalytics {
        api_calls: Mutex<Vec<ApiCallMetrics>>,
        refreshes: Mutex<Vec<(String, Option<SyncError>)>>,
    }

    impl RecordingAnalytics {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn api_calls(&self) -> Vec<ApiCallMetrics> {
            self.api_calls.lock().unwrap().clone()
        }

        /// `(refund_id, error)` per refresh, `None` on success
        pub fn refreshes(&self) -> Vec<(String, Option<SyncError>)> {
            self.refreshes.lock().unwrap().clone()
        }
    }

    impl AnalyticsTracker for RecordingAnalytics {
        fn track_api_call(&self, metrics: &ApiCallMetrics) {
            self.api_calls.lock().unwrap().push(metrics.clone());
        }

        fn track_refresh_success(&self, refund_id: &str) {
            self.refreshes
                .lock()
                .unwrap()
                .push((refund_id.to_string(), None));
        }

        fn track_refresh_error(&self, refund_id: &str, error: &SyncError) {
            self.refreshes
                .lock()
                .unwrap()
                .push((refund_id.to_string(), Some(error.clone())));
        }
    }
}
