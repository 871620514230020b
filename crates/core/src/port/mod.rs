// Port Layer - Interfaces for external dependencies

pub mod analytics;
pub mod cipher;
pub mod config_source;
pub mod payload;
pub mod prediction_api;
pub mod refund_api;
pub mod session;
pub mod status_store;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use analytics::{AnalyticsSnapshot, AnalyticsTracker, ApiCallMetrics, TracingAnalytics};
pub use cipher::StatusCipher;
pub use config_source::{ConfigSource, ReloadableConfigSource};
pub use payload::{
    AmountPayload, DelayFactorPayload, IssuePayload, PredictionPayload, StatusPayload,
};
pub use prediction_api::{ModelFeedback, PredictionApi};
pub use refund_api::{Credentials, RefundApi};
pub use session::{SessionProvider, StaticSession};
pub use status_store::{StatusRow, StatusRowStore};
pub use time_provider::{SystemTimeProvider, TimeProvider};
