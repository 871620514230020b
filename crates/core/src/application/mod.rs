// Application Layer - Use Cases and Business Logic

pub mod orchestrator;
pub mod prediction_cache;
pub mod prediction_service;
pub mod rate_limiter;
pub mod retry;
pub mod scheduler;
pub mod status_cache;
pub mod traffic;

// Re-exports
pub use orchestrator::{SyncDependencies, SyncOrchestrator};
pub use prediction_cache::{CachedPrediction, PredictionCache};
pub use prediction_service::PredictionService;
pub use rate_limiter::RefreshGate;
pub use retry::{RetryExecutor, RetryPolicy};
pub use scheduler::{RefreshScheduler, RefreshTask, SchedulerStats};
pub use status_cache::{CachedStatus, StatusCache};
pub use traffic::{RequestRateCounter, TrafficClassifier, TrafficPattern};
