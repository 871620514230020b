// Domain Layer - Pure business logic and entities

pub mod amount;
pub mod error;
pub mod prediction;
pub mod refund;

// Re-exports
pub use amount::Amount;
pub use error::DomainError;
pub use prediction::{DelayFactor, DelayType, ImpactLevel, Prediction, PredictionBounds};
pub use refund::{IssueSeverity, RefundId, RefundIssue, RefundState, RefundStatus};
