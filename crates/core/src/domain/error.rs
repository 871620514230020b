// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Estimated days {days} outside valid range [{min}..{max}]")]
    EstimatedDaysOutOfRange { days: i64, min: u32, max: u32 },

    #[error("Confidence {confidence} below minimum threshold {minimum}")]
    ConfidenceBelowMinimum { confidence: f64, minimum: f64 },

    #[error("Confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),

    #[error("Unknown refund state: {0}")]
    UnknownState(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid date '{value}': {reason}")]
    InvalidDate { value: String, reason: String },

    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    /// Remote body did not match the expected payload shape
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
