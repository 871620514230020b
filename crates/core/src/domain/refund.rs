// Refund Status Domain Model

use super::amount::Amount;
use super::error::{DomainError, Result};
use super::prediction::Prediction;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Refund identifier (as issued by the remote status endpoint)
pub type RefundId = String;

/// Processing state of a refund
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundState {
    Processing,
    Delayed,
    Available,
    Error,
}

impl RefundState {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_uppercase().as_str() {
            "PROCESSING" => Ok(RefundState::Processing),
            "DELAYED" => Ok(RefundState::Delayed),
            "AVAILABLE" => Ok(RefundState::Available),
            "ERROR" => Ok(RefundState::Error),
            _ => Err(DomainError::UnknownState(value.to_string())),
        }
    }

    /// No further status changes are expected
    pub fn is_terminal(&self) -> bool {
        match self {
            RefundState::Available | RefundState::Error => true,
            RefundState::Processing | RefundState::Delayed => false,
        }
    }
}

impl std::fmt::Display for RefundState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefundState::Processing => write!(f, "PROCESSING"),
            RefundState::Delayed => write!(f, "DELAYED"),
            RefundState::Available => write!(f, "AVAILABLE"),
            RefundState::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueSeverity {
    Info,
    Warning,
    Error,
}

impl IssueSeverity {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_uppercase().as_str() {
            "INFO" => Ok(IssueSeverity::Info),
            "WARNING" => Ok(IssueSeverity::Warning),
            "ERROR" => Ok(IssueSeverity::Error),
            _ => Err(DomainError::UnknownVariant {
                kind: "issue severity",
                value: value.to_string(),
            }),
        }
    }
}

/// A problem reported against the refund
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundIssue {
    pub code: String,
    pub description: String,
    pub severity: IssueSeverity,
    pub resolution: Option<String>,
}

/// Refund status as last observed from the remote endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundStatus {
    pub id: RefundId,
    pub state: RefundState,
    pub amount: Option<Amount>,
    pub filing_date: NaiveDate,
    pub last_updated: DateTime<Utc>,
    pub prediction: Option<Prediction>,
    #[serde(default)]
    pub issues: Vec<RefundIssue>,

    /// Set on values served from cache past their TTL or as an error fallback.
    /// Never persisted as true.
    #[serde(default, skip_serializing)]
    pub is_stale: bool,
}

impl RefundStatus {
    pub fn needs_prediction(&self) -> bool {
        self.state == RefundState::Processing && self.prediction.is_none()
    }

    pub fn into_stale(mut self) -> Self {
        self.is_stale = true;
        self
    }
}
