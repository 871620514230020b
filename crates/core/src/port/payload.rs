// Remote Wire Payloads and their mapping into domain types

use crate::domain::{
    Amount, DelayFactor, DelayType, DomainError, ImpactLevel, IssueSeverity, Prediction,
    RefundIssue, RefundState, RefundStatus,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, DomainError>;

/// Amounts arrive either as decimal strings or as JSON numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountPayload {
    Text(String),
    Number(serde_json::Number),
}

impl TryFrom<AmountPayload> for Amount {
    type Error = DomainError;

    fn try_from(value: AmountPayload) -> Result<Self> {
        match value {
            AmountPayload::Text(text) => text.parse(),
            AmountPayload::Number(number) => number.to_string().parse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayFactorPayload {
    #[serde(rename = "type")]
    pub delay_type: String,
    pub impact: String,
    pub description: String,
}

impl TryFrom<DelayFactorPayload> for DelayFactor {
    type Error = DomainError;

    fn try_from(value: DelayFactorPayload) -> Result<Self> {
        Ok(DelayFactor {
            delay_type: DelayType::parse(&value.delay_type)?,
            impact: ImpactLevel::parse(&value.impact)?,
            description: value.description,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionPayload {
    pub estimated_days: i64,
    pub confidence: f64,
    /// Informational only. The domain date is recomputed from `estimated_days`.
    #[serde(default)]
    pub estimated_date: Option<String>,
    #[serde(default)]
    pub factors: Vec<DelayFactorPayload>,
}

impl PredictionPayload {
    /// Map into a domain prediction dated from `today`. Bounds are not checked here.
    pub fn into_prediction(self, today: NaiveDate) -> Result<Prediction> {
        let days = u32::try_from(self.estimated_days).map_err(|_| {
            DomainError::EstimatedDaysOutOfRange {
                days: self.estimated_days,
                min: 0,
                max: u32::MAX,
            }
        })?;
        let factors = self
            .factors
            .into_iter()
            .map(DelayFactor::try_from)
            .collect::<Result<Vec<_>>>()?;
        Prediction::new(days, self.confidence, today, factors)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuePayload {
    pub code: String,
    pub description: String,
    pub severity: String,
    #[serde(default)]
    pub resolution: Option<String>,
}

impl TryFrom<IssuePayload> for RefundIssue {
    type Error = DomainError;

    fn try_from(value: IssuePayload) -> Result<Self> {
        Ok(RefundIssue {
            code: value.code,
            description: value.description,
            severity: IssueSeverity::parse(&value.severity)?,
            resolution: value.resolution,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub amount: Option<AmountPayload>,
    /// `YYYY-MM-DD`
    pub filing_date: String,
    /// RFC 3339 instant
    pub last_updated: String,
    #[serde(default)]
    pub prediction: Option<PredictionPayload>,
    #[serde(default)]
    pub issues: Option<Vec<IssuePayload>>,
}

impl StatusPayload {
    pub fn into_status(self, today: NaiveDate) -> Result<RefundStatus> {
        let state = RefundState::parse(&self.status)?;
        let amount = self.amount.map(Amount::try_from).transpose()?;
        let filing_date = NaiveDate::parse_from_str(&self.filing_date, "%Y-%m-%d").map_err(|e| {
            DomainError::InvalidDate {
                value: self.filing_date.clone(),
                reason: e.to_string(),
            }
        })?;
        let last_updated = DateTime::parse_from_rfc3339(&self.last_updated)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| DomainError::InvalidDate {
                value: self.last_updated.clone(),
                reason: e.to_string(),
            })?;
        let prediction = self
            .prediction
            .map(|p| p.into_prediction(today))
            .transpose()?;
        let issues = self
            .issues
            .unwrap_or_default()
            .into_iter()
            .map(RefundIssue::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(RefundStatus {
            id: self.id,
            state,
            amount,
            filing_date,
            last_updated,
            prediction,
            issues,
            is_stale: false,
        })
    }
}
