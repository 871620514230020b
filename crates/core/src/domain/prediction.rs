// Prediction Domain Model

use super::error::{DomainError, Result};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Category of a factor delaying processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DelayType {
    VerificationNeeded,
    HighVolume,
    SystemDelay,
    AdditionalReview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

impl DelayType {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_uppercase().as_str() {
            "VERIFICATION_NEEDED" => Ok(DelayType::VerificationNeeded),
            "HIGH_VOLUME" => Ok(DelayType::HighVolume),
            "SYSTEM_DELAY" => Ok(DelayType::SystemDelay),
            "ADDITIONAL_REVIEW" => Ok(DelayType::AdditionalReview),
            _ => Err(DomainError::UnknownVariant {
                kind: "delay type",
                value: value.to_string(),
            }),
        }
    }
}

impl ImpactLevel {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_uppercase().as_str() {
            "LOW" => Ok(ImpactLevel::Low),
            "MEDIUM" => Ok(ImpactLevel::Medium),
            "HIGH" => Ok(ImpactLevel::High),
            _ => Err(DomainError::UnknownVariant {
                kind: "impact level",
                value: value.to_string(),
            }),
        }
    }
}

/// A single factor explaining the estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayFactor {
    pub delay_type: DelayType,
    pub impact: ImpactLevel,
    pub description: String,
}

/// Acceptance bounds a model prediction must satisfy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionBounds {
    pub min_days: u32,
    pub max_days: u32,
    pub minimum_confidence: f64,
}

/// Estimated processing time for a refund
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub estimated_days: u32,
    /// 0.0 to 1.0
    pub confidence: f64,
    /// Always `today + estimated_days`
    pub estimated_date: NaiveDate,
    pub factors: Vec<DelayFactor>,
}

const FALLBACK_DESCRIPTION: &str = "Using standard estimate";

impl Prediction {
    /// Build a prediction dated from `today`.
    pub fn new(
        estimated_days: u32,
        confidence: f64,
        today: NaiveDate,
        factors: Vec<DelayFactor>,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&confidence) || confidence.is_nan() {
            return Err(DomainError::ConfidenceOutOfRange(confidence));
        }
        let estimated_date = today
            .checked_add_days(Days::new(estimated_days as u64))
            .ok_or_else(|| DomainError::InvalidDate {
                value: format!("{} + {} days", today, estimated_days),
                reason: "date overflow".to_string(),
            })?;

        Ok(Self {
            estimated_days,
            confidence,
            estimated_date,
            factors,
        })
    }

    /// Locally synthesized estimate, tagged with a single SystemDelay/Low factor.
    pub fn fallback(default_days: u32, confidence: f64, today: NaiveDate) -> Result<Self> {
        Self::new(
            default_days,
            confidence,
            today,
            vec![DelayFactor {
                delay_type: DelayType::SystemDelay,
                impact: ImpactLevel::Low,
                description: FALLBACK_DESCRIPTION.to_string(),
            }],
        )
    }

    /// True for estimates produced by [`Prediction::fallback`].
    pub fn is_fallback(&self) -> bool {
        matches!(
            self.factors.as_slice(),
            [DelayFactor {
                delay_type: DelayType::SystemDelay,
                impact: ImpactLevel::Low,
                description,
            }] if description == FALLBACK_DESCRIPTION
        )
    }

    /// Reject predictions outside the configured bounds. Never clamps.
    pub fn validate(&self, bounds: &PredictionBounds) -> Result<()> {
        check_days(self.estimated_days as i64, bounds)?;
        if self.confidence < bounds.minimum_confidence {
            return Err(DomainError::ConfidenceBelowMinimum {
                confidence: self.confidence,
                minimum: bounds.minimum_confidence,
            });
        }
        Ok(())
    }

    /// `1 - |predicted - actual| / predicted`; `None` when nothing was predicted.
    pub fn accuracy_against(&self, actual_days: u32) -> Option<f64> {
        if self.estimated_days == 0 {
            return None;
        }
        let predicted = self.estimated_days as f64;
        let diff = (self.estimated_days as f64 - actual_days as f64).abs();
        Some(1.0 - diff / predicted)
    }
}

pub(crate) fn check_days(days: i64, bounds: &PredictionBounds) -> Result<()> {
    if days < bounds.min_days as i64 || days > bounds.max_days as i64 {
        return Err(DomainError::EstimatedDaysOutOfRange {
            days,
            min: bounds.min_days,
            max: bounds.max_days,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> PredictionBounds {
        PredictionBounds {
            min_days: 1,
            max_days: 45,
            minimum_confidence: 0.4,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 10).unwrap()
    }

    #[test]
    fn test_estimated_date_is_today_plus_days() {
        let p = Prediction::new(21, 0.8, today(), vec![]).unwrap();
        assert_eq!(p.estimated_date, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
    }

    #[test]
    fn test_validate_rejects_days_out_of_range() {
        let p = Prediction::new(60, 0.9, today(), vec![]).unwrap();
        let err = p.validate(&bounds()).unwrap_err();
        assert_eq!(
            err,
            DomainError::EstimatedDaysOutOfRange {
                days: 60,
                min: 1,
                max: 45
            }
        );
    }

    #[test]
    fn test_validate_rejects_low_confidence() {
        let p = Prediction::new(10, 0.2, today(), vec![]).unwrap();
        assert!(matches!(
            p.validate(&bounds()),
            Err(DomainError::ConfidenceBelowMinimum { .. })
        ));
    }

    #[test]
    fn test_confidence_must_be_probability() {
        assert!(Prediction::new(10, 1.5, today(), vec![]).is_err());
        assert!(Prediction::new(10, f64::NAN, today(), vec![]).is_err());
    }

    #[test]
    fn test_fallback_is_tagged() {
        let fallback = Prediction::fallback(21, 0.6, today()).unwrap();
        assert!(fallback.is_fallback());
        assert_eq!(fallback.factors.len(), 1);

        let model = Prediction::new(21, 0.6, today(), vec![]).unwrap();
        assert!(!model.is_fallback());
    }

    #[test]
    fn test_accuracy() {
        let p = Prediction::new(15, 0.8, today(), vec![]).unwrap();
        assert_eq!(p.accuracy_against(15), Some(1.0));
        let far = p.accuracy_against(40).unwrap();
        assert!(far < 0.0);

        let zero = Prediction::new(0, 0.8, today(), vec![]).unwrap();
        assert_eq!(zero.accuracy_against(3), None);
    }
}
