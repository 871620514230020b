//! Engine configuration snapshots.
//!
//! Both configs are plain immutable values. A [`crate::port::ConfigSource`]
//! hands out `Arc` snapshots; an operation reads one snapshot at its start
//! and never observes a reload mid-flight.

use crate::domain::{PredictionBounds, RefundState};
use crate::error::{Result, SyncError};
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Calendar day without a year (season boundaries recur yearly)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonDay {
    pub month: u32,
    pub day: u32,
}

impl SeasonDay {
    pub const fn new(month: u32, day: u32) -> Self {
        Self { month, day }
    }

    fn ordinal(&self) -> (u32, u32) {
        (self.month, self.day)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessHours {
    /// Inclusive, local hour 0-23
    pub start_hour: u32,
    /// Exclusive, local hour 1-24
    pub end_hour: u32,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 17,
        }
    }
}

impl BusinessHours {
    pub fn contains(&self, time: NaiveTime) -> bool {
        let hour = time.hour();
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            // Overnight window, e.g. 22 -> 6
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxSeasonConfig {
    pub season_start: SeasonDay,
    pub season_end: SeasonDay,
    pub business_hours: BusinessHours,
    /// Requests per minute at or above which in-hours traffic counts as high
    pub high_traffic_threshold: u64,
}

impl Default for TaxSeasonConfig {
    fn default() -> Self {
        Self {
            season_start: SeasonDay::new(1, 1),
            season_end: SeasonDay::new(4, 30),
            business_hours: BusinessHours::default(),
            high_traffic_threshold: 500,
        }
    }
}

impl TaxSeasonConfig {
    /// Inclusive on both ends; windows may wrap the year end.
    pub fn in_season(&self, date: NaiveDate) -> bool {
        let today = (date.month(), date.day());
        let start = self.season_start.ordinal();
        let end = self.season_end.ordinal();
        if start <= end {
            today >= start && today <= end
        } else {
            today >= start || today <= end
        }
    }
}

/// Background refresh cadence per traffic pattern, in minutes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshIntervals {
    pub peak_high_traffic_minutes: u64,
    pub peak_normal_traffic_minutes: u64,
    pub peak_off_hours_minutes: u64,
    pub off_peak_minutes: u64,
}

impl Default for RefreshIntervals {
    fn default() -> Self {
        Self {
            peak_high_traffic_minutes: 15,
            peak_normal_traffic_minutes: 30,
            peak_off_hours_minutes: 120,
            off_peak_minutes: 240,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicyConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CachePolicy {
    /// TTL for refunds still moving (Processing, Delayed)
    pub standard_ttl_minutes: u64,
    /// TTL for terminal refunds (Available, Error)
    pub extended_ttl_minutes: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            standard_ttl_minutes: 15,
            extended_ttl_minutes: 240,
        }
    }
}

impl CachePolicy {
    pub fn ttl_for(&self, state: RefundState) -> Duration {
        let minutes = if state.is_terminal() {
            self.extended_ttl_minutes
        } else {
            self.standard_ttl_minutes
        };
        Duration::from_secs(minutes.saturating_mul(60))
    }
}

/// Backoff applied by a background job after a transient failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobBackoffConfig {
    pub initial_delay_minutes: u64,
    pub multiplier: f64,
    /// Upper bound for a single backoff delay
    pub max_delay_minutes: u64,
    /// Consecutive transient failures tolerated before reverting to the regular interval
    pub max_retries: u32,
}

impl Default for JobBackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_minutes: 10,
            multiplier: 2.0,
            max_delay_minutes: 240,
            max_retries: 3,
        }
    }
}

impl JobBackoffConfig {
    /// Delay after the `failures`-th consecutive transient failure (1-based),
    /// capped at `max_delay_minutes`. Never panics, whatever the config.
    pub fn delay_for(&self, failures: u32) -> Duration {
        let max = Duration::from_secs(self.max_delay_minutes.saturating_mul(60));
        let base = Duration::from_secs(self.initial_delay_minutes.saturating_mul(60));
        let factor = if self.multiplier.is_finite() {
            self.multiplier.max(1.0)
        } else {
            1.0
        }
        .powi(failures.saturating_sub(1).min(i32::MAX as u32) as i32);

        Duration::try_from_secs_f64(base.as_secs_f64() * factor)
            .unwrap_or(max)
            .min(max)
    }
}

/// Token bucket guarding user-initiated refreshes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualRefreshConfig {
    pub burst: u32,
    pub refill_per_minute: u32,
}

impl Default for ManualRefreshConfig {
    fn default() -> Self {
        Self {
            burst: 3,
            refill_per_minute: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub tax_season: TaxSeasonConfig,
    pub refresh_intervals: RefreshIntervals,
    pub retry_policy: RetryPolicyConfig,
    pub cache_policy: CachePolicy,
    pub job_backoff: JobBackoffConfig,
    pub manual_refresh: ManualRefreshConfig,
}

impl RefreshConfig {
    /// Reject snapshots the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let season = &self.tax_season;
        for (name, day) in [("season_start", season.season_start), ("season_end", season.season_end)] {
            if NaiveDate::from_ymd_opt(2024, day.month, day.day).is_none() {
                return Err(SyncError::Config(format!(
                    "tax_season.{} {}/{} is not a calendar day",
                    name, day.month, day.day
                )));
            }
        }
        let hours = &season.business_hours;
        if hours.start_hour > 23 || hours.end_hour > 24 {
            return Err(SyncError::Config(format!(
                "business_hours {}..{} outside 0..24",
                hours.start_hour, hours.end_hour
            )));
        }

        let intervals = &self.refresh_intervals;
        if [
            intervals.peak_high_traffic_minutes,
            intervals.peak_normal_traffic_minutes,
            intervals.peak_off_hours_minutes,
            intervals.off_peak_minutes,
        ]
        .contains(&0)
        {
            return Err(SyncError::Config("refresh intervals must be positive".into()));
        }

        let retry = &self.retry_policy;
        if retry.max_attempts == 0 {
            return Err(SyncError::Config("retry_policy.max_attempts must be at least 1".into()));
        }
        for (name, multiplier) in [
            ("retry_policy", retry.multiplier),
            ("job_backoff", self.job_backoff.multiplier),
        ] {
            if !multiplier.is_finite() || !(1.0..=10.0).contains(&multiplier) {
                return Err(SyncError::Config(format!(
                    "{}.multiplier {} outside [1, 10]",
                    name, multiplier
                )));
            }
        }
        if self.job_backoff.initial_delay_minutes > self.job_backoff.max_delay_minutes {
            return Err(SyncError::Config(format!(
                "job_backoff.initial_delay_minutes {} exceeds max_delay_minutes {}",
                self.job_backoff.initial_delay_minutes, self.job_backoff.max_delay_minutes
            )));
        }
        if self.manual_refresh.burst == 0 {
            return Err(SyncError::Config("manual_refresh.burst must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub min_processing_days: u32,
    pub default_processing_days: u32,
    pub max_processing_days: u32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            min_processing_days: 1,
            default_processing_days: 21,
            max_processing_days: 45,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub minimum: f64,
    pub fallback: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            minimum: 0.4,
            fallback: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub processing: ProcessingConfig,
    pub confidence: ConfidenceConfig,
}

impl PredictionConfig {
    pub fn bounds(&self) -> PredictionBounds {
        PredictionBounds {
            min_days: self.processing.min_processing_days,
            max_days: self.processing.max_processing_days,
            minimum_confidence: self.confidence.minimum,
        }
    }

    /// Check that a fallback prediction can be built from this config.
    pub fn validate(&self) -> Result<()> {
        let p = &self.processing;
        if p.min_processing_days > p.max_processing_days {
            return Err(SyncError::Config(format!(
                "min_processing_days {} exceeds max_processing_days {}",
                p.min_processing_days, p.max_processing_days
            )));
        }
        if p.default_processing_days == 0
            || p.default_processing_days < p.min_processing_days
            || p.default_processing_days > p.max_processing_days
        {
            return Err(SyncError::Config(format!(
                "default_processing_days {} outside [{}..{}]",
                p.default_processing_days, p.min_processing_days, p.max_processing_days
            )));
        }
        for (name, value) in [
            ("minimum", self.confidence.minimum),
            ("fallback", self.confidence.fallback),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SyncError::Config(format!(
                    "confidence.{} {} outside [0, 1]",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    #[test]
    fn test_default_season_is_inclusive() {
        let season = TaxSeasonConfig::default();
        assert!(season.in_season(date(1, 1)));
        assert!(season.in_season(date(4, 30)));
        assert!(!season.in_season(date(5, 1)));
        assert!(!season.in_season(date(12, 31)));
    }

    #[test]
    fn test_season_wrapping_year_end() {
        let season = TaxSeasonConfig {
            season_start: SeasonDay::new(11, 15),
            season_end: SeasonDay::new(2, 15),
            ..Default::default()
        };
        assert!(season.in_season(date(12, 24)));
        assert!(season.in_season(date(1, 10)));
        assert!(!season.in_season(date(3, 1)));
    }

    #[test]
    fn test_business_hours_end_is_exclusive() {
        let hours = BusinessHours::default();
        assert!(hours.contains(NaiveTime::from_hms_opt(9, 0, 0).unwrap()));
        assert!(hours.contains(NaiveTime::from_hms_opt(16, 59, 59).unwrap()));
        assert!(!hours.contains(NaiveTime::from_hms_opt(17, 0, 0).unwrap()));
        assert!(!hours.contains(NaiveTime::from_hms_opt(3, 0, 0).unwrap()));
    }

    #[test]
    fn test_ttl_depends_on_state() {
        let policy = CachePolicy::default();
        assert_eq!(
            policy.ttl_for(RefundState::Processing),
            Duration::from_secs(15 * 60)
        );
        assert_eq!(
            policy.ttl_for(RefundState::Available),
            Duration::from_secs(240 * 60)
        );
    }

    #[test]
    fn test_job_backoff_grows_exponentially() {
        let backoff = JobBackoffConfig::default();
        assert_eq!(backoff.delay_for(1), Duration::from_secs(600));
        assert_eq!(backoff.delay_for(2), Duration::from_secs(1200));
        assert_eq!(backoff.delay_for(3), Duration::from_secs(2400));
    }

    #[test]
    fn test_job_backoff_is_capped() {
        let backoff = JobBackoffConfig::default();
        assert_eq!(backoff.delay_for(10), Duration::from_secs(240 * 60));
    }

    #[test]
    fn test_job_backoff_survives_absurd_multiplier() {
        let backoff = JobBackoffConfig {
            initial_delay_minutes: 10,
            multiplier: 1e300,
            max_delay_minutes: 60,
            max_retries: 3,
        };
        assert_eq!(backoff.delay_for(2), Duration::from_secs(3600));
        assert_eq!(backoff.delay_for(u32::MAX), Duration::from_secs(3600));

        let nan = JobBackoffConfig {
            multiplier: f64::NAN,
            initial_delay_minutes: u64::MAX,
            ..backoff
        };
        assert_eq!(nan.delay_for(3), Duration::from_secs(3600));
    }

    #[test]
    fn test_refresh_config_validation() {
        assert!(RefreshConfig::default().validate().is_ok());

        let mut huge_multiplier = RefreshConfig::default();
        huge_multiplier.job_backoff.multiplier = 1e300;
        assert!(matches!(huge_multiplier.validate(), Err(SyncError::Config(_))));

        let mut zero_interval = RefreshConfig::default();
        zero_interval.refresh_intervals.off_peak_minutes = 0;
        assert!(zero_interval.validate().is_err());

        let mut bad_day = RefreshConfig::default();
        bad_day.tax_season.season_end = SeasonDay::new(2, 30);
        assert!(bad_day.validate().is_err());

        let mut no_attempts = RefreshConfig::default();
        no_attempts.retry_policy.max_attempts = 0;
        assert!(no_attempts.validate().is_err());
    }

    #[test]
    fn test_prediction_config_validation() {
        assert!(PredictionConfig::default().validate().is_ok());

        let mut bad = PredictionConfig::default();
        bad.processing.default_processing_days = 90;
        assert!(matches!(bad.validate(), Err(SyncError::Config(_))));

        let mut bad_confidence = PredictionConfig::default();
        bad_confidence.confidence.fallback = 1.2;
        assert!(bad_confidence.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: RefreshConfig =
            serde_json::from_str(r#"{"cache_policy": {"standard_ttl_minutes": 5}}"#).unwrap();
        assert_eq!(cfg.cache_policy.standard_ttl_minutes, 5);
        assert_eq!(cfg.cache_policy.extended_ttl_minutes, 240);
        assert_eq!(cfg.refresh_intervals, RefreshIntervals::default());
    }
}
