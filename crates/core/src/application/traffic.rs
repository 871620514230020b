// Traffic pattern model: season x time-of-day x live request rate

use crate::config::{RefreshIntervals, TaxSeasonConfig};
use crate::port::TimeProvider;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Coarse classification of current demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrafficPattern {
    PeakHighTraffic,
    PeakNormalTraffic,
    PeakOffHours,
    OffPeak,
}

impl TrafficPattern {
    /// Decision table over the three signals.
    ///
    /// Business hours and request rate only matter inside the season; an
    /// off-hours day inside the season is never off-peak.
    pub fn classify(in_season: bool, in_business_hours: bool, high_traffic: bool) -> Self {
        match (in_season, in_business_hours, high_traffic) {
            (true, true, true) => TrafficPattern::PeakHighTraffic,
            (true, true, false) => TrafficPattern::PeakNormalTraffic,
            (true, false, _) => TrafficPattern::PeakOffHours,
            (false, _, _) => TrafficPattern::OffPeak,
        }
    }

    pub fn refresh_interval(&self, intervals: &RefreshIntervals) -> Duration {
        let minutes = match self {
            TrafficPattern::PeakHighTraffic => intervals.peak_high_traffic_minutes,
            TrafficPattern::PeakNormalTraffic => intervals.peak_normal_traffic_minutes,
            TrafficPattern::PeakOffHours => intervals.peak_off_hours_minutes,
            TrafficPattern::OffPeak => intervals.off_peak_minutes,
        };
        Duration::from_secs(minutes.max(1).saturating_mul(60))
    }
}

impl std::fmt::Display for TrafficPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrafficPattern::PeakHighTraffic => write!(f, "peak_high_traffic"),
            TrafficPattern::PeakNormalTraffic => write!(f, "peak_normal_traffic"),
            TrafficPattern::PeakOffHours => write!(f, "peak_off_hours"),
            TrafficPattern::OffPeak => write!(f, "off_peak"),
        }
    }
}

const WINDOW_SECS: u64 = 60;

/// Sliding one-minute request counter.
///
/// Sixty one-second buckets. Each bucket packs its epoch second (upper 32
/// bits) with its count (lower 32 bits), so a bucket left over from an
/// earlier minute is recognised and reset on the next write.
pub struct RequestRateCounter {
    buckets: [AtomicU64; WINDOW_SECS as usize],
}

impl Default for RequestRateCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestRateCounter {
    pub fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    pub fn record(&self, epoch_secs: u64) {
        let bucket = &self.buckets[(epoch_secs % WINDOW_SECS) as usize];
        let second = epoch_secs & 0xFFFF_FFFF;

        loop {
            let packed = bucket.load(Ordering::Acquire);
            let next = if packed >> 32 == second {
                packed.saturating_add(1)
            } else {
                (second << 32) | 1
            };
            if bucket
                .compare_exchange(packed, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
        }
    }

    /// Requests recorded in the 60 seconds ending at `epoch_secs`
    pub fn count_last_minute(&self, epoch_secs: u64) -> u64 {
        let now = epoch_secs & 0xFFFF_FFFF;
        self.buckets
            .iter()
            .map(|bucket| bucket.load(Ordering::Acquire))
            .filter(|packed| {
                let second = packed >> 32;
                second <= now && now - second < WINDOW_SECS
            })
            .map(|packed| packed & 0xFFFF_FFFF)
            .sum()
    }
}

/// Derives the current [`TrafficPattern`] from the clock and the request counter
pub struct TrafficClassifier {
    counter: Arc<RequestRateCounter>,
    time_provider: Arc<dyn TimeProvider>,
}

impl TrafficClassifier {
    pub fn new(counter: Arc<RequestRateCounter>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            counter,
            time_provider,
        }
    }

    /// Count one outbound remote request
    pub fn record_request(&self) {
        self.counter.record(self.epoch_secs());
    }

    pub fn requests_last_minute(&self) -> u64 {
        self.counter.count_last_minute(self.epoch_secs())
    }

    pub fn is_high_traffic(&self, season: &TaxSeasonConfig) -> bool {
        self.requests_last_minute() >= season.high_traffic_threshold
    }

    pub fn current_pattern(&self, season: &TaxSeasonConfig) -> TrafficPattern {
        let local = self.time_provider.local_now();
        let in_season = season.in_season(local.date());
        let in_hours = season.business_hours.contains(local.time());
        let high = in_season && in_hours && self.is_high_traffic(season);
        TrafficPattern::classify(in_season, in_hours, high)
    }

    fn epoch_secs(&self) -> u64 {
        self.time_provider.now().timestamp().max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::time_provider::mocks::FixedTimeProvider;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_decision_table_is_exhaustive() {
        use TrafficPattern::*;
        let cases = [
            ((true, true, true), PeakHighTraffic),
            ((true, true, false), PeakNormalTraffic),
            ((true, false, true), PeakOffHours),
            ((true, false, false), PeakOffHours),
            ((false, true, true), OffPeak),
            ((false, true, false), OffPeak),
            ((false, false, true), OffPeak),
            ((false, false, false), OffPeak),
        ];
        for ((season, hours, high), expected) in cases {
            assert_eq!(TrafficPattern::classify(season, hours, high), expected);
        }
    }

    #[test]
    fn test_intervals_by_pattern() {
        let intervals = RefreshIntervals::default();
        let minutes = |p: TrafficPattern| p.refresh_interval(&intervals).as_secs() / 60;
        assert_eq!(minutes(TrafficPattern::PeakHighTraffic), 15);
        assert_eq!(minutes(TrafficPattern::PeakNormalTraffic), 30);
        assert_eq!(minutes(TrafficPattern::PeakOffHours), 120);
        assert_eq!(minutes(TrafficPattern::OffPeak), 240);
    }

    #[test]
    fn test_counter_window_slides() {
        let counter = RequestRateCounter::new();
        for _ in 0..5 {
            counter.record(1_000);
        }
        counter.record(1_030);
        assert_eq!(counter.count_last_minute(1_030), 6);
        assert_eq!(counter.count_last_minute(1_059), 6);
        assert_eq!(counter.count_last_minute(1_060), 1);
        assert_eq!(counter.count_last_minute(1_090), 0);
    }

    #[test]
    fn test_counter_resets_reused_bucket() {
        let counter = RequestRateCounter::new();
        counter.record(1_000);
        counter.record(1_060);
        assert_eq!(counter.count_last_minute(1_060), 1);
    }

    #[tokio::test]
    async fn test_counter_concurrent_increments() {
        let counter = Arc::new(RequestRateCounter::new());
        let mut handles = vec![];
        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            handles.push(tokio::spawn(async move {
                for _ in 0..250 {
                    counter.record(5_000);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(counter.count_last_minute(5_000), 2_000);
    }

    fn classifier_at(
        y: i32,
        m: u32,
        d: u32,
        h: u32,
    ) -> (TrafficClassifier, Arc<RequestRateCounter>) {
        let clock = Arc::new(FixedTimeProvider::new(
            Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap(),
        ));
        let counter = Arc::new(RequestRateCounter::new());
        (TrafficClassifier::new(counter.clone(), clock), counter)
    }

    #[test]
    fn test_off_hours_in_season_is_not_off_peak() {
        let (classifier, _) = classifier_at(2025, 3, 3, 22);
        assert_eq!(
            classifier.current_pattern(&TaxSeasonConfig::default()),
            TrafficPattern::PeakOffHours
        );
    }

    #[test]
    fn test_high_traffic_in_business_hours() {
        let (classifier, _) = classifier_at(2025, 3, 3, 10);
        let season = TaxSeasonConfig {
            high_traffic_threshold: 3,
            ..Default::default()
        };
        assert_eq!(
            classifier.current_pattern(&season),
            TrafficPattern::PeakNormalTraffic
        );

        for _ in 0..3 {
            classifier.record_request();
        }
        assert_eq!(
            classifier.current_pattern(&season),
            TrafficPattern::PeakHighTraffic
        );
    }

    #[test]
    fn test_outside_season_is_off_peak() {
        let (classifier, _) = classifier_at(2025, 8, 12, 10);
        assert_eq!(
            classifier.current_pattern(&TaxSeasonConfig::default()),
            TrafficPattern::OffPeak
        );
    }
}
