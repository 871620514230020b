//! In-memory prediction cache
//!
//! Backed by a `moka` cache bounded by a per-entry write TTL and a capacity
//! cap with least-recently-used eviction. Expiry is also checked against the
//! injected clock so the TTL follows the engine's notion of time. Nothing is
//! persisted.

use crate::domain::{Prediction, RefundId};
use crate::port::TimeProvider;
use chrono::{DateTime, Utc};
use moka::ops::compute::{CompResult, Op};
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_PREDICTION_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_PREDICTION_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub struct CachedPrediction {
    pub prediction: Prediction,
    pub timestamp: DateTime<Utc>,
    /// Set when the refund's state moved on since this prediction was made
    pub is_stale: bool,
}

pub struct PredictionCache {
    entries: Cache<RefundId, CachedPrediction>,
    ttl: Duration,
    time_provider: Arc<dyn TimeProvider>,
}

impl PredictionCache {
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self::with_limits(
            time_provider,
            DEFAULT_PREDICTION_TTL,
            DEFAULT_PREDICTION_CAPACITY,
        )
    }

    pub fn with_limits(
        time_provider: Arc<dyn TimeProvider>,
        ttl: Duration,
        capacity: u64,
    ) -> Self {
        let entries = Cache::<RefundId, CachedPrediction>::builder()
            .max_capacity(capacity.max(1))
            .time_to_live(ttl)
            .eviction_policy(EvictionPolicy::lru())
            .eviction_listener(|refund_id, _, cause| {
                if cause.was_evicted() {
                    debug!(refund_id = %refund_id, cause = ?cause, "Prediction evicted");
                }
            })
            .build();
        Self {
            entries,
            ttl,
            time_provider,
        }
    }

    /// Entry for `refund_id`, unless expired. Stale-marked entries are returned as such.
    pub fn get(&self, refund_id: &str) -> Option<CachedPrediction> {
        let cached = self.entries.get(refund_id)?;
        if self.is_expired(&cached, self.time_provider.now()) {
            self.entries.invalidate(refund_id);
            debug!(refund_id = %refund_id, "Prediction expired");
            return None;
        }
        Some(cached)
    }

    pub fn save(&self, refund_id: &str, prediction: Prediction) {
        self.entries.insert(
            refund_id.to_string(),
            CachedPrediction {
                prediction,
                timestamp: self.time_provider.now(),
                is_stale: false,
            },
        );
    }

    /// Returns whether an entry was marked
    pub fn mark_stale(&self, refund_id: &str) -> bool {
        let result = self
            .entries
            .entry_by_ref(refund_id)
            .and_compute_with(|entry| match entry {
                Some(entry) => {
                    let mut cached = entry.into_value();
                    cached.is_stale = true;
                    Op::Put(cached)
                }
                None => Op::Nop,
            });
        matches!(result, CompResult::ReplacedWith(_))
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
    }

    pub fn len(&self) -> usize {
        self.entries.run_pending_tasks();
        self.entries.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, cached: &CachedPrediction, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => now - cached.timestamp >= ttl,
            Err(_) => false,
        }
    }
}
