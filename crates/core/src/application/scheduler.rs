//! Refresh scheduler - owns the background refresh job table
//!
//! One recurring job per refund id. Scheduling an id that already has a job
//! replaces it, so there is never more than one job per id. Each job
//! recomputes its interval from the current traffic pattern after every run
//! and applies its own exponential backoff to transient failures.
//!
//! Cancelling a job only suppresses future firings: a refresh that is
//! already running completes.

use super::rate_limiter::RefreshGate;
use super::traffic::{TrafficClassifier, TrafficPattern};
use crate::domain::{RefundId, RefundState};
use crate::error::{Result, SyncError};
use crate::port::{AnalyticsTracker, ConfigSource};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Work performed each time a job fires
#[async_trait]
pub trait RefreshTask: Send + Sync {
    /// Refresh one id and report its resulting state
    async fn run_refresh(&self, refund_id: &str) -> Result<RefundState>;
}

/// Scheduler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub active_jobs: usize,
    pub schedule_requests: u64,
    pub replaced_jobs: u64,
    pub job_runs: u64,
    pub job_failures: u64,
}

struct ScheduledJob {
    job_id: Uuid,
    token: CancellationToken,
}

struct SchedulerInner {
    jobs: DashMap<RefundId, ScheduledJob>,
    task: RwLock<Option<Weak<dyn RefreshTask>>>,
    config: Arc<dyn ConfigSource>,
    classifier: Arc<TrafficClassifier>,
    analytics: Arc<dyn AnalyticsTracker>,
    shutdown: CancellationToken,
    schedule_requests: AtomicU64,
    replaced_jobs: AtomicU64,
    job_runs: AtomicU64,
    job_failures: AtomicU64,
}

impl SchedulerInner {
    fn task(&self) -> Option<Arc<dyn RefreshTask>> {
        self.task
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    fn current_pattern(&self) -> TrafficPattern {
        let config = self.config.refresh_config();
        self.classifier.current_pattern(&config.tax_season)
    }

    fn current_interval(&self) -> Duration {
        let config = self.config.refresh_config();
        self.classifier
            .current_pattern(&config.tax_season)
            .refresh_interval(&config.refresh_intervals)
    }
}

pub struct RefreshScheduler {
    inner: Arc<SchedulerInner>,
    gate: RefreshGate,
}

impl RefreshScheduler {
    /// The manual refresh gate is sized from the config snapshot taken here.
    pub fn new(
        config: Arc<dyn ConfigSource>,
        classifier: Arc<TrafficClassifier>,
        analytics: Arc<dyn AnalyticsTracker>,
    ) -> Self {
        let gate = RefreshGate::from_config(&config.refresh_config().manual_refresh);
        Self {
            inner: Arc::new(SchedulerInner {
                jobs: DashMap::new(),
                task: RwLock::new(None),
                config,
                classifier,
                analytics,
                shutdown: CancellationToken::new(),
                schedule_requests: AtomicU64::new(0),
                replaced_jobs: AtomicU64::new(0),
                job_runs: AtomicU64::new(0),
                job_failures: AtomicU64::new(0),
            }),
            gate,
        }
    }

    /// Set the work jobs perform. Held weakly: jobs stop once the task is dropped.
    pub fn attach(&self, task: Weak<dyn RefreshTask>) {
        *self
            .inner
            .task
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    /// Fire promptly, then recur at the traffic-derived interval.
    pub fn schedule_refresh(&self, refund_id: &str) {
        self.schedule(refund_id, Duration::ZERO);
    }

    /// First firing after one interval, then recur.
    pub fn schedule_follow_up(&self, refund_id: &str) {
        let interval = self.inner.current_interval();
        self.schedule(refund_id, interval);
    }

    pub fn cancel_refresh(&self, refund_id: &str) {
        if let Some((_, job)) = self.inner.jobs.remove(refund_id) {
            job.token.cancel();
            info!(refund_id = %refund_id, job_id = %job.job_id, "Refresh job cancelled");
        }
    }

    pub fn cancel_all_refresh(&self) {
        let ids: Vec<RefundId> = self.inner.jobs.iter().map(|e| e.key().clone()).collect();
        for id in &ids {
            if let Some((_, job)) = self.inner.jobs.remove(id) {
                job.token.cancel();
            }
        }
        if !ids.is_empty() {
            info!(cancelled = ids.len(), "All refresh jobs cancelled");
        }
    }

    /// Local gate for user-initiated refreshes. Consumes a token when allowed.
    pub fn can_refresh_now(&self) -> bool {
        let allowed = self.gate.try_acquire();
        if !allowed {
            warn!("Manual refresh denied by local rate limit");
        }
        allowed
    }

    pub fn current_pattern(&self) -> TrafficPattern {
        self.inner.current_pattern()
    }

    pub fn current_interval(&self) -> Duration {
        self.inner.current_interval()
    }

    pub fn has_job(&self, refund_id: &str) -> bool {
        self.inner.jobs.contains_key(refund_id)
    }

    pub fn active_job_count(&self) -> usize {
        self.inner.jobs.len()
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            active_jobs: self.inner.jobs.len(),
            schedule_requests: self.inner.schedule_requests.load(Ordering::Relaxed),
            replaced_jobs: self.inner.replaced_jobs.load(Ordering::Relaxed),
            job_runs: self.inner.job_runs.load(Ordering::Relaxed),
            job_failures: self.inner.job_failures.load(Ordering::Relaxed),
        }
    }

    fn schedule(&self, refund_id: &str, first_delay: Duration) {
        self.inner.schedule_requests.fetch_add(1, Ordering::Relaxed);

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!(refund_id = %refund_id, error = %e, "Cannot schedule refresh outside a runtime");
                return;
            }
        };

        let job_id = Uuid::new_v4();
        let token = self.inner.shutdown.child_token();
        let previous = self.inner.jobs.insert(
            refund_id.to_string(),
            ScheduledJob {
                job_id,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.token.cancel();
            self.inner.replaced_jobs.fetch_add(1, Ordering::Relaxed);
            debug!(refund_id = %refund_id, replaced = %previous.job_id, "Replacing refresh job");
        }

        info!(
            refund_id = %refund_id,
            job_id = %job_id,
            first_delay_secs = first_delay.as_secs(),
            "Refresh job scheduled"
        );
        handle.spawn(run_job(
            Arc::clone(&self.inner),
            refund_id.to_string(),
            job_id,
            token,
            first_delay,
        ));
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
        self.inner.jobs.clear();
    }
}

async fn run_job(
    inner: Arc<SchedulerInner>,
    refund_id: RefundId,
    job_id: Uuid,
    token: CancellationToken,
    first_delay: Duration,
) {
    let mut delay = first_delay;
    let mut failures: u32 = 0;

    loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => {
                debug!(refund_id = %refund_id, job_id = %job_id, "Refresh job stopped");
                break;
            }

            _ = tokio::time::sleep(delay) => {}
        }

        let Some(task) = inner.task() else {
            warn!(refund_id = %refund_id, "No refresh task attached, stopping job");
            break;
        };

        inner.job_runs.fetch_add(1, Ordering::Relaxed);
        let result = task.run_refresh(&refund_id).await;
        drop(task);
        match &result {
            Ok(_) => inner.analytics.track_refresh_success(&refund_id),
            Err(e) => inner.analytics.track_refresh_error(&refund_id, e),
        }

        let backoff = inner.config.refresh_config().job_backoff.clone();
        match result {
            Ok(state) if state.is_terminal() => {
                info!(refund_id = %refund_id, state = %state, "Refund settled, stopping refresh job");
                break;
            }
            Ok(_) => {
                failures = 0;
                delay = inner.current_interval();
            }
            Err(e) if e.is_transient() && failures < backoff.max_retries => {
                inner.job_failures.fetch_add(1, Ordering::Relaxed);
                failures += 1;
                delay = backoff.delay_for(failures);
                if let SyncError::RateLimit {
                    retry_after: Some(retry_after),
                } = &e
                {
                    delay = delay.max(*retry_after);
                }
                warn!(
                    refund_id = %refund_id,
                    failures,
                    delay_secs = delay.as_secs(),
                    error = %e,
                    "Background refresh failed, backing off"
                );
            }
            Err(e) => {
                inner.job_failures.fetch_add(1, Ordering::Relaxed);
                failures = 0;
                delay = inner.current_interval();
                error!(
                    refund_id = %refund_id,
                    delay_secs = delay.as_secs(),
                    error = %e,
                    "Background refresh failed"
                );
            }
        }
    }

    inner
        .jobs
        .remove_if(&refund_id, |_, job| job.job_id == job_id);
}
