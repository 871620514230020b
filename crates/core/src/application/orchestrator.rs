//! Sync orchestrator - the read / refresh / clear protocol
//!
//! Emission order per call:
//! - fresh cache hit: the cached value only
//! - stale or invalidated hit: the cached value marked stale, with a
//!   background refresh scheduled (never awaited)
//! - miss: one fresh value or one error
//!
//! A forced refresh passes the manual gate first. Network and rate-limit
//! failures fall back to the last persisted value marked stale; every other
//! failure is surfaced.

use super::prediction_cache::PredictionCache;
use super::prediction_service::PredictionService;
use super::retry::{RetryExecutor, RetryPolicy};
use super::scheduler::{RefreshScheduler, RefreshTask};
use super::status_cache::StatusCache;
use super::traffic::{RequestRateCounter, TrafficClassifier};
use crate::domain::{Prediction, RefundState, RefundStatus};
use crate::error::{Result, SyncError};
use crate::port::{
    AnalyticsTracker, ConfigSource, PredictionApi, RefundApi, SessionProvider, StatusCipher, StatusRowStore,
    TimeProvider,
};
use async_stream::stream;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// Adapters the orchestrator is assembled from
pub struct SyncDependencies {
    pub refund_api: Arc<dyn RefundApi>,
    pub prediction_api: Arc<dyn PredictionApi>,
    pub status_store: Arc<dyn StatusRowStore>,
    pub cipher: Arc<dyn StatusCipher>,
    pub session: Arc<dyn SessionProvider>,
    pub config: Arc<dyn ConfigSource>,
    pub time_provider: Arc<dyn TimeProvider>,
    pub analytics: Arc<dyn AnalyticsTracker>,
}

pub struct SyncOrchestrator {
    refund_api: Arc<dyn RefundApi>,
    session: Arc<dyn SessionProvider>,
    config: Arc<dyn ConfigSource>,
    time_provider: Arc<dyn TimeProvider>,
    status_cache: Arc<StatusCache>,
    predictions: Arc<PredictionService>,
    classifier: Arc<TrafficClassifier>,
    scheduler: Arc<RefreshScheduler>,
    retry: RetryExecutor,
}

impl SyncOrchestrator {
    /// Build the engine and attach it as the scheduler's refresh task.
    pub fn new(deps: SyncDependencies) -> Arc<Self> {
        let status_cache = Arc::new(StatusCache::new(
            deps.status_store,
            deps.cipher,
            Arc::clone(&deps.time_provider),
        ));
        let prediction_cache = Arc::new(PredictionCache::new(Arc::clone(&deps.time_provider)));
        let predictions = Arc::new(PredictionService::new(
            deps.prediction_api,
            prediction_cache,
            Arc::clone(&deps.config),
            Arc::clone(&deps.time_provider),
        ));
        let classifier = Arc::new(TrafficClassifier::new(
            Arc::new(RequestRateCounter::new()),
            Arc::clone(&deps.time_provider),
        ));
        let scheduler = Arc::new(RefreshScheduler::new(
            Arc::clone(&deps.config),
            Arc::clone(&classifier),
            deps.analytics,
        ));

        let orchestrator = Arc::new(Self {
            refund_api: deps.refund_api,
            session: deps.session,
            config: deps.config,
            time_provider: deps.time_provider,
            status_cache,
            predictions,
            classifier,
            scheduler,
            retry: RetryExecutor,
        });

        let weak = Arc::downgrade(&orchestrator);
        let task: Weak<dyn RefreshTask> = weak;
        orchestrator.scheduler.attach(task);
        orchestrator
    }

    pub fn scheduler(&self) -> &Arc<RefreshScheduler> {
        &self.scheduler
    }

    pub fn status_cache(&self) -> &Arc<StatusCache> {
        &self.status_cache
    }

    pub fn prediction_cache(&self) -> &Arc<PredictionCache> {
        self.predictions.cache()
    }

    pub fn classifier(&self) -> &Arc<TrafficClassifier> {
        &self.classifier
    }

    /// Status of the session's refund. `force_refresh` takes the [`Self::refresh`] path.
    pub fn read(self: &Arc<Self>, force_refresh: bool) -> BoxStream<'static, Result<RefundStatus>> {
        let this = Arc::clone(self);
        Box::pin(stream! {
            let refund_id = this.session.current_refund_id();

            let cached = match refund_id.as_deref() {
                Some(id) if !force_refresh => this.status_cache.get(id).await,
                _ => None,
            };

            match cached {
                Some(cached) => {
                    let ttl = this.config.refresh_config().cache_policy.ttl_for(cached.status.state);
                    if cached.needs_refresh(this.time_provider.now(), ttl) {
                        let id = cached.status.id.clone();
                        debug!(refund_id = %id, is_valid = cached.is_valid, "Serving stale status");
                        // before the yield: consumers may stop after one item
                        this.scheduler.schedule_refresh(&id);
                        yield Ok(cached.status.into_stale());
                    } else {
                        debug!(refund_id = %cached.status.id, "Serving fresh status");
                        yield Ok(cached.status);
                    }
                }
                None if force_refresh => {
                    yield this.refresh_once(refund_id.as_deref()).await;
                }
                None => {
                    let result = this.fetch_and_store().await;
                    if let Ok(status) = &result {
                        this.schedule_after_fetch(status);
                    }
                    yield result;
                }
            }
        })
    }

    /// Forced refresh of `refund_id`, gated by the manual rate limit.
    pub fn refresh(self: &Arc<Self>, refund_id: &str) -> BoxStream<'static, Result<RefundStatus>> {
        let this = Arc::clone(self);
        let refund_id = refund_id.to_string();
        Box::pin(stream! {
            yield this.refresh_once(Some(&refund_id)).await;
        })
    }

    pub fn get_prediction(self: &Arc<Self>, refund_id: &str) -> BoxStream<'static, Result<Prediction>> {
        let this = Arc::clone(self);
        let refund_id = refund_id.to_string();
        Box::pin(stream! {
            yield this.predictions.get_prediction(&refund_id).await;
        })
    }

    pub async fn update_prediction_accuracy(&self, refund_id: &str, actual_days: u32) {
        self.predictions
            .update_prediction_accuracy(refund_id, actual_days)
            .await;
    }

    /// Keep the last value servable but force a refresh on the next read.
    pub async fn invalidate_status(&self, refund_id: &str) -> Result<()> {
        self.status_cache.invalidate(refund_id).await
    }

    /// Cancel every job and wipe both caches. Both clears always run; the
    /// first failure is reported.
    pub async fn clear_data(&self) -> Result<()> {
        self.scheduler.cancel_all_refresh();
        let status_result = self.status_cache.clear().await;
        self.predictions.cache().clear();

        match &status_result {
            Ok(()) => info!("Local refund data cleared"),
            Err(e) => error!(error = %e, "Clearing status cache failed"),
        }
        status_result
    }

    async fn refresh_once(&self, refund_id: Option<&str>) -> Result<RefundStatus> {
        if !self.scheduler.can_refresh_now() {
            return match self.cached_fallback(refund_id).await {
                Some(status) => Ok(status),
                None => Err(SyncError::RateLimit { retry_after: None }),
            };
        }

        match self.fetch_and_store().await {
            Ok(status) => {
                self.schedule_after_fetch(&status);
                Ok(status)
            }
            Err(e) if e.allows_cached_fallback() => {
                warn!(error = %e, "Refresh failed, trying last known value");
                self.cached_fallback(refund_id).await.ok_or(e)
            }
            Err(e) => {
                error!(error = %e, "Refresh failed");
                Err(e)
            }
        }
    }

    async fn cached_fallback(&self, refund_id: Option<&str>) -> Option<RefundStatus> {
        let refund_id = refund_id?;
        let cached = self.status_cache.get(refund_id).await?;
        info!(refund_id = %refund_id, "Serving last known status");
        Some(cached.status.into_stale())
    }

    /// Fetch (with retry), attach a prediction when needed, persist.
    async fn fetch_and_store(&self) -> Result<RefundStatus> {
        let config = self.config.refresh_config();
        let policy = RetryPolicy::from(&config.retry_policy);
        let credentials = self.session.credentials();

        let api = &self.refund_api;
        let classifier = &self.classifier;
        let credentials = &credentials;
        let payload = self
            .retry
            .run(&policy, SyncError::is_retryable, move || async move {
                classifier.record_request();
                api.fetch_status(credentials).await
            })
            .await?;

        let today = self.time_provider.local_now().date();
        let mut status = payload.into_status(today)?;

        if let Some(previous) = self.status_cache.get(&status.id).await {
            if previous.status.state != status.state
                && self.predictions.cache().mark_stale(&status.id)
            {
                info!(
                    refund_id = %status.id,
                    from = %previous.status.state,
                    to = %status.state,
                    "State changed, cached prediction marked stale"
                );
            }
        }

        if let Some(embedded) = &status.prediction {
            let bounds = self.config.prediction_config().bounds();
            if let Err(e) = embedded.validate(&bounds) {
                warn!(refund_id = %status.id, error = %e, "Embedded prediction rejected");
                status.prediction = None;
            }
        }

        if status.needs_prediction() {
            match self.predictions.get_prediction(&status.id).await {
                Ok(prediction) => status.prediction = Some(prediction),
                Err(e) => warn!(refund_id = %status.id, error = %e, "No prediction attached"),
            }
        }

        self.status_cache.put(&status.id, &status).await?;
        self.session.set_current_refund_id(status.id.clone());

        info!(refund_id = %status.id, state = %status.state, "Status refreshed");
        Ok(status)
    }

    fn schedule_after_fetch(&self, status: &RefundStatus) {
        if status.state.is_terminal() {
            self.scheduler.cancel_refresh(&status.id);
        } else {
            self.scheduler.schedule_follow_up(&status.id);
        }
    }
}

#[async_trait]
impl RefreshTask for SyncOrchestrator {
    async fn run_refresh(&self, refund_id: &str) -> Result<RefundState> {
        let status = self.fetch_and_store().await?;
        if status.id != refund_id {
            warn!(job = %refund_id, fetched = %status.id, "Background refresh returned another refund");
        }
        Ok(status.state)
    }
}

impl Drop for SyncOrchestrator {
    fn drop(&mut self) {
        self.scheduler.cancel_all_refresh();
    }
}
