//! Prediction service - cache-first model predictions with local fallback
//!
//! The read path is effectively error-free: any remote, mapping or
//! validation failure is replaced by a locally synthesized estimate. Only a
//! configuration that cannot produce that estimate surfaces an error.

use super::prediction_cache::PredictionCache;
use crate::config::PredictionConfig;
use crate::domain::Prediction;
use crate::error::{Result, SyncError};
use crate::port::{ConfigSource, ModelFeedback, PredictionApi, TimeProvider};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct PredictionService {
    api: Arc<dyn PredictionApi>,
    cache: Arc<PredictionCache>,
    config: Arc<dyn ConfigSource>,
    time_provider: Arc<dyn TimeProvider>,
}

impl PredictionService {
    pub fn new(
        api: Arc<dyn PredictionApi>,
        cache: Arc<PredictionCache>,
        config: Arc<dyn ConfigSource>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            api,
            cache,
            config,
            time_provider,
        }
    }

    pub fn cache(&self) -> &Arc<PredictionCache> {
        &self.cache
    }

    pub async fn get_prediction(&self, refund_id: &str) -> Result<Prediction> {
        let config = self.config.prediction_config();

        if let Some(cached) = self.cache.get(refund_id) {
            if !cached.is_stale {
                debug!(refund_id = %refund_id, "Prediction cache hit");
                return Ok(cached.prediction);
            }
            debug!(refund_id = %refund_id, "Cached prediction is stale, refetching");
        }

        match self.fetch_validated(refund_id, &config).await {
            Ok(prediction) => {
                info!(
                    refund_id = %refund_id,
                    estimated_days = prediction.estimated_days,
                    confidence = prediction.confidence,
                    "Model prediction accepted"
                );
                self.cache.save(refund_id, prediction.clone());
                Ok(prediction)
            }
            Err(e) => {
                warn!(refund_id = %refund_id, error = %e, "Using fallback prediction");
                self.fallback(&config)
            }
        }
    }

    /// Report a poor estimate back to the model. Telemetry only: never fails.
    pub async fn update_prediction_accuracy(&self, refund_id: &str, actual_days: u32) {
        let config = self.config.prediction_config();

        let Some(cached) = self.cache.get(refund_id) else {
            debug!(refund_id = %refund_id, "No cached prediction to score");
            return;
        };
        let predicted = cached.prediction.estimated_days;
        let Some(accuracy) = cached.prediction.accuracy_against(actual_days) else {
            debug!(refund_id = %refund_id, "Zero-day prediction cannot be scored");
            return;
        };

        if accuracy >= config.confidence.minimum {
            debug!(refund_id = %refund_id, accuracy, "Prediction within tolerance");
            return;
        }

        let feedback = ModelFeedback {
            refund_id: refund_id.to_string(),
            predicted_days: predicted,
            actual_days,
        };
        match self.api.submit_model_update(&feedback).await {
            Ok(()) => info!(
                refund_id = %refund_id,
                predicted_days = predicted,
                actual_days,
                accuracy,
                "Model feedback submitted"
            ),
            Err(e) => error!(refund_id = %refund_id, error = %e, "Failed to submit model feedback"),
        }
    }

    async fn fetch_validated(&self, refund_id: &str, config: &PredictionConfig) -> Result<Prediction> {
        let payload = self.api.request_prediction(refund_id).await?;
        let prediction = payload.into_prediction(self.today())?;
        prediction.validate(&config.bounds())?;
        Ok(prediction)
    }

    fn fallback(&self, config: &PredictionConfig) -> Result<Prediction> {
        config.validate()?;
        Prediction::fallback(
            config.processing.default_processing_days,
            config.confidence.fallback,
            self.today(),
        )
        .map_err(|e| SyncError::Config(format!("fallback prediction: {}", e)))
    }

    fn today(&self) -> chrono::NaiveDate {
        self.time_provider.local_now().date()
    }
}
