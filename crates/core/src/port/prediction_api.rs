// Remote Prediction Model Port

use super::payload::PredictionPayload;
use crate::domain::RefundId;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Discrepancy report for the model-feedback endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelFeedback {
    pub refund_id: RefundId,
    pub predicted_days: u32,
    pub actual_days: u32,
}

#[async_trait]
pub trait PredictionApi: Send + Sync {
    /// `POST prediction(id)`
    async fn request_prediction(&self, refund_id: &str) -> Result<PredictionPayload>;

    /// `POST modelUpdate(id, predictedDays, actualDays)`
    async fn submit_model_update(&self, feedback: &ModelFeedback) -> Result<()>;
}

pub mod mocks {
    use super::*;
    use crate::error::SyncError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub struct ScriptedPredictionApi {
        prediction: Mutex<Result<PredictionPayload>>,
        feedback_result: Mutex<Result<()>>,
        feedback: Mutex<Vec<ModelFeedback>>,
        prediction_calls: AtomicUsize,
    }

    impl ScriptedPredictionApi {
        pub fn returning(response: Result<PredictionPayload>) -> Self {
            Self {
                prediction: Mutex::new(response),
                feedback_result: Mutex::new(Ok(())),
                feedback: Mutex::new(Vec::new()),
                prediction_calls: AtomicUsize::new(0),
            }
        }

        pub fn unreachable() -> Self {
            Self::returning(Err(SyncError::Network("connection refused".to_string())))
        }

        pub fn set_prediction(&self, response: Result<PredictionPayload>) {
            *self.prediction.lock().unwrap() = response;
        }

        pub fn set_feedback_result(&self, result: Result<()>) {
            *self.feedback_result.lock().unwrap() = result;
        }

        pub fn prediction_calls(&self) -> usize {
            self.prediction_calls.load(Ordering::SeqCst)
        }

        /// Every feedback submission, including failed ones
        pub fn feedback_calls(&self) -> Vec<ModelFeedback> {
            self.feedback.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PredictionApi for ScriptedPredictionApi {
        async fn request_prediction(&self, _refund_id: &str) -> Result<PredictionPayload> {
            self.prediction_calls.fetch_add(1, Ordering::SeqCst);
            self.prediction.lock().unwrap().clone()
        }

        async fn submit_model_update(&self, feedback: &ModelFeedback) -> Result<()> {
            self.feedback.lock().unwrap().push(feedback.clone());
            self.feedback_result.lock().unwrap().clone()
        }
    }
}
