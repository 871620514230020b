// Remote Status Endpoint Port

use super::payload::{PredictionPayload, StatusPayload};
use crate::error::Result;
use async_trait::async_trait;

/// Caller identity sent with every status request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub auth_token: String,
    pub device_id: String,
}

#[async_trait]
pub trait RefundApi: Send + Sync {
    /// `GET status(authToken, deviceId)`
    async fn fetch_status(&self, credentials: &Credentials) -> Result<StatusPayload>;

    /// `GET prediction(id, authToken)`
    ///
    /// Part of the remote contract only. The engine reads predictions through
    /// `PredictionApi`, which owns validation and fallback.
    async fn fetch_prediction(&self, refund_id: &str, auth_token: &str)
        -> Result<PredictionPayload>;
}

pub mod mocks {
    use super::*;
    use crate::error::SyncError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays queued responses, then repeats the fallback response.
    pub struct ScriptedRefundApi {
        queued: Mutex<VecDeque<Result<StatusPayload>>>,
        fallback: Mutex<Result<StatusPayload>>,
        prediction: Mutex<Result<PredictionPayload>>,
        status_calls: AtomicUsize,
        prediction_calls: AtomicUsize,
    }

    impl ScriptedRefundApi {
        pub fn returning(response: Result<StatusPayload>) -> Self {
            Self {
                queued: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(response),
                prediction: Mutex::new(Err(SyncError::Client {
                    status: 404,
                    message: "no prediction scripted".to_string(),
                })),
                status_calls: AtomicUsize::new(0),
                prediction_calls: AtomicUsize::new(0),
            }
        }

        /// Served once, before the fallback
        pub fn push(&self, response: Result<StatusPayload>) {
            self.queued.lock().unwrap().push_back(response);
        }

        pub fn set_fallback(&self, response: Result<StatusPayload>) {
            *self.fallback.lock().unwrap() = response;
        }

        pub fn set_prediction(&self, response: Result<PredictionPayload>) {
            *self.prediction.lock().unwrap() = response;
        }

        pub fn status_calls(&self) -> usize {
            self.status_calls.load(Ordering::SeqCst)
        }

        pub fn prediction_calls(&self) -> usize {
            self.prediction_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RefundApi for ScriptedRefundApi {
        async fn fetch_status(&self, _credentials: &Credentials) -> Result<StatusPayload> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(next) = self.queued.lock().unwrap().pop_front() {
                return next;
            }
            self.fallback.lock().unwrap().clone()
        }

        async fn fetch_prediction(
            &self,
            _refund_id: &str,
            _auth_token: &str,
        ) -> Result<PredictionPayload> {
            self.prediction_calls.fetch_add(1, Ordering::SeqCst);
            self.prediction.lock().unwrap().clone()
        }
    }
}
