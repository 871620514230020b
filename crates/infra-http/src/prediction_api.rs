// HTTP PredictionApi Implementation

use crate::client::HttpClient;
use async_trait::async_trait;
use refund_sync_core::port::{ModelFeedback, PredictionApi, PredictionPayload};
use refund_sync_core::Result;
use serde::Serialize;
use tracing::debug;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictionRequest<'a> {
    refund_id: &'a str,
}

/// Remote prediction model endpoint
pub struct HttpPredictionApi {
    http: HttpClient,
}

impl HttpPredictionApi {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl PredictionApi for HttpPredictionApi {
    async fn request_prediction(&self, refund_id: &str) -> Result<PredictionPayload> {
        debug!(refund_id = %refund_id, "POST prediction");
        let request = self
            .http
            .post("/v1/predictions")
            .json(&PredictionRequest { refund_id });
        self.http.send_json(request).await
    }

    async fn submit_model_update(&self, feedback: &ModelFeedback) -> Result<()> {
        debug!(refund_id = %feedback.refund_id, "POST model update");
        let request = self.http.post("/v1/model/update").json(feedback);
        self.http.send_empty(request).await
    }
}
