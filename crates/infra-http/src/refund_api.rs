// HTTP RefundApi Implementation

use crate::client::HttpClient;
use async_trait::async_trait;
use refund_sync_core::port::{Credentials, PredictionPayload, RefundApi, StatusPayload};
use refund_sync_core::Result;
use reqwest::header::AUTHORIZATION;
use tracing::debug;

const DEVICE_ID_HEADER: &str = "X-Device-ID";

/// Remote status endpoint
pub struct HttpRefundApi {
    http: HttpClient,
}

impl HttpRefundApi {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl RefundApi for HttpRefundApi {
    async fn fetch_status(&self, credentials: &Credentials) -> Result<StatusPayload> {
        debug!(device_id = %credentials.device_id, "GET refund status");
        let request = self
            .http
            .get("/v1/refund/status")
            .header(AUTHORIZATION, format!("Bearer {}", credentials.auth_token))
            .header(DEVICE_ID_HEADER, &credentials.device_id);
        self.http.send_json(request).await
    }

    async fn fetch_prediction(
        &self,
        refund_id: &str,
        auth_token: &str,
    ) -> Result<PredictionPayload> {
        debug!(refund_id = %refund_id, "GET refund prediction");
        let request = self
            .http
            .get(&format!("/v1/refund/prediction/{}", refund_id))
            .header(AUTHORIZATION, format!("Bearer {}", auth_token));
        self.http.send_json(request).await
    }
}
