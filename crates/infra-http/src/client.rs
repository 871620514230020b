//! Shared HTTP plumbing: request execution and error mapping.
//!
//! No reqwest error or status code leaves this module raw. Transport
//! failures become `Network`, 429 becomes `RateLimit`, 5xx `Server` and every
//! other non-success `Client`.
//!
//! Every request carries a fresh `Request-ID` header and is reported to the
//! analytics tracker once it completes, whatever the outcome.

use refund_sync_core::domain::DomainError;
use refund_sync_core::port::{AnalyticsTracker, ApiCallMetrics, TracingAnalytics};
use refund_sync_core::{Result, SyncError};
use reqwest::header::RETRY_AFTER;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
pub const REQUEST_ID_HEADER: &str = "Request-ID";

// Error bodies are truncated to this many characters in messages
const MAX_ERROR_BODY: usize = 256;

#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    analytics: Arc<dyn AnalyticsTracker>,
}

impl HttpClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| SyncError::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            analytics: Arc::new(TracingAnalytics::new()),
        })
    }

    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsTracker>) -> Self {
        self.analytics = analytics;
        self
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send and decode a JSON body.
    pub(crate) async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                SyncError::Validation(DomainError::MalformedPayload(e.to_string()))
            } else {
                map_transport_error(e)
            }
        })
    }

    /// Send, ignoring any success body.
    pub(crate) async fn send_empty(&self, request: RequestBuilder) -> Result<()> {
        self.send(request).await.map(|_| ())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request_id = Uuid::new_v4();
        let request = request
            .header(REQUEST_ID_HEADER, request_id.to_string())
            .build()
            .map_err(map_transport_error)?;
        let method = request.method().to_string();
        let url = request.url().to_string();
        let started = Instant::now();

        let (status_code, result) = match self.client.execute(request).await {
            Ok(response) => {
                let status = response.status();
                debug!(status = status.as_u16(), url = %url, request_id = %request_id, "HTTP response");
                (Some(status.as_u16()), check_status(response).await)
            }
            Err(e) => (None, Err(map_transport_error(e))),
        };

        self.analytics.track_api_call(&ApiCallMetrics {
            request_id,
            method,
            url,
            status_code,
            duration: started.elapsed(),
            error_message: result.as_ref().err().map(ToString::to_string),
        });
        result
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let body = response.text().await.unwrap_or_default();
    Err(map_status(status, retry_after, &body))
}

pub(crate) fn map_transport_error(err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::Network(format!("timeout: {err}"))
    } else if err.is_connect() {
        SyncError::Network(format!("connect: {err}"))
    } else if err.is_builder() {
        SyncError::Config(format!("request: {err}"))
    } else {
        SyncError::Network(err.to_string())
    }
}

pub(crate) fn map_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> SyncError {
    let message: String = if body.is_empty() {
        status.canonical_reason().unwrap_or("unknown").to_string()
    } else {
        body.chars().take(MAX_ERROR_BODY).collect()
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        SyncError::RateLimit { retry_after }
    } else if status.is_server_error() {
        SyncError::Server {
            status: status.as_u16(),
            message,
        }
    } else {
        SyncError::Client {
            status: status.as_u16(),
            message,
        }
    }
}

/// Delta-seconds form only; HTTP-date values are ignored.
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::TestServer;
    use refund_sync_core::port::analytics::mocks::RecordingAnalytics;

    fn tracked(base_url: &str) -> (HttpClient, Arc<RecordingAnalytics>) {
        let analytics = Arc::new(RecordingAnalytics::new());
        let client = HttpClient::new(base_url, DEFAULT_TIMEOUT)
            .unwrap()
            .with_analytics(analytics.clone());
        (client, analytics)
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            map_status(StatusCode::TOO_MANY_REQUESTS, Some(Duration::from_secs(30)), ""),
            SyncError::RateLimit {
                retry_after: Some(Duration::from_secs(30))
            }
        );
        assert!(matches!(
            map_status(StatusCode::SERVICE_UNAVAILABLE, None, "maintenance"),
            SyncError::Server { status: 503, ref message } if message == "maintenance"
        ));
        assert!(matches!(
            map_status(StatusCode::UNAUTHORIZED, None, ""),
            SyncError::Client { status: 401, ref message } if message == "Unauthorized"
        ));
        // Redirects that were not followed are not success either
        assert!(matches!(
            map_status(StatusCode::NOT_MODIFIED, None, ""),
            SyncError::Client { status: 304, .. }
        ));
    }

    #[test]
    fn test_server_and_rate_limit_retryability() {
        assert!(map_status(StatusCode::BAD_GATEWAY, None, "").is_retryable());
        assert!(!map_status(StatusCode::TOO_MANY_REQUESTS, None, "").is_retryable());
        assert!(!map_status(StatusCode::NOT_FOUND, None, "").is_retryable());
    }

    #[test]
    fn test_long_bodies_are_truncated() {
        let body = "x".repeat(1000);
        match map_status(StatusCode::INTERNAL_SERVER_ERROR, None, &body) {
            SyncError::Server { message, .. } => assert_eq!(message.len(), MAX_ERROR_BODY),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after(" 5 "), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = HttpClient::new("http://irs.example/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(client.url("/v1/refund/status"), "http://irs.example/v1/refund/status");
    }

    #[tokio::test]
    async fn test_request_id_is_sent_and_tracked() {
        let server = TestServer::respond("200 OK", &[], "{}").await;
        let (client, analytics) = tracked(&server.base_url);

        client.send_empty(client.get("/v1/refund/status")).await.unwrap();

        let calls = analytics.api_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "GET");
        assert_eq!(calls[0].url, format!("{}/v1/refund/status", server.base_url));
        assert_eq!(calls[0].status_code, Some(200));
        assert!(!calls[0].is_error());
        let header = format!("request-id: {}", calls[0].request_id);
        assert!(server.request().to_ascii_lowercase().contains(&header));
    }

    #[tokio::test]
    async fn test_every_request_gets_its_own_id() {
        let first = TestServer::respond("200 OK", &[], "{}").await;
        let second = TestServer::respond("200 OK", &[], "{}").await;
        let analytics = Arc::new(RecordingAnalytics::new());
        for server in [&first, &second] {
            let client = HttpClient::new(&server.base_url, DEFAULT_TIMEOUT)
                .unwrap()
                .with_analytics(analytics.clone());
            client.send_empty(client.post("/v1/model/update")).await.unwrap();
        }

        let calls = analytics.api_calls();
        assert_eq!(calls.len(), 2);
        assert_ne!(calls[0].request_id, calls[1].request_id);
    }

    #[tokio::test]
    async fn test_failed_calls_are_tracked() {
        let server = TestServer::respond("503 Service Unavailable", &[], "maintenance").await;
        let (client, analytics) = tracked(&server.base_url);
        let err = client.send_empty(client.post("/v1/predictions")).await.unwrap_err();

        let calls = analytics.api_calls();
        assert_eq!(calls[0].method, "POST");
        assert_eq!(calls[0].status_code, Some(503));
        assert_eq!(calls[0].error_message, Some(err.to_string()));

        let (client, analytics) = tracked(&TestServer::closed().await);
        assert!(client.send_empty(client.get("/v1/refund/status")).await.is_err());
        let calls = analytics.api_calls();
        assert_eq!(calls[0].status_code, None);
        assert!(calls[0].is_error());
    }
}
