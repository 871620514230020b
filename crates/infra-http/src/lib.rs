// Refund Sync Infrastructure - HTTP Adapters
// Implements: RefundApi, PredictionApi

mod client;
mod prediction_api;
mod refund_api;

#[cfg(test)]
mod test_server;

pub use client::{HttpClient, DEFAULT_TIMEOUT, REQUEST_ID_HEADER};
pub use prediction_api::HttpPredictionApi;
pub use refund_api::HttpRefundApi;
