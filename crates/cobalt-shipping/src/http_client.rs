//! The upload endpoint is an injected capability, matching the
//! file-system capability in `cobalt-store`: no global client singleton.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ShippingError;

/// Response to a single envelope upload.
#[derive(Debug, Clone)]
pub struct UploadResponse {
    pub http_code: u16,
    /// The server may direct the shipper to throttle before its next
    /// attempt.
    pub next_request_wait: Option<Duration>,
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// # Errors
    /// Returns [`ShippingError::DeadlineExceeded`] if `deadline` elapses
    /// before a response is received, or [`ShippingError::Other`] for any
    /// other transport failure.
    async fn post(&self, endpoint: &str, body: Vec<u8>, deadline: Duration) -> Result<UploadResponse, ShippingError>;
}

#[derive(Deserialize)]
struct UploadResponseBody {
    next_request_wait_millis: Option<u64>,
}

pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestHttpClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn post(&self, endpoint: &str, body: Vec<u8>, deadline: Duration) -> Result<UploadResponse, ShippingError> {
        let send = self.client.post(endpoint).body(body).send();
        let response = tokio::time::timeout(deadline, send)
            .await
            .map_err(|_| ShippingError::DeadlineExceeded)?
            .map_err(|e| ShippingError::Other(e.to_string()))?;

        let http_code = response.status().as_u16();
        let next_request_wait = response
            .json::<UploadResponseBody>()
            .await
            .ok()
            .and_then(|body| body.next_request_wait_millis)
            .map(Duration::from_millis);

        Ok(UploadResponse {
            http_code,
            next_request_wait,
        })
    }
}
