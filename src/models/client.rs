//! HTTP client for the remote scoring service

use crate::config::ServerConfig;
use crate::error::PipelineError;
use crate::types::record::{PredictionResult, RequestPayload};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Anything that turns a payload into position-aligned probabilities
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, payload: &RequestPayload) -> Result<PredictionResult, PipelineError>;
}

#[async_trait]
impl<T: Scorer + ?Sized> Scorer for std::sync::Arc<T> {
    async fn score(&self, payload: &RequestPayload) -> Result<PredictionResult, PipelineError> {
        (**self).score(payload).await
    }
}

/// Stateless client for `POST {host}:{port}{path}`.
///
/// Performs exactly one request per call. There is no retry: any failure is
/// returned to the caller.
#[derive(Debug, Clone)]
pub struct PredictionClient {
    http: reqwest::Client,
    endpoint: String,
}

impl PredictionClient {
    /// Create a client from server configuration
    pub fn new(config: &ServerConfig) -> Result<Self, PipelineError> {
        Self::with_endpoint(config.url(), Duration::from_millis(config.timeout_ms))
    }

    pub fn with_endpoint(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, PipelineError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Transport {
                status: None,
                message: format!("failed to build HTTP client: {}", e),
            })?;

        let endpoint = endpoint.into();
        info!(endpoint = %endpoint, timeout_ms = timeout.as_millis() as u64, "Prediction client initialized");

        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Submit the payload and return one probability per record
    pub async fn predict(&self, payload: &RequestPayload) -> Result<PredictionResult, PipelineError> {
        let request_id = Uuid::new_v4();
        let body = payload.to_bytes()?;
        let records = payload.len();
        let start = Instant::now();

        debug!(
            request_id = %request_id,
            endpoint = %self.endpoint,
            records = records,
            bytes = body.len(),
            "Submitting scoring request"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                warn!(request_id = %request_id, error = %e, "Scoring request failed");
                PipelineError::from(e)
            })?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes);
            warn!(
                request_id = %request_id,
                status = status.as_u16(),
                "Scoring service returned an error status"
            );
            return Err(PipelineError::http_status(status.as_u16(), &text));
        }

        let result = PredictionResult::from_response_body(&bytes, records)?;

        debug!(
            request_id = %request_id,
            records = records,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Scoring request complete"
        );

        Ok(result)
    }
}

#[async_trait]
impl Scorer for PredictionClient {
    async fn score(&self, payload: &RequestPayload) -> Result<PredictionResult, PipelineError> {
        self.predict(payload).await
    }
}
