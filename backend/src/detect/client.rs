use log::{error, info};
use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("inference service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("inference service unreachable: {0}")]
    Connection(String),
    #[error("inference service returned an unreadable body: {0}")]
    InvalidResponse(String),
}

/// Body of the inference service's detection endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRequest {
    pub image_to_be_detected_address: String,
    pub categories: Vec<String>,
    pub is_change_detection: bool,
    pub is_only_change_detection: bool,
    pub legend_required: bool,
}

#[derive(Clone)]
pub struct InferenceClient {
    http_client: HttpClient,
    detect_url: String,
    timeout: Duration,
}

impl InferenceClient {
    pub fn new(detect_url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            detect_url,
            timeout,
        })
    }

    pub fn detect_url(&self) -> &str {
        &self.detect_url
    }

    /// One attempt, no retry. Anything other than a 200 with a JSON body is
    /// an error.
    pub async fn detect(&self, request: &DetectionRequest) -> Result<Value, InferenceError> {
        info!("Forwarding detection request to {}", self.detect_url);

        let response = self
            .http_client
            .put(&self.detect_url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to call inference service: {}", e);
                if e.is_timeout() {
                    InferenceError::Connection(format!(
                        "timed out after {}s",
                        self.timeout.as_secs()
                    ))
                } else {
                    InferenceError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            error!("Inference service returned {} - {}", status, body);
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let result: Value = response.json().await.map_err(|e| {
            error!("Inference service body is not JSON: {}", e);
            InferenceError::InvalidResponse(e.to_string())
        })?;
        info!("Detection succeeded");
        Ok(result)
    }
}
