use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::detect::client::InferenceError;
use crate::monitor::log_status::LogReadError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    MalformedInput(String),
    #[error("Inference service error: {detail}")]
    UpstreamService { status: Option<u16>, detail: String },
    #[error("Failed to decode {0}")]
    Encoding(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    upstream_status: Option<u16>,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            ApiError::UpstreamService { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let upstream_status = match self {
            ApiError::UpstreamService { status, .. } => *status,
            _ => None,
        };
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
            upstream_status,
        })
    }
}

impl From<actix_web::error::BlockingError> for ApiError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        ApiError::Internal(format!("Blocking task failed: {}", err))
    }
}

impl From<LogReadError> for ApiError {
    fn from(err: LogReadError) -> Self {
        match err {
            LogReadError::Io(e) => ApiError::Io(e),
            LogReadError::Encoding(path) => ApiError::Encoding(path.display().to_string()),
        }
    }
}

impl From<InferenceError> for ApiError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::Status { status, body } => ApiError::UpstreamService {
                status: Some(status),
                detail: format!("status {}: {}", status, body),
            },
            InferenceError::Connection(detail) => ApiError::UpstreamService {
                status: None,
                detail: format!("connection failed: {}", detail),
            },
            InferenceError::InvalidResponse(detail) => ApiError::UpstreamService {
                status: Some(200),
                detail: format!("invalid response body: {}", detail),
            },
        }
    }
}
