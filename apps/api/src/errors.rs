use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::extraction::ExtractionError;
use crate::llm_client::LlmError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Extraction(e) => {
                let (status, code) = match e {
                    ExtractionError::Empty(_) | ExtractionError::NotPdf(_) => {
                        (StatusCode::BAD_REQUEST, "INVALID_PDF")
                    }
                    ExtractionError::TooLarge { .. } => {
                        (StatusCode::PAYLOAD_TOO_LARGE, "PDF_TOO_LARGE")
                    }
                    ExtractionError::Unreadable { .. } | ExtractionError::NoText(_) => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "PDF_EXTRACTION_FAILED")
                    }
                };
                (status, code, e.to_string())
            }
            AppError::Llm(e) => llm_parts(e),
        }
    }
}

fn llm_parts(error: &LlmError) -> (StatusCode, &'static str, String) {
    match error {
        LlmError::NotConfigured(what) => {
            tracing::error!("AI service not configured: {what}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "AI_NOT_CONFIGURED",
                "AI service is not configured. Please set AUTHORIZATION_TOKEN and GEMINI_ENDPOINT."
                    .to_string(),
            )
        }
        LlmError::QuotaExceeded(_) => (
            StatusCode::TOO_MANY_REQUESTS,
            "RATE_LIMIT_EXCEEDED",
            "Rate limit exceeded. Please try again later.".to_string(),
        ),
        LlmError::Unauthorized => (
            StatusCode::BAD_GATEWAY,
            "UPSTREAM_AUTH_FAILED",
            "Authentication failed. Please check your AUTHORIZATION_TOKEN.".to_string(),
        ),
        LlmError::Forbidden => (
            StatusCode::BAD_GATEWAY,
            "UPSTREAM_PERMISSION_DENIED",
            "Permission denied. Please verify your API key permissions.".to_string(),
        ),
        LlmError::RateLimited { .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            "UPSTREAM_RATE_LIMITED",
            "Rate limit exceeded. Please try again later.".to_string(),
        ),
        LlmError::CallFailed { .. } => {
            tracing::error!("LLM error: {error}");
            (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_CALL_FAILED",
                "AI analysis failed. Please try again.".to_string(),
            )
        }
        LlmError::InvalidResponse(reason) => {
            tracing::error!("LLM error: invalid response: {reason}");
            (
                StatusCode::BAD_GATEWAY,
                "INVALID_UPSTREAM_RESPONSE",
                "The AI service returned an invalid response.".to_string(),
            )
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        let mut response = (status, body).into_response();

        if let AppError::Llm(LlmError::QuotaExceeded(quota)) = &self {
            let secs = quota.retry_after.as_secs().max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }

        response
    }
}
