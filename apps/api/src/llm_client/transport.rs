use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::llm_client::types::GenerateContentRequest;

/// What a single HTTP attempt can fail with.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamFailure {
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("upstream returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

impl UpstreamFailure {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            UpstreamFailure::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Status and body of a completed exchange, whatever the status.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

/// One POST to the generate-content endpoint.
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    async fn post(
        &self,
        endpoint: &str,
        token: &str,
        request: &GenerateContentRequest,
    ) -> Result<RawResponse, UpstreamFailure>;
}

pub struct ReqwestTransport {
    client: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            timeout,
        })
    }
}

#[async_trait]
impl UpstreamTransport for ReqwestTransport {
    async fn post(
        &self,
        endpoint: &str,
        token: &str,
        request: &GenerateContentRequest,
    ) -> Result<RawResponse, UpstreamFailure> {
        // The token goes out verbatim; the endpoint expects no "Bearer " prefix.
        let response = self
            .client
            .post(endpoint)
            .header(AUTHORIZATION, token)
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;

        Ok(RawResponse { status, body })
    }
}

impl ReqwestTransport {
    fn classify(&self, error: reqwest::Error) -> UpstreamFailure {
        if error.is_timeout() {
            UpstreamFailure::Timeout(self.timeout)
        } else {
            UpstreamFailure::Network(error.to_string())
        }
    }
}
