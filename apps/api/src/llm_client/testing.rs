//! Fakes for exercising the client without a network or real delays.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;

use super::rate_limit::RateLimiter;
use super::retry::Sleeper;
use super::transport::{RawResponse, UpstreamFailure, UpstreamTransport};
use super::types::GenerateContentRequest;
use super::LlmClient;
use crate::config::AiConfig;

#[derive(Debug, Clone)]
pub enum Step {
    Respond { status: StatusCode, body: String },
    Fail(UpstreamFailure),
}

impl Step {
    pub fn ok(body: String) -> Self {
        Step::Respond {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn status(code: u16, body: &str) -> Self {
        Step::Respond {
            status: StatusCode::from_u16(code).expect("valid status code"),
            body: body.to_string(),
        }
    }

    pub fn network(message: &str) -> Self {
        Step::Fail(UpstreamFailure::Network(message.to_string()))
    }

    pub fn timeout() -> Self {
        Step::Fail(UpstreamFailure::Timeout(Duration::from_secs(30)))
    }
}

/// Replays a fixed script of responses and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<(String, String, GenerateContentRequest)>>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::default(),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<(String, String, GenerateContentRequest)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpstreamTransport for ScriptedTransport {
    async fn post(
        &self,
        endpoint: &str,
        token: &str,
        request: &GenerateContentRequest,
    ) -> Result<RawResponse, UpstreamFailure> {
        self.requests.lock().unwrap().push((
            endpoint.to_string(),
            token.to_string(),
            request.clone(),
        ));

        match self.steps.lock().unwrap().pop_front() {
            Some(Step::Respond { status, body }) => Ok(RawResponse { status, body }),
            Some(Step::Fail(failure)) => Err(failure),
            None => Err(UpstreamFailure::Network("script exhausted".to_string())),
        }
    }
}

/// Records requested delays and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

pub fn ai_config(max_retries: u32) -> AiConfig {
    AiConfig {
        endpoint: Some("http://upstream.test/invoke".to_string()),
        auth_token: Some("test-token".to_string()),
        max_retries,
        timeout: Duration::from_secs(30),
        requests_per_hour: 300,
        requests_per_minute: Some(20),
    }
}

pub fn client(
    transport: Arc<ScriptedTransport>,
    max_retries: u32,
) -> (LlmClient, Arc<RecordingSleeper>) {
    let sleeper = Arc::new(RecordingSleeper::default());
    let config = ai_config(max_retries);
    let llm = LlmClient::with_parts(
        &config,
        transport,
        sleeper.clone(),
        Arc::new(RateLimiter::new(
            config.requests_per_hour,
            config.requests_per_minute,
        )),
    );
    (llm, sleeper)
}

pub fn client_with_limiter(
    transport: Arc<ScriptedTransport>,
    max_retries: u32,
    limiter: Arc<RateLimiter>,
) -> LlmClient {
    LlmClient::with_parts(
        &ai_config(max_retries),
        transport,
        Arc::new(RecordingSleeper::default()),
        limiter,
    )
}

/// A well-formed upstream body whose single candidate carries `text`.
pub fn candidate_body(text: &str) -> String {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
    .to_string()
}
