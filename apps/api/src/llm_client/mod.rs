//! LLM Client — the single point of entry for generate-content calls.
//!
//! No other module talks to the upstream endpoint directly. Every call goes
//! through the quota guard, the credential check and the retry loop here.
//!
//! Generation parameters are hardcoded so the model's output format stays
//! stable; they are not configurable.

use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub mod rate_limit;
pub mod retry;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

use crate::config::AiConfig;
use rate_limit::{QuotaExceeded, RateLimiter};
use retry::{RetryPolicy, RetryState, Sleeper, TokioSleeper};
use transport::{ReqwestTransport, UpstreamFailure, UpstreamTransport};
use types::{GenerateContentRequest, GenerateContentResponse, GenerationConfig};

pub const GENERATION_CONFIG: GenerationConfig = GenerationConfig {
    temperature: 0.3,
    top_k: 40,
    top_p: 0.95,
    max_output_tokens: 2048,
    candidate_count: 1,
};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("AI service is not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Rate limit exceeded: {0}")]
    QuotaExceeded(#[from] QuotaExceeded),

    #[error("Upstream rejected the authorization token")]
    Unauthorized,

    #[error("Upstream denied permission for this token")]
    Forbidden,

    #[error("Upstream rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("Upstream call failed after {attempts} attempts: {last}")]
    CallFailed {
        attempts: u32,
        #[source]
        last: UpstreamFailure,
    },

    #[error("Invalid upstream response: {0}")]
    InvalidResponse(String),
}

/// 401 and 403 will not change on a retry with the same token.
fn is_retryable(failure: &UpstreamFailure) -> bool {
    !matches!(
        failure.status(),
        Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
    )
}

fn terminal_error(attempts: u32, last: UpstreamFailure) -> LlmError {
    match last.status() {
        Some(StatusCode::UNAUTHORIZED) => LlmError::Unauthorized,
        Some(StatusCode::FORBIDDEN) => LlmError::Forbidden,
        Some(StatusCode::TOO_MANY_REQUESTS) => LlmError::RateLimited { attempts },
        _ => LlmError::CallFailed { attempts, last },
    }
}

/// Resilient client for the generate-content endpoint.
///
/// Cloning is cheap; clones share the transport and the quota.
#[derive(Clone)]
pub struct LlmClient {
    endpoint: Option<String>,
    token: Option<String>,
    policy: RetryPolicy,
    transport: Arc<dyn UpstreamTransport>,
    sleeper: Arc<dyn Sleeper>,
    limiter: Arc<RateLimiter>,
}

impl LlmClient {
    pub fn new(config: &AiConfig) -> Result<Self, reqwest::Error> {
        let transport = ReqwestTransport::new(config.timeout)?;
        Ok(Self::with_parts(
            config,
            Arc::new(transport),
            Arc::new(TokioSleeper),
            Arc::new(RateLimiter::new(
                config.requests_per_hour,
                config.requests_per_minute,
            )),
        ))
    }

    pub fn with_parts(
        config: &AiConfig,
        transport: Arc<dyn UpstreamTransport>,
        sleeper: Arc<dyn Sleeper>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            token: config.auth_token.clone(),
            policy: RetryPolicy::new(config.max_retries),
            transport,
            sleeper,
            limiter,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some() && self.token.is_some()
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Sends `prompt` as a single user turn and returns the model's text.
    ///
    /// Counts once against the quota no matter how many HTTP attempts it
    /// takes. Nothing is sent when the quota is exhausted or the client is
    /// not configured.
    pub async fn generate(&self, prompt: String) -> Result<String, LlmError> {
        let permit = self.limiter.try_acquire().map_err(|e| {
            warn!("Local quota exhausted: {e}");
            LlmError::from(e)
        })?;

        let token = self
            .token
            .as_deref()
            .ok_or(LlmError::NotConfigured("AUTHORIZATION_TOKEN is not set"))?;
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or(LlmError::NotConfigured("GEMINI_ENDPOINT is not set"))?;

        permit.commit();

        let request = GenerateContentRequest::user_prompt(prompt, GENERATION_CONFIG);
        let response = self.call_with_retry(endpoint, token, &request).await?;

        if let Some(reason) = response
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
        {
            debug!("Finish reason: {reason}");
        }

        response
            .first_text()
            .map(str::to_owned)
            .map_err(|reason| LlmError::InvalidResponse(reason.to_string()))
    }

    async fn call_with_retry(
        &self,
        endpoint: &str,
        token: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, LlmError> {
        let max = self.policy.max_attempts;
        let mut state = self.policy.start();

        loop {
            state = match state {
                RetryState::Attempting { attempt } => {
                    info!("AI API attempt {attempt}/{max}");
                    let outcome = self.attempt(endpoint, token, request).await;
                    self.policy.advance(attempt, outcome, is_retryable)
                }
                RetryState::Retrying {
                    attempt,
                    delay,
                    error,
                } => {
                    warn!(
                        "AI API attempt {attempt}/{max} failed: {error}; retrying in {}ms",
                        delay.as_millis()
                    );
                    self.sleeper.sleep(delay).await;
                    RetryState::Attempting {
                        attempt: attempt + 1,
                    }
                }
                RetryState::Succeeded { attempt, value } => {
                    info!("AI API call succeeded on attempt {attempt}/{max}");
                    let body = value.body;
                    return serde_json::from_str(&body).map_err(|e| {
                        error!("Upstream returned an undecodable body: {e}");
                        LlmError::InvalidResponse(format!("undecodable response body: {e}"))
                    });
                }
                RetryState::Aborted { attempt, error } => {
                    error!("AI API attempt {attempt}/{max} failed permanently: {error}");
                    return Err(terminal_error(attempt, error));
                }
                RetryState::Exhausted { attempts, error } => {
                    error!("AI API gave up after {attempts} attempts: {error}");
                    return Err(terminal_error(attempts, error));
                }
            };
        }
    }

    /// One HTTP exchange; any non-2xx status counts as a failed attempt.
    async fn attempt(
        &self,
        endpoint: &str,
        token: &str,
        request: &GenerateContentRequest,
    ) -> Result<transport::RawResponse, UpstreamFailure> {
        let response = self.transport.post(endpoint, token, request).await?;

        if !response.status.is_success() {
            debug!("Upstream body for {}: {}", response.status, response.body);
            return Err(UpstreamFailure::Status {
                status: response.status,
                body: response.body,
            });
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::testing::{candidate_body, client, ScriptedTransport, Step};
    use super::*;

    #[tokio::test]
    async fn test_success_on_first_attempt_returns_text() {
        let transport = ScriptedTransport::new(vec![Step::ok(candidate_body("hello"))]);
        let (llm, sleeper) = client(transport.clone(), 3);

        let text = llm.generate("prompt".to_string()).await.unwrap();

        assert_eq!(text, "hello");
        assert_eq!(transport.calls(), 1);
        assert!(sleeper.delays().is_empty());
        assert_eq!(llm.limiter().used_this_hour(), 1);
    }

    #[tokio::test]
    async fn test_request_carries_prompt_token_and_fixed_generation_config() {
        let transport = ScriptedTransport::new(vec![Step::ok(candidate_body("x"))]);
        let (llm, _) = client(transport.clone(), 3);

        llm.generate("the prompt".to_string()).await.unwrap();

        let sent = transport.requests();
        let (endpoint, token, request) = &sent[0];
        assert_eq!(endpoint, "http://upstream.test/invoke");
        assert_eq!(token, "test-token");
        assert_eq!(request.contents.len(), 1);
        assert_eq!(request.contents[0].role.as_deref(), Some("user"));
        assert_eq!(
            request.contents[0].parts[0].text.as_deref(),
            Some("the prompt")
        );
        assert_eq!(request.generation_config, GENERATION_CONFIG);
    }

    #[tokio::test]
    async fn test_transient_failures_then_success_backs_off_exponentially() {
        let transport = ScriptedTransport::new(vec![
            Step::status(503, "unavailable"),
            Step::network("connection reset"),
            Step::ok(candidate_body("done")),
        ]);
        let (llm, sleeper) = client(transport.clone(), 3);

        let text = llm.generate("p".to_string()).await.unwrap();

        assert_eq!(text, "done");
        assert_eq!(transport.calls(), 3);
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
        assert_eq!(llm.limiter().used_this_hour(), 1);
    }

    #[tokio::test]
    async fn test_every_attempt_failing_exhausts_after_max_attempts() {
        let transport = ScriptedTransport::new(vec![
            Step::status(500, "a"),
            Step::status(502, "b"),
            Step::timeout(),
            Step::ok(candidate_body("never reached")),
        ]);
        let (llm, sleeper) = client(transport.clone(), 3);

        let err = llm.generate("p".to_string()).await.unwrap_err();

        match err {
            LlmError::CallFailed { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(last, UpstreamFailure::Timeout(_)));
            }
            other => panic!("expected CallFailed, got {other:?}"),
        }
        assert_eq!(transport.calls(), 3);
        assert_eq!(sleeper.delays().len(), 2);
        assert_eq!(llm.limiter().used_this_hour(), 1);
    }

    #[tokio::test]
    async fn test_respects_configured_attempt_budget() {
        let transport = ScriptedTransport::new(vec![Step::status(500, "x"); 10]);
        let (llm, sleeper) = client(transport.clone(), 5);

        let err = llm.generate("p".to_string()).await.unwrap_err();

        assert!(matches!(err, LlmError::CallFailed { attempts: 5, .. }));
        assert_eq!(transport.calls(), 5);
        assert_eq!(
            sleeper.delays(),
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(16),
            ]
        );
    }

    #[tokio::test]
    async fn test_unauthorized_short_circuits() {
        let transport = ScriptedTransport::new(vec![
            Step::status(401, "bad token"),
            Step::ok(candidate_body("never reached")),
        ]);
        let (llm, sleeper) = client(transport.clone(), 3);

        let err = llm.generate("p".to_string()).await.unwrap_err();

        assert!(matches!(err, LlmError::Unauthorized));
        assert_eq!(transport.calls(), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_forbidden_short_circuits() {
        let transport = ScriptedTransport::new(vec![Step::status(403, "nope")]);
        let (llm, _) = client(transport.clone(), 3);

        let err = llm.generate("p".to_string()).await.unwrap_err();

        assert!(matches!(err, LlmError::Forbidden));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_upstream_429_is_retried_then_reported_as_rate_limited() {
        let transport = ScriptedTransport::new(vec![Step::status(429, "slow down"); 3]);
        let (llm, sleeper) = client(transport.clone(), 3);

        let err = llm.generate("p".to_string()).await.unwrap_err();

        assert!(matches!(err, LlmError::RateLimited { attempts: 3 }));
        assert_eq!(transport.calls(), 3);
        assert_eq!(sleeper.delays().len(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_quota_makes_no_http_call() {
        let transport = ScriptedTransport::new(vec![Step::ok(candidate_body("x"))]);
        let limiter = Arc::new(RateLimiter::new(1, None));
        limiter.try_acquire().unwrap().commit();
        let llm = testing::client_with_limiter(transport.clone(), 3, limiter);

        let err = llm.generate("p".to_string()).await.unwrap_err();

        assert!(matches!(err, LlmError::QuotaExceeded(_)));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_network_and_keeps_quota() {
        let transport = ScriptedTransport::new(vec![Step::ok(candidate_body("x"))]);
        let mut config = testing::ai_config(3);
        config.auth_token = None;
        let llm = LlmClient::with_parts(
            &config,
            transport.clone(),
            Arc::new(testing::RecordingSleeper::default()),
            Arc::new(RateLimiter::new(10, None)),
        );

        let err = llm.generate("p".to_string()).await.unwrap_err();

        assert!(matches!(err, LlmError::NotConfigured(_)));
        assert_eq!(transport.calls(), 0);
        assert_eq!(llm.limiter().used_this_hour(), 0);
        assert!(!llm.is_configured());
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_configuration_error() {
        let transport = ScriptedTransport::new(vec![]);
        let mut config = testing::ai_config(3);
        config.endpoint = None;
        let llm = LlmClient::with_parts(
            &config,
            transport.clone(),
            Arc::new(testing::RecordingSleeper::default()),
            Arc::new(RateLimiter::new(10, None)),
        );

        let err = llm.generate("p".to_string()).await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured(_)));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_candidates_is_invalid_response_without_retry() {
        let transport = ScriptedTransport::new(vec![
            Step::ok(r#"{"candidates":[]}"#.to_string()),
            Step::ok(candidate_body("never reached")),
        ]);
        let (llm, sleeper) = client(transport.clone(), 3);

        let err = llm.generate("p".to_string()).await.unwrap_err();

        assert!(matches!(err, LlmError::InvalidResponse(_)));
        assert_eq!(transport.calls(), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_candidate_without_parts_is_invalid_response() {
        let transport = ScriptedTransport::new(vec![Step::ok(
            r#"{"candidates":[{"content":{"role":"model","parts":[]}}]}"#.to_string(),
        )]);
        let (llm, _) = client(transport.clone(), 3);

        let err = llm.generate("p".to_string()).await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_invalid_response() {
        let transport = ScriptedTransport::new(vec![Step::ok("<html>oops</html>".to_string())]);
        let (llm, _) = client(transport.clone(), 3);

        let err = llm.generate("p".to_string()).await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn test_terminal_error_classification() {
        let status = |code: u16| UpstreamFailure::Status {
            status: StatusCode::from_u16(code).unwrap(),
            body: String::new(),
        };

        assert!(matches!(terminal_error(1, status(401)), LlmError::Unauthorized));
        assert!(matches!(terminal_error(1, status(403)), LlmError::Forbidden));
        assert!(matches!(
            terminal_error(3, status(429)),
            LlmError::RateLimited { attempts: 3 }
        ));
        assert!(matches!(
            terminal_error(3, status(500)),
            LlmError::CallFailed { attempts: 3, .. }
        ));
        assert!(matches!(
            terminal_error(3, UpstreamFailure::Network("x".into())),
            LlmError::CallFailed { .. }
        ));
    }

    #[test]
    fn test_only_auth_failures_are_fatal() {
        let status = |code: u16| UpstreamFailure::Status {
            status: StatusCode::from_u16(code).unwrap(),
            body: String::new(),
        };
        assert!(!is_retryable(&status(401)));
        assert!(!is_retryable(&status(403)));
        assert!(is_retryable(&status(429)));
        assert!(is_retryable(&status(500)));
        assert!(is_retryable(&status(404)));
        assert!(is_retryable(&UpstreamFailure::Timeout(Duration::from_secs(30))));
    }
}
