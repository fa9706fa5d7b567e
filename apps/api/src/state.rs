use crate::config::Config;
use crate::llm_client::LlmClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Resilient upstream client. Clones share one quota.
    pub llm: LlmClient,
    pub config: Config,
}
