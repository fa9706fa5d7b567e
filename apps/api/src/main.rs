mod analysis;
mod config;
mod errors;
mod extraction;
mod llm_client;
mod routes;
mod state;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CV Match API v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Environment: GEMINI_ENDPOINT {}, AUTHORIZATION_TOKEN {}",
        status(config.ai.endpoint.is_some()),
        status(config.ai.auth_token.is_some()),
    );
    if config.ai.endpoint.is_none() || config.ai.auth_token.is_none() {
        warn!("AI upstream is not fully configured; analysis requests will be rejected");
    }

    let llm = LlmClient::new(&config.ai).context("Failed to build HTTP client")?;
    info!(
        "LLM client initialized (max attempts: {}, timeout: {:?}, quota: {}/h)",
        config.ai.max_retries, config.ai.timeout, config.ai.requests_per_hour
    );

    let cors = build_cors(&config.client_url)?;

    let state = AppState {
        llm,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn status(present: bool) -> &'static str {
    if present {
        "configured"
    } else {
        "not configured"
    }
}

/// Allows the configured frontend origin with credentials.
fn build_cors(client_url: &str) -> Result<CorsLayer> {
    let origin = HeaderValue::from_str(client_url)
        .with_context(|| format!("CLIENT_URL is not a valid origin: {client_url}"))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true))
}
