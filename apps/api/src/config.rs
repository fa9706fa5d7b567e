use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
///
/// The upstream endpoint and token are optional here: the service starts
/// without them and reports "not configured" until they are set.
#[derive(Debug, Clone)]
pub struct Config {
    pub ai: AiConfig,
    pub port: u16,
    pub client_url: String,
    pub rust_log: String,
}

/// Settings consumed by the LLM client.
#[derive(Clone)]
pub struct AiConfig {
    pub endpoint: Option<String>,
    pub auth_token: Option<String>,
    pub max_retries: u32,
    pub timeout: Duration,
    pub requests_per_hour: u32,
    /// `None` when the per-minute window is disabled.
    pub requests_per_minute: Option<u32>,
}

// Hand-written so the token never ends up in logs.
impl std::fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiConfig")
            .field("endpoint", &self.endpoint)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("max_retries", &self.max_retries)
            .field("timeout", &self.timeout)
            .field("requests_per_hour", &self.requests_per_hour)
            .field("requests_per_minute", &self.requests_per_minute)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Config {
            ai: AiConfig::from_lookup(&lookup)?,
            port: parse_or(&lookup, "PORT", 4000)?,
            client_url: lookup("CLIENT_URL").unwrap_or_else(|| "http://localhost:3000".to_string()),
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

impl AiConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let per_minute: u32 = parse_or(&lookup, "AI_REQUESTS_PER_MINUTE", 20)?;

        Ok(AiConfig {
            endpoint: non_blank(lookup("GEMINI_ENDPOINT")),
            auth_token: non_blank(lookup("AUTHORIZATION_TOKEN")),
            max_retries: parse_or::<u32>(&lookup, "AI_MAX_RETRIES", 3)?.max(1),
            timeout: Duration::from_millis(parse_or(&lookup, "AI_TIMEOUT_MS", 30_000)?),
            requests_per_hour: parse_or(&lookup, "AI_REQUESTS_PER_HOUR", 300)?,
            requests_per_minute: (per_minute > 0).then_some(per_minute),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(lookup: impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
