use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns service status, whether the AI upstream is configured, and quota usage.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let ai = if state.llm.is_configured() {
        "configured"
    } else {
        "not configured"
    };

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "cvmatch-api",
        "timestamp": Utc::now(),
        "services": {
            "ai": ai
        },
        "quota": {
            "usedThisHour": state.llm.limiter().used_this_hour(),
            "hourlyLimit": state.config.ai.requests_per_hour
        }
    }))
}
