//! Health check and metrics handlers

use axum::{extract::State, Json};
use serde::Serialize;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub version: String,
    pub checks: ReadyChecks,
}

#[derive(Serialize)]
pub struct ReadyChecks {
    /// "enabled" when answers are grounded in the search index
    pub retrieval: String,
}

/// Liveness check; always healthy while the server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Readiness check
///
/// The completion endpoint is required at startup, so a running gateway is
/// always ready; retrieval is reported because it may be switched off.
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let retrieval = if state.assistant.retrieval_enabled() {
        "enabled"
    } else {
        "disabled"
    };

    Json(ReadyResponse {
        status: "ready".to_string(),
        version: portfolio_common::VERSION.to_string(),
        checks: ReadyChecks {
            retrieval: retrieval.to_string(),
        },
    })
}

/// Prometheus text exposition
pub async fn metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}
