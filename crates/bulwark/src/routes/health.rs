//! Health check endpoints.

use axum::{Json, extract::State, http::StatusCode};
use bulwark_common::RateCategory;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Basic health check (is the server running?)
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct ReadyResponse {
    status: &'static str,
    counter_store: bool,
}

/// Readiness check: can the limiter reach its counter store?
pub async fn ready_check(
    State(state): State<AppState>,
) -> Result<Json<ReadyResponse>, StatusCode> {
    match state.limiter.ping(RateCategory::Auth).await {
        Ok(()) => Ok(Json(ReadyResponse {
            status: "ready",
            counter_store: true,
        })),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
