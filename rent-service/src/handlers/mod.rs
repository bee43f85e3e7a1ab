//! HTTP handlers for rent-service.

pub mod payments;
pub mod stats;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::models::Period;
use crate::services::get_metrics;
use crate::AppState;
use service_core::error::AppError;

/// Health check endpoint for Docker/K8s liveness probes.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": state.config.service_name,
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Readiness check endpoint for K8s readiness probes.
pub async fn readiness_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ready" })))
}

/// Prometheus metrics endpoint.
pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

/// Parse a `YYYY-MM` value from a path or query string.
pub(crate) fn parse_period(raw: &str) -> Result<Period, AppError> {
    raw.parse()
        .map_err(|e| AppError::UnprocessableEntity(anyhow::anyhow!("{}", e)))
}
