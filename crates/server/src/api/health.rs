use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::AppState;
use super::schemas::{HealthResponse, MetricsResponse};

/// `GET /health` -- returns service status together with a metrics
/// snapshot.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    summary = "Health check",
    description = "Returns service status and a snapshot of relay counters.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let snap = state.relay.metrics().snapshot();
    let body = HealthResponse {
        status: "ok".into(),
        metrics: MetricsResponse::from_snapshot(&snap),
    };
    (StatusCode::OK, Json(body))
}

/// `GET /metrics` -- returns relay counters as JSON.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Health",
    summary = "Relay metrics",
    description = "Returns current relay counters for monitoring.",
    responses(
        (status = 200, description = "Current counters", body = MetricsResponse)
    )
)]
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let snap = state.relay.metrics().snapshot();
    (StatusCode::OK, Json(MetricsResponse::from_snapshot(&snap)))
}
