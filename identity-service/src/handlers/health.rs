use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::AppState;

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is alive")
    ),
    tag = "Observability"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": state.service_name,
        "version": state.service_version,
    }))
}

/// Readiness probe: checks the credential store
#[utoipa::path(
    get,
    path = "/ready",
    responses(
        (status = 200, description = "Service is ready"),
        (status = 503, description = "Database unavailable")
    ),
    tag = "Observability"
)]
pub async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.credentials.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Database readiness check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(Json(serde_json::json!({
        "status": "ready",
        "checks": {
            "database": "up"
        }
    })))
}
