//! System health endpoint.
//!
//! - GET /api/v1/health/status

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::routes::AppState;
use crate::services::predictor::EnergyPredictor;

/// System health snapshot.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "healthy" or "unhealthy"
    pub database: String,
    /// "available" when an active model is loadable, else "not_loaded"
    pub model: String,
    pub timestamp: DateTime<Utc>,
}

/// Get system health status.
///
/// Verifies database connectivity with a trivial query and checks whether
/// the active prediction model can be loaded. Always returns 200 — the
/// body distinguishes degraded states.
#[utoipa::path(
    get,
    path = "/api/v1/health/status",
    tag = "Health",
    responses(
        (status = 200, description = "Health status", body = HealthResponse),
    )
)]
pub async fn health_status(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_ok = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .is_ok();

    let predictor = EnergyPredictor::load(&state.pool, &state.models_dir).await;

    Json(HealthResponse {
        database: if db_ok { "healthy" } else { "unhealthy" }.to_string(),
        model: if predictor.model_loaded {
            "available"
        } else {
            "not_loaded"
        }
        .to_string(),
        timestamp: Utc::now(),
    })
}
