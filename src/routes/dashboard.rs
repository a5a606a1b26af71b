//! Dashboard statistics endpoint.
//!
//! - GET /api/v1/dashboard/stats

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::models::{ModelVersion, Prediction};
use crate::db::queries;
use crate::errors::{AppError, ErrorResponse};
use crate::routes::AppState;

/// Window of recent rows considered for the aggregates.
const RECENT_WINDOW: i64 = 100;
/// Number of predictions echoed back.
const RECENT_PREDICTIONS_SHOWN: usize = 10;

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    /// Count of recent prediction rows (last 100)
    pub total_predictions: usize,
    /// Sum of recent production output in kWh (last 100 rows)
    pub total_production_kwh: f64,
    pub active_model: Option<ModelVersion>,
    pub recent_predictions: Vec<Prediction>,
}

/// Get dashboard statistics.
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/stats",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Dashboard statistics", body = DashboardStats),
        (status = 500, description = "Statistics unavailable", body = ErrorResponse),
    )
)]
pub async fn dashboard_stats(
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, AppError> {
    let predictions = queries::recent_predictions(&state.pool, RECENT_WINDOW).await?;
    let production = queries::recent_production(&state.pool, RECENT_WINDOW).await?;
    let active_model = queries::active_model(&state.pool, "regression").await?;

    let total_production_kwh = production.iter().map(|p| p.energy_output_kwh).sum();
    let total_predictions = predictions.len();
    let recent_predictions = predictions
        .into_iter()
        .take(RECENT_PREDICTIONS_SHOWN)
        .collect();

    Ok(Json(DashboardStats {
        total_predictions,
        total_production_kwh,
        active_model,
        recent_predictions,
    }))
}
