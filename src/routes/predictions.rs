//! Prediction endpoints.
//!
//! - GET /api/v1/predictions/hourly?hours=
//! - GET /api/v1/predictions/daily?days=
//!
//! Stored predictions of the requested type are preferred; on-demand
//! inference through the predictor is the fallback path when storage has
//! no rows.

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::db::models::Prediction;
use crate::db::queries;
use crate::errors::{AppError, ErrorResponse};
use crate::routes::AppState;
use crate::services::predictor::{EnergyPredictor, PredictionPoint, WeatherFeatureSnapshot};

/// Upper bounds on the requested horizon.
const MAX_HOURS: usize = 168;
const MAX_DAYS: usize = 31;

#[derive(Debug, Deserialize, IntoParams)]
pub struct HourlyQuery {
    /// Number of hours to predict (default 24, max 168)
    pub hours: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DailyQuery {
    /// Number of days to predict (default 7, max 31)
    pub days: Option<String>,
}

/// A prediction record, from storage or live inference — never both in
/// one response.
#[derive(Debug, Serialize, ToSchema)]
pub struct PredictionRecord {
    /// Storage row id; absent for live inference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub prediction_type: String,
    pub timestamp: NaiveDateTime,
    pub predicted_output_kwh: f64,
    pub confidence_score: Option<f64>,
    pub model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather_data_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_output_kwh: Option<f64>,
    /// Feature snapshot; present for live inference only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather_features: Option<WeatherFeatureSnapshot>,
}

impl PredictionRecord {
    fn from_stored(row: Prediction) -> Self {
        Self {
            id: Some(row.id),
            prediction_type: row.prediction_type,
            timestamp: row.timestamp,
            predicted_output_kwh: row.predicted_output_kwh,
            confidence_score: row.confidence_score,
            model_version: row.model_version,
            weather_data_id: row.weather_data_id,
            actual_output_kwh: row.actual_output_kwh,
            weather_features: None,
        }
    }

    fn from_point(point: PredictionPoint, prediction_type: &str) -> Self {
        Self {
            id: None,
            prediction_type: prediction_type.to_string(),
            timestamp: point.timestamp,
            predicted_output_kwh: point.predicted_output_kwh,
            confidence_score: Some(point.confidence_score),
            model_version: point.model_version,
            weather_data_id: None,
            actual_output_kwh: None,
            weather_features: Some(point.weather_features),
        }
    }
}

fn parse_limit(
    raw: Option<String>,
    default: usize,
    max: usize,
    name: &str,
) -> Result<usize, AppError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let value: usize = raw.trim().parse().map_err(|_| {
        AppError::Validation(format!("{} must be a positive integer, got \"{}\"", name, raw))
    })?;
    if value == 0 || value > max {
        return Err(AppError::Validation(format!(
            "{} must be between 1 and {}",
            name, max
        )));
    }
    Ok(value)
}

/// Chronological stored rows, or live inference when storage is empty.
async fn predictions_of_type(
    state: &AppState,
    prediction_type: &str,
    limit: usize,
) -> Result<Vec<PredictionRecord>, AppError> {
    let stored = queries::stored_predictions(&state.pool, prediction_type, limit as i64).await?;
    if !stored.is_empty() {
        // Stored rows come newest-first; charts want chronological order.
        let mut records: Vec<PredictionRecord> = stored
            .into_iter()
            .map(PredictionRecord::from_stored)
            .collect();
        records.reverse();
        return Ok(records);
    }

    let predictor = EnergyPredictor::load(&state.pool, &state.models_dir).await;
    let points = match prediction_type {
        "daily" => predictor.predict_daily(&state.pool, limit).await?,
        _ => predictor.predict_hourly(&state.pool, limit).await?,
    };

    Ok(points
        .into_iter()
        .map(|p| PredictionRecord::from_point(p, prediction_type))
        .collect())
}

/// Get hourly energy predictions.
#[utoipa::path(
    get,
    path = "/api/v1/predictions/hourly",
    tag = "Predictions",
    params(HourlyQuery),
    responses(
        (status = 200, description = "Chronological hourly predictions", body = [PredictionRecord]),
        (status = 400, description = "Invalid hours parameter", body = ErrorResponse),
    )
)]
pub async fn hourly_predictions(
    State(state): State<AppState>,
    Query(params): Query<HourlyQuery>,
) -> Result<Json<Vec<PredictionRecord>>, AppError> {
    let hours = parse_limit(params.hours, 24, MAX_HOURS, "hours")?;
    let records = predictions_of_type(&state, "hourly", hours).await?;
    Ok(Json(records))
}

/// Get daily energy predictions.
#[utoipa::path(
    get,
    path = "/api/v1/predictions/daily",
    tag = "Predictions",
    params(DailyQuery),
    responses(
        (status = 200, description = "Chronological daily predictions", body = [PredictionRecord]),
        (status = 400, description = "Invalid days parameter", body = ErrorResponse),
    )
)]
pub async fn daily_predictions(
    State(state): State<AppState>,
    Query(params): Query<DailyQuery>,
) -> Result<Json<Vec<PredictionRecord>>, AppError> {
    let days = parse_limit(params.days, 7, MAX_DAYS, "days")?;
    let records = predictions_of_type(&state, "daily", days).await?;
    Ok(Json(records))
}
